//! Bytecode representation shared by the compiler and the VM.

mod module;
mod op;

pub use module::{
    ArgumentList, CompiledModule, HandlerRange, ScriptFunction, SwitchTable, SwitchValue,
    EXTERNALS_MAX, LOCALS_MAX, LOCAL_THIS, MAIN_FUNCTION_NAME,
};
pub use op::{Instruction, InstructionOrigin, Op, OperandKind};
