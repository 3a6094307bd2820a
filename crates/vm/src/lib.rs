//! # Quill Virtual Machine
//!
//! The execution core of the Quill scripting language: a stack-oriented
//! bytecode interpreter with a reference-counted heap augmented by a
//! synchronous trial-deletion cycle collector.
//!
//! ## Architecture
//!
//! - **Value**: tagged dynamic value; primitives are inline, strings are
//!   reference-counted, lists and objects are cycle-collected heap handles
//! - **Heap**: owner of all allocations, write barriers and the collector
//! - **Module**: immutable loaded unit with interned strings, a flat
//!   instruction array, a function directory and switch tables
//! - **ActivationContext**: one logical execution — operand stack, frames,
//!   program counter and the ready/suspended/returned/raised state machine
//! - **Vm**: owns modules, registered native functions, the global object
//!   and the heap; interprets one context at a time
//!
//! ## Example
//!
//! ```rust
//! use quill_vm::bytecode::{
//!     ArgumentList, CompiledModule, Instruction, Op, ScriptFunction, MAIN_FUNCTION_NAME,
//! };
//! use quill_vm::{ActivationContext, State, Value, Vm};
//!
//! let module = CompiledModule {
//!     dependencies: vec![],
//!     functions: vec![ScriptFunction {
//!         name: MAIN_FUNCTION_NAME.into(),
//!         arguments: ArgumentList::Explicit { count: 0 },
//!         start: 0,
//!         length: 4,
//!         exception_handlers: vec![],
//!     }],
//!     code: vec![
//!         Instruction::new(Op::PushInt(2)),
//!         Instruction::new(Op::PushInt(3)),
//!         Instruction::new(Op::Mul),
//!         Instruction::new(Op::Ret),
//!     ],
//!     string_pool: vec![],
//!     switch_tables: vec![],
//! };
//!
//! let mut vm = Vm::new();
//! let module_index = vm.load_module(&module).unwrap();
//!
//! let mut ctx = ActivationContext::new();
//! assert!(vm.call_main_function(&mut ctx, module_index));
//! vm.execute(&mut ctx);
//!
//! assert_eq!(ctx.state(), State::ReturnedValue);
//! assert!(matches!(ctx.pop(), Value::Integer(6)));
//! ```

/// Bytecode representation shared with the compiler.
pub mod bytecode;
/// Builtin list and string methods.
pub mod builtins;
/// Activation contexts and call frames.
pub mod context;
/// Disassembly of compiled modules.
pub mod disasm;
/// VM error types and result handling.
pub mod error;
/// Heap, reference counting and the cycle collector.
pub mod heap;
/// Execution-scoped borrows and the native-call interface.
pub mod machine;
/// Loaded modules.
pub mod module;
/// Runtime helper operators.
pub mod runtime;
/// Tagged runtime values.
pub mod value;
/// The virtual machine.
pub mod vm;

pub use context::{ActivationContext, Frame, State};
pub use error::{VmError, VmResult};
pub use heap::{
    CollectReason, Heap, PropName, PropertyFlags, SetPropertyResult, GC_POSSIBLE_ROOTS_THRESHOLD,
};
pub use machine::{External, Machine, NativeCallContext};
pub use module::{InternedString, Module};
pub use value::{HeapHandle, NativeFn, StringHandle, Value};
pub use vm::Vm;
