//! # Quill Compiler
//!
//! Front-end and bytecode compiler for the Quill scripting language:
//! scanner, recursive descent parser, class desugaring, bytecode emission
//! and an optional peephole optimizer. The output is a
//! [`quill_vm::bytecode::CompiledModule`] ready for `Vm::load_module`.
//!
//! ## Example
//!
//! ```rust
//! use quill_compiler::{compile_source, CodegenOptions};
//! use quill_vm::{ActivationContext, State, Value, Vm};
//!
//! let module = compile_source("return 1 + 2 * 3;", &CodegenOptions::default()).unwrap();
//!
//! let mut vm = Vm::new();
//! let module_index = vm.load_module(&module).unwrap();
//!
//! let mut ctx = ActivationContext::new();
//! assert!(vm.call_main_function(&mut ctx, module_index));
//! vm.execute(&mut ctx);
//!
//! assert_eq!(ctx.state(), State::ReturnedValue);
//! assert!(matches!(ctx.pop(), Value::Integer(7)));
//! ```

/// Abstract syntax tree.
pub mod ast;
/// Bytecode emission and class desugaring.
pub mod codegen;
/// Compilation errors.
pub mod error;
/// Source scanner.
pub mod lexer;
/// Peephole optimizer.
pub mod optimizer;
/// Recursive descent parser.
pub mod parser;

pub use codegen::{compile, CodegenOptions};
pub use error::{CompileError, CompileResult};
pub use optimizer::optimize;
pub use parser::parse;

use quill_vm::bytecode::CompiledModule;

/// Convenience pipeline: scan, parse and compile one source unit.
pub fn compile_source(source: &str, options: &CodegenOptions) -> CompileResult<CompiledModule> {
    let script = parser::parse(source)?;
    codegen::compile(&script, options)
}
