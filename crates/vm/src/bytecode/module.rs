//! Compiled module format: the contract between the bytecode compiler and
//! the VM.
//!
//! A compiled module exists only in memory within the host process. The VM
//! consumes it through [`crate::vm::Vm::load_module`], which interns the
//! string pool and resolves dependency indices to registered externals.

use crate::bytecode::op::Instruction;

/// Reserved name of a module's entry-point function. It takes no arguments.
pub const MAIN_FUNCTION_NAME: &str = ".main";

/// Upper bound on externals registered with one VM.
pub const EXTERNALS_MAX: usize = i16::MAX as usize;

/// Upper bound on local slots within one function.
pub const LOCALS_MAX: usize = i16::MAX as usize;

/// Local slot reserved for the `this` value.
pub const LOCAL_THIS: u16 = 0;

/// How a function binds its arguments. Only explicit fixed arity exists in
/// this version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentList {
    Explicit { count: usize },
}

/// An exception handler range: a raise at any pc in
/// `[start, start + length)` lands at `handler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerRange {
    pub start: u32,
    pub length: u32,
    pub handler: u32,
}

impl HandlerRange {
    pub fn covers(&self, pc: u32) -> bool {
        pc >= self.start && pc < self.start + self.length
    }
}

/// A callable unit inside a module.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptFunction {
    pub name: String,
    pub arguments: ArgumentList,
    /// Span of the function inside the module's flat instruction array.
    pub start: u32,
    pub length: u32,
    /// Innermost handlers first; ranges lie within the function's span.
    pub exception_handlers: Vec<HandlerRange>,
}

impl ScriptFunction {
    /// Expected explicit argument count.
    pub fn num_args(&self) -> usize {
        match self.arguments {
            ArgumentList::Explicit { count } => count,
        }
    }
}

/// A constant case value in a switch table. Restricted to tags comparable by
/// `==` without touching the heap.
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(Vec<u8>),
}

/// Side table for one `switch` instruction. `handlers` has one more entry
/// than `cases`; the final entry is the else-handler.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchTable {
    pub cases: Vec<SwitchValue>,
    pub handlers: Vec<u32>,
}

/// A compiled translation unit, immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledModule {
    /// External (native-function) names, referenced by index from
    /// `call_ext` instructions.
    pub dependencies: Vec<String>,
    /// Ordered function directory. The entry point is the function named
    /// [`MAIN_FUNCTION_NAME`].
    pub functions: Vec<ScriptFunction>,
    /// Flat instruction array shared by all functions.
    pub code: Vec<Instruction>,
    /// Byte strings addressable by index from string operands.
    pub string_pool: Vec<Vec<u8>>,
    pub switch_tables: Vec<SwitchTable>,
}

impl CompiledModule {
    /// Index of the entry-point function, if the module has one.
    pub fn find_main_function(&self) -> Option<u32> {
        self.functions
            .iter()
            .position(|function| function.name == MAIN_FUNCTION_NAME)
            .map(|index| index as u32)
    }
}
