//! Activation contexts and call frames.
//!
//! An activation context is one logical script execution: operand stack,
//! frame stack, cached program counter for the top frame, pending-exception
//! slot and the four-state machine the embedder drives.

use crate::heap::{Heap, PropName};
use crate::machine::{Machine, NativeCallContext};
use crate::value::{NativeFn, Value};

/// Execution state of an activation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The VM may step the context.
    Ready,
    /// A native function cooperatively paused execution; the embedder
    /// resumes it.
    Suspended,
    /// The top-level frame returned; the result is on the operand stack.
    ReturnedValue,
    /// An uncaught exception; the value sits in the pending-exception slot.
    RaisedException,
}

/// A stack frame. Always corresponds to a script function.
#[derive(Debug)]
pub struct Frame {
    /// Module and directory index of the frame's own function.
    pub(crate) module_index: u32,
    pub(crate) function_index: u32,
    /// Operand stack height at entry.
    pub(crate) stack_base: usize,
    /// Dense local slots, grown on demand. Slot 0 holds `this`.
    pub(crate) locals: Vec<Value>,
    /// Program counter to resume at, flushed when this frame calls out.
    pub(crate) saved_pc: u32,
}

impl Frame {
    /// Reads a local slot, growing the array so the slot exists.
    pub fn get_local(&mut self, index: usize) -> Value {
        if index >= self.locals.len() {
            self.locals.resize(index + 1, Value::Undefined);
        }

        self.locals[index]
    }

    /// Stores into a local slot, releasing whatever the slot held.
    pub fn set_local(&mut self, heap: &mut Heap, index: usize, value: Value) {
        if index >= self.locals.len() {
            self.locals.resize(index + 1, Value::Undefined);
        }

        let old = std::mem::replace(&mut self.locals[index], value);
        heap.release(old);
    }
}

/// A single logical execution thread against a VM.
pub struct ActivationContext {
    pub(crate) state: State,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<Frame>,
    /// Module of the top frame, cached while it executes.
    pub(crate) active_module: u32,
    pub(crate) pc: u32,
    /// Non-undefined iff `state == RaisedException`.
    pub(crate) exception: Value,
}

impl Default for ActivationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivationContext {
    pub fn new() -> Self {
        Self {
            state: State::Ready,
            stack: Vec::new(),
            frames: Vec::new(),
            active_module: 0,
            pc: 0,
            exception: Value::Undefined,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The pending exception. Undefined unless the context raised.
    pub fn exception(&self) -> Value {
        self.exception
    }

    pub fn suspend(&mut self) {
        self.state = State::Suspended;
    }

    pub fn resume(&mut self) {
        self.state = State::Ready;
    }

    /// Current operand stack height.
    pub fn stack_height(&self) -> usize {
        self.stack.len()
    }

    /// Pushes an owning value.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pops an owning value. An empty stack yields undefined, which then
    /// surfaces as a type error downstream.
    pub fn pop(&mut self) -> Value {
        debug_assert!(!self.stack.is_empty(), "operand stack underflow");
        self.stack.pop().unwrap_or(Value::Undefined)
    }

    /// Non-owning read of the value `depth` slots below the top.
    pub fn below_top(&self, depth: usize) -> Value {
        if depth < self.stack.len() {
            self.stack[self.stack.len() - 1 - depth]
        } else {
            Value::Undefined
        }
    }

    pub(crate) fn top_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("no active frame")
    }

    /// Seeds the context with a call to the module's `.main`. Raises and
    /// returns false if the module has no entry point.
    pub fn call_main_function(&mut self, machine: &mut Machine<'_>, module_index: u32) -> bool {
        let main = machine.modules[module_index as usize].find_main_function();

        match main {
            Some(function_index) => {
                self.call_script_function(machine, module_index, function_index, 0, Value::Undefined)
            }
            None => {
                self.raise_with_message(machine, "Module is not executable");
                false
            }
        }
    }

    /// Pushes a frame for a script function. The operand stack must hold the
    /// arguments; the callee pops them into local slots `1..=N`. Ownership
    /// of `self_value` transfers into local slot 0.
    pub fn call_script_function(
        &mut self,
        machine: &mut Machine<'_>,
        module_index: u32,
        function_index: u32,
        num_args: usize,
        self_value: Value,
    ) -> bool {
        if let Some(frame) = self.frames.last_mut() {
            frame.saved_pc = self.pc;
        }

        let function = machine.modules[module_index as usize].function(function_index);
        let start = function.start;
        let expected = function.num_args();

        self.frames.push(Frame {
            module_index,
            function_index,
            stack_base: self.stack.len(),
            locals: Vec::new(),
            saved_pc: 0,
        });

        self.active_module = module_index;
        self.pc = start;

        self.top_frame_mut().set_local(machine.heap, 0, self_value);

        if num_args != expected {
            self.raise_with_message(machine, "Incorrect number of arguments in function call");
            return false;
        }

        for slot in 0..expected {
            let value = self.pop();
            self.top_frame_mut().set_local(machine.heap, slot + 1, value);
        }

        true
    }

    /// Calls a native function. The arguments stay on the stack during the
    /// call; afterwards they are popped and released and the native's return
    /// value (nil if none was set) is pushed.
    pub fn call_native_function(
        &mut self,
        machine: &mut Machine<'_>,
        function: NativeFn,
        num_args: usize,
    ) {
        let return_value = {
            let mut native = NativeCallContext::new(machine, self, num_args);
            function(&mut native);
            native.finish()
        };

        for _ in 0..num_args {
            let value = self.pop();
            machine.heap.release(value);
        }

        self.push(return_value);
    }

    /// Method-invocation form: the receiver is pushed as an additional
    /// implicit last argument.
    pub fn call_native_function_with_self(
        &mut self,
        machine: &mut Machine<'_>,
        function: NativeFn,
        num_args: usize,
        self_value: Value,
    ) {
        let reference = machine.heap.reference(self_value);
        self.push(reference);

        self.call_native_function(machine, function, num_args + 1);
    }

    /// Calls a callable value with no receiver.
    pub fn invoke(&mut self, machine: &mut Machine<'_>, callable: Value, num_args: usize) {
        match callable {
            Value::NativeFunction(function) => {
                self.call_native_function(machine, function, num_args);
            }
            Value::ScriptFunction { module, function } => {
                self.call_script_function(machine, module, function, num_args, Value::Undefined);
            }
            _ => {
                self.raise_with_message(machine, "Attempting to call a non-function");
            }
        }
    }

    /// Calls a callable value with a receiver. Script methods see it in
    /// local slot 0; natives get it as the implicit last argument.
    pub fn invoke_with_self(
        &mut self,
        machine: &mut Machine<'_>,
        callable: Value,
        self_value: Value,
        num_args: usize,
    ) {
        match callable {
            Value::NativeFunction(function) => {
                self.call_native_function_with_self(machine, function, num_args, self_value);
            }
            Value::ScriptFunction { module, function } => {
                let reference = machine.heap.reference(self_value);
                self.call_script_function(machine, module, function, num_args, reference);
            }
            _ => {
                self.raise_with_message(machine, "Attempting to call a non-function");
            }
        }
    }

    /// Raises `value` (ownership transfers to the pending-exception slot).
    /// Exception objects get a fresh `stacktrace` list of strings attached,
    /// walked from the top frame downward.
    pub fn raise_exception(&mut self, machine: &mut Machine<'_>, value: Value) {
        if let Value::Object(handle) = value {
            let stacktrace = machine.heap.new_list(self.frames.len());
            let list_handle = stacktrace.container_handle().expect("fresh list");

            for line in self.stacktrace_lines(machine) {
                let entry = machine.heap.new_string(line.as_bytes());
                machine.heap.list_add_item(list_handle, entry);
            }

            machine
                .heap
                .object_set_property(handle, &PropName::new(b"stacktrace"), stacktrace, false);
        }

        self.exception = value;
        self.state = State::RaisedException;
    }

    /// Builds an exception object `{ desc: message }` and raises it.
    pub fn raise_with_message(&mut self, machine: &mut Machine<'_>, message: &str) {
        let exception = machine.heap.new_object();
        let handle = exception.container_handle().expect("fresh object");

        let desc = machine.heap.new_string(message.as_bytes());
        machine
            .heap
            .object_set_property(handle, &PropName::new(b"desc"), desc, false);

        self.raise_exception(machine, exception);
    }

    /// One `"<function> (<unit>:<line>)"` entry per frame with origin
    /// metadata, top frame first.
    fn stacktrace_lines(&self, machine: &Machine<'_>) -> Vec<String> {
        let mut lines = Vec::new();

        for (depth, frame) in self.frames.iter().enumerate().rev() {
            let is_top = depth + 1 == self.frames.len();
            let (module_index, pc) = if is_top {
                (self.active_module, self.pc)
            } else {
                (frame.module_index, frame.saved_pc)
            };

            let module = &machine.modules[module_index as usize];
            let Some(last_executed) = pc.checked_sub(1) else {
                continue;
            };

            let Some(instruction) = module.instructions().get(last_executed as usize) else {
                continue;
            };

            if let Some(origin) = &instruction.origin {
                lines.push(format!(
                    "{} ({}:{})",
                    origin.function, origin.unit, origin.line
                ));
            }
        }

        lines
    }

    /// Releases everything the context owns: operand stack, frame locals and
    /// the pending exception. Leaves the context empty and ready.
    pub fn teardown(&mut self, heap: &mut Heap) {
        while let Some(value) = self.stack.pop() {
            heap.release(value);
        }

        while let Some(frame) = self.frames.pop() {
            for value in frame.locals {
                heap.release(value);
            }
        }

        let exception = std::mem::replace(&mut self.exception, Value::Undefined);
        heap.release(exception);

        self.state = State::Ready;
        self.active_module = 0;
        self.pc = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_locals_grow_on_demand() {
        let mut heap = Heap::new();
        let mut frame = Frame {
            module_index: 0,
            function_index: 0,
            stack_base: 0,
            locals: Vec::new(),
            saved_pc: 0,
        };

        assert!(frame.get_local(2).is_undefined());
        assert_eq!(frame.locals.len(), 3);

        frame.set_local(&mut heap, 5, Value::Integer(42));
        assert!(matches!(frame.get_local(5), Value::Integer(42)));
    }

    #[test]
    fn test_set_local_releases_previous_value() {
        let mut heap = Heap::new();
        let mut frame = Frame {
            module_index: 0,
            function_index: 0,
            stack_base: 0,
            locals: Vec::new(),
            saved_pc: 0,
        };

        let string = heap.new_string(b"old");
        frame.set_local(&mut heap, 0, string);
        assert_eq!(heap.live_strings(), 1);

        frame.set_local(&mut heap, 0, Value::Nil);
        assert_eq!(heap.live_strings(), 0);
    }

    #[test]
    fn test_below_top_reads_without_popping() {
        let mut ctx = ActivationContext::new();
        ctx.push(Value::Integer(1));
        ctx.push(Value::Integer(2));

        assert!(matches!(ctx.below_top(0), Value::Integer(2)));
        assert!(matches!(ctx.below_top(1), Value::Integer(1)));
        assert!(ctx.below_top(2).is_undefined());
        assert_eq!(ctx.stack_height(), 2);
    }
}
