//! Execution-scoped borrow bundle and the native-call interface.
//!
//! A [`Machine`] bundles the VM state an executing context needs: loaded
//! modules, the external registry, the global object handle and the heap.
//! Constructing it at `Vm::execute` entry is the scoped acquisition of the
//! "current context" — runtime helpers and native functions receive it
//! instead of consulting a process-wide slot, and scope exit restores
//! nothing because nothing global was ever assigned.

use crate::context::ActivationContext;
use crate::heap::Heap;
use crate::module::Module;
use crate::value::{NativeFn, StringHandle, Value};

/// A native function registered with the VM, referred to by index from
/// loaded modules.
pub struct External {
    pub name: String,
    pub callback: NativeFn,
}

/// Borrowed view of VM state for the duration of an execute step or a
/// native call.
pub struct Machine<'m> {
    pub modules: &'m [Module],
    pub externals: &'m [External],
    /// Handle of the VM's global object. The VM keeps a strong reference on
    /// it for its whole lifetime.
    pub global: Value,
    pub heap: &'m mut Heap,
}

/// What a native function sees while it runs: its arguments (still on the
/// operand stack), a return-value slot, and the machine + context for
/// raising, suspending or allocating.
pub struct NativeCallContext<'m, 'c> {
    machine: &'c mut Machine<'m>,
    ctx: &'c mut ActivationContext,
    num_args: usize,
    return_value: Value,
}

impl<'m, 'c> NativeCallContext<'m, 'c> {
    pub(crate) fn new(
        machine: &'c mut Machine<'m>,
        ctx: &'c mut ActivationContext,
        num_args: usize,
    ) -> Self {
        Self {
            machine,
            ctx,
            num_args,
            return_value: Value::Nil,
        }
    }

    /// Takes the return value out; the caller pushes it after popping the
    /// arguments.
    pub(crate) fn finish(self) -> Value {
        self.return_value
    }

    pub fn num_args(&self) -> usize {
        self.num_args
    }

    /// Non-owning view of argument `index`. Argument 0 is the stack top (the
    /// receiver for method-style calls).
    pub fn arg(&self, index: usize) -> Value {
        self.ctx.below_top(index)
    }

    /// Stores the value (ownership transfers) to be pushed when the native
    /// returns. Releases any previously-set return value.
    pub fn set_return_value(&mut self, value: Value) {
        let old = std::mem::replace(&mut self.return_value, value);
        self.machine.heap.release(old);
    }

    pub fn machine(&mut self) -> &mut Machine<'m> {
        self.machine
    }

    pub fn heap(&mut self) -> &mut Heap {
        self.machine.heap
    }

    pub fn activation(&mut self) -> &mut ActivationContext {
        self.ctx
    }

    /// Raises a `{ desc: message }` exception on the context.
    pub fn raise(&mut self, message: &str) {
        self.ctx.raise_with_message(self.machine, message);
    }

    /// Integer coercion helper; raises and returns `None` on mismatch.
    pub fn as_integer(&mut self, value: Value) -> Option<i64> {
        crate::runtime::as_integer(self.machine, self.ctx, value)
    }

    /// String coercion helper; raises and returns `None` on mismatch.
    pub fn as_string(&mut self, value: Value) -> Option<StringHandle> {
        crate::runtime::as_string(self.machine, self.ctx, value)
    }
}
