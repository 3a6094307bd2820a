//! The virtual machine: module registry, external registry, global object,
//! heap ownership and the instruction dispatch loop.

use crate::builtins;
use crate::bytecode::{CompiledModule, Op, EXTERNALS_MAX};
use crate::context::{ActivationContext, State};
use crate::error::{VmError, VmResult};
use crate::heap::{CollectReason, Heap, PropName, GC_POSSIBLE_ROOTS_THRESHOLD};
use crate::machine::{External, Machine};
use crate::module::Module;
use crate::runtime;
use crate::value::{NativeFn, Value};

/// A Quill virtual machine. Owns loaded modules, registered native
/// functions, the global object and the heap. Interprets one activation
/// context at a time.
pub struct Vm {
    modules: Vec<Module>,
    externals: Vec<External>,
    global: Value,
    heap: Heap,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Constructs an empty VM with a fresh global object.
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let global = heap.new_object();

        Self {
            modules: Vec::new(),
            externals: Vec::new(),
            global,
            heap,
        }
    }

    /// Registers a native function and returns its external index.
    /// Expected to happen before any execute.
    pub fn register_callback(&mut self, name: &str, callback: NativeFn) -> VmResult<u16> {
        if self.externals.len() >= EXTERNALS_MAX {
            return Err(VmError::ExternalRegistryFull {
                count: self.externals.len(),
                limit: EXTERNALS_MAX,
            });
        }

        self.externals.push(External {
            name: name.to_owned(),
            callback,
        });

        Ok((self.externals.len() - 1) as u16)
    }

    /// Loads a compiled module: resolves its dependencies against the
    /// external registry, interns the string pool and validates index
    /// operands. An unresolved dependency is fatal for the load.
    pub fn load_module(&mut self, compiled: &CompiledModule) -> VmResult<u32> {
        let mut external_indices = Vec::with_capacity(compiled.dependencies.len());

        for (index, name) in compiled.dependencies.iter().enumerate() {
            let resolved = self
                .externals
                .iter()
                .position(|external| external.name == *name);

            match resolved {
                Some(external_index) => external_indices.push(external_index),
                None => {
                    return Err(VmError::UnresolvedExternal {
                        name: name.clone(),
                        index,
                    })
                }
            }
        }

        let module = Module::link(compiled, &external_indices)?;
        self.modules.push(module);

        log::debug!(
            "loaded module {} ({} functions, {} instructions)",
            self.modules.len() - 1,
            compiled.functions.len(),
            compiled.code.len()
        );

        Ok((self.modules.len() - 1) as u32)
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, index: u32) -> &Module {
        &self.modules[index as usize]
    }

    /// Handle of the global object. The VM holds a strong reference for its
    /// whole lifetime.
    pub fn global(&self) -> Value {
        self.global
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Borrow bundle for embedder-side calls into contexts and runtime
    /// helpers.
    pub fn machine(&mut self) -> Machine<'_> {
        Machine {
            modules: &self.modules,
            externals: &self.externals,
            global: self.global,
            heap: &mut self.heap,
        }
    }

    /// Runs a synchronous collection pass. Returns the number of values
    /// collected.
    pub fn collect_garbage(&mut self, reason: CollectReason) -> usize {
        self.heap.collect(reason)
    }

    /// Releases the global object and collects. After every context has
    /// been torn down, this brings the live-allocation count to zero.
    pub fn shutdown(&mut self) {
        let global = std::mem::replace(&mut self.global, Value::Undefined);
        self.heap.release(global);
        self.heap.collect(CollectReason::VmShutdown);
    }

    /// Seeds `ctx` with a call to the module's `.main`.
    pub fn call_main_function(&mut self, ctx: &mut ActivationContext, module_index: u32) -> bool {
        let mut machine = self.machine();
        ctx.call_main_function(&mut machine, module_index)
    }

    /// Interprets `ctx` until it leaves the ready state. Binding the context
    /// for the duration of this call is the scoped current-context
    /// acquisition; native callees receive the same machine borrow.
    pub fn execute(&mut self, ctx: &mut ActivationContext) {
        let mut machine = Machine {
            modules: &self.modules,
            externals: &self.externals,
            global: self.global,
            heap: &mut self.heap,
        };
        let modules = machine.modules;

        let mut num_args: usize = 0;

        while ctx.state() == State::Ready {
            if machine.heap.possible_roots_len() > GC_POSSIBLE_ROOTS_THRESHOLD {
                machine.heap.collect(CollectReason::PossibleRootsThreshold);
            }

            let op = modules[ctx.active_module as usize].instructions()[ctx.pc as usize].op;
            ctx.pc += 1;

            match op {
                Op::Nop => {}

                Op::Args(count) => {
                    num_args = count as usize;
                }

                Op::CallFunc(function_index) => {
                    let module = ctx.active_module;
                    ctx.call_script_function(
                        &mut machine,
                        module,
                        function_index as u32,
                        num_args,
                        Value::Undefined,
                    );
                }

                Op::CallVar => {
                    let callable = ctx.pop();
                    ctx.invoke(&mut machine, callable, num_args);
                    machine.heap.release(callable);
                }

                Op::CallExt(external_index) => {
                    let callback = machine.externals[external_index as usize].callback;
                    ctx.call_native_function(&mut machine, callback, num_args);
                }

                Op::Invoke(string_index) => {
                    let receiver = ctx.pop();
                    let name = modules[ctx.active_module as usize].string(string_index);

                    match receiver {
                        Value::List(_) => match builtins::list_method(name.bytes) {
                            Some(method) => {
                                ctx.call_native_function_with_self(
                                    &mut machine,
                                    method,
                                    num_args,
                                    receiver,
                                );
                            }
                            None => {
                                let message = format!(
                                    "List has no method '{}'",
                                    String::from_utf8_lossy(name.bytes)
                                );
                                ctx.raise_with_message(&mut machine, &message);
                            }
                        },
                        Value::String(_) => match builtins::string_method(name.bytes) {
                            Some(method) => {
                                ctx.call_native_function_with_self(
                                    &mut machine,
                                    method,
                                    num_args,
                                    receiver,
                                );
                            }
                            None => {
                                let message = format!(
                                    "String has no method '{}'",
                                    String::from_utf8_lossy(name.bytes)
                                );
                                ctx.raise_with_message(&mut machine, &message);
                            }
                        },
                        _ => {
                            let prop = PropName::from_parts(name.hash, name.bytes);

                            if let Some(method) =
                                runtime::get_property(&mut machine, ctx, receiver, &prop, true)
                            {
                                ctx.invoke_with_self(&mut machine, method, receiver, num_args);
                                machine.heap.release(method);
                            }
                        }
                    }

                    machine.heap.release(receiver);
                }

                Op::Jmp(address) => {
                    ctx.pc = address;
                }

                Op::JmpTrue(address) => {
                    let value = ctx.pop();
                    let condition = runtime::as_boolean(&mut machine, ctx, value);
                    machine.heap.release(value);

                    if condition == Some(true) {
                        ctx.pc = address;
                    }
                }

                Op::JmpFalse(address) => {
                    let value = ctx.pop();
                    let condition = runtime::as_boolean(&mut machine, ctx, value);
                    machine.heap.release(value);

                    if condition == Some(false) {
                        ctx.pc = address;
                    }
                }

                Op::Ret => {
                    let frame = ctx.frames.pop().expect("ret without a frame");
                    for value in frame.locals {
                        machine.heap.release(value);
                    }

                    if ctx.frames.is_empty() {
                        ctx.state = State::ReturnedValue;
                    } else {
                        let top = ctx.frames.last().expect("caller frame");
                        ctx.active_module = top.module_index;
                        ctx.pc = top.saved_pc;
                    }
                }

                Op::Switch(table_index) => {
                    let value = ctx.pop();
                    let table = modules[ctx.active_module as usize].switch_table(table_index);

                    // Fall back to the final (else) handler when no case
                    // compares equal.
                    let mut target = table.handlers[table.cases.len()];

                    for (index, case) in table.cases.iter().enumerate() {
                        if runtime::switch_case_matches(machine.heap, value, case) {
                            target = table.handlers[index];
                            break;
                        }
                    }

                    ctx.pc = target;
                    machine.heap.release(value);
                }

                Op::ThrowVar => {
                    let value = ctx.pop();
                    ctx.raise_exception(&mut machine, value);
                }

                Op::Add => {
                    let right = ctx.pop();
                    let left = ctx.pop();
                    let result = runtime::operator_add(&mut machine, ctx, left, right);
                    machine.heap.release(left);
                    machine.heap.release(right);

                    if !result.is_undefined() {
                        ctx.push(result);
                    }
                }

                Op::Sub => {
                    let right = ctx.pop();
                    let left = ctx.pop();
                    let result = runtime::operator_sub(&mut machine, ctx, left, right);
                    machine.heap.release(left);
                    machine.heap.release(right);

                    if !result.is_undefined() {
                        ctx.push(result);
                    }
                }

                Op::Mul => {
                    let right = ctx.pop();
                    let left = ctx.pop();
                    let result = runtime::operator_mul(&mut machine, ctx, left, right);
                    machine.heap.release(left);
                    machine.heap.release(right);

                    if !result.is_undefined() {
                        ctx.push(result);
                    }
                }

                Op::Div => {
                    let right = ctx.pop();
                    let left = ctx.pop();
                    let result = runtime::operator_div(&mut machine, ctx, left, right);
                    machine.heap.release(left);
                    machine.heap.release(right);

                    if !result.is_undefined() {
                        ctx.push(result);
                    }
                }

                Op::Mod => {
                    let right = ctx.pop();
                    let left = ctx.pop();
                    let result = runtime::operator_mod(&mut machine, ctx, left, right);
                    machine.heap.release(left);
                    machine.heap.release(right);

                    if !result.is_undefined() {
                        ctx.push(result);
                    }
                }

                Op::Neg => {
                    let operand = ctx.pop();
                    let result = runtime::operator_neg(&mut machine, ctx, operand);
                    machine.heap.release(operand);

                    if !result.is_undefined() {
                        ctx.push(result);
                    }
                }

                Op::LogAnd => {
                    let right = ctx.pop();
                    let left = ctx.pop();
                    let result = runtime::operator_log_and(&mut machine, ctx, left, right);
                    machine.heap.release(left);
                    machine.heap.release(right);

                    if !result.is_undefined() {
                        ctx.push(result);
                    }
                }

                Op::LogOr => {
                    let right = ctx.pop();
                    let left = ctx.pop();
                    let result = runtime::operator_log_or(&mut machine, ctx, left, right);
                    machine.heap.release(left);
                    machine.heap.release(right);

                    if !result.is_undefined() {
                        ctx.push(result);
                    }
                }

                Op::LogNot => {
                    let operand = ctx.pop();
                    let result = runtime::operator_log_not(&mut machine, ctx, operand);
                    machine.heap.release(operand);

                    if !result.is_undefined() {
                        ctx.push(result);
                    }
                }

                Op::Eq => {
                    let right = ctx.pop();
                    let left = ctx.pop();
                    let equal = runtime::operator_equals(machine.heap, left, right);
                    machine.heap.release(left);
                    machine.heap.release(right);
                    ctx.push(Value::Boolean(equal));
                }

                Op::Neq => {
                    let right = ctx.pop();
                    let left = ctx.pop();
                    let equal = runtime::operator_equals(machine.heap, left, right);
                    machine.heap.release(left);
                    machine.heap.release(right);
                    ctx.push(Value::Boolean(!equal));
                }

                Op::Grtr => {
                    let right = ctx.pop();
                    let left = ctx.pop();
                    let result = runtime::operator_greater_than(&mut machine, ctx, left, right);
                    machine.heap.release(left);
                    machine.heap.release(right);

                    if let Some(result) = result {
                        ctx.push(Value::Boolean(result));
                    }
                }

                Op::Less => {
                    let right = ctx.pop();
                    let left = ctx.pop();
                    let result = runtime::operator_less_than(&mut machine, ctx, left, right);
                    machine.heap.release(left);
                    machine.heap.release(right);

                    if let Some(result) = result {
                        ctx.push(Value::Boolean(result));
                    }
                }

                // Implemented as not-less-than to preserve NaN asymmetry.
                Op::GrtrEq => {
                    let right = ctx.pop();
                    let left = ctx.pop();
                    let result = runtime::operator_less_than(&mut machine, ctx, left, right);
                    machine.heap.release(left);
                    machine.heap.release(right);

                    if let Some(result) = result {
                        ctx.push(Value::Boolean(!result));
                    }
                }

                // Implemented as not-greater-than.
                Op::LessEq => {
                    let right = ctx.pop();
                    let left = ctx.pop();
                    let result = runtime::operator_greater_than(&mut machine, ctx, left, right);
                    machine.heap.release(left);
                    machine.heap.release(right);

                    if let Some(result) = result {
                        ctx.push(Value::Boolean(!result));
                    }
                }

                Op::PushNil => {
                    ctx.push(Value::Nil);
                }

                Op::PushBool(value) => {
                    ctx.push(Value::Boolean(value));
                }

                Op::PushReal(value) => {
                    ctx.push(Value::Real(value));
                }

                Op::PushInt(value) => {
                    ctx.push(Value::Integer(value));
                }

                Op::PushString(string_index) => {
                    let interned = modules[ctx.active_module as usize].string(string_index);
                    let value = machine.heap.new_string(interned.bytes);
                    ctx.push(value);
                }

                Op::PushFunc(function_index) => {
                    ctx.push(Value::ScriptFunction {
                        module: ctx.active_module,
                        function: function_index as u32,
                    });
                }

                Op::PushGlobal => {
                    let global = machine.global;
                    let reference = machine.heap.reference(global);
                    ctx.push(reference);
                }

                Op::Drop => {
                    let value = ctx.pop();
                    machine.heap.release(value);
                }

                Op::Dup => {
                    let top = ctx.below_top(0);
                    let reference = machine.heap.reference(top);
                    ctx.push(reference);
                }

                Op::Dup1 => {
                    let below = ctx.below_top(1);
                    let reference = machine.heap.reference(below);
                    ctx.push(reference);
                }

                Op::GetLocal(index) => {
                    let value = ctx.top_frame_mut().get_local(index as usize);
                    let reference = machine.heap.reference(value);
                    ctx.push(reference);
                }

                Op::SetLocal(index) => {
                    let value = ctx.pop();
                    ctx.top_frame_mut()
                        .set_local(machine.heap, index as usize, value);
                }

                Op::GetIndexed => {
                    let index = ctx.pop();
                    let range = ctx.pop();

                    if let Some(item) = runtime::get_indexed(&mut machine, ctx, range, index) {
                        ctx.push(item);
                    }

                    machine.heap.release(range);
                    machine.heap.release(index);
                }

                Op::SetIndexed => {
                    let index = ctx.pop();
                    let range = ctx.pop();
                    let value = ctx.pop();

                    runtime::set_indexed(&mut machine, ctx, range, index, value);

                    machine.heap.release(range);
                    machine.heap.release(index);
                }

                Op::GetProperty(string_index) => {
                    let object = ctx.pop();
                    let name = modules[ctx.active_module as usize].string(string_index);
                    let prop = PropName::from_parts(name.hash, name.bytes);

                    if let Some(value) = runtime::get_property(&mut machine, ctx, object, &prop, true)
                    {
                        ctx.push(value);
                    }

                    machine.heap.release(object);
                }

                Op::SetMember(string_index) => {
                    let object = ctx.pop();
                    let value = ctx.pop();
                    let name = modules[ctx.active_module as usize].string(string_index);
                    let prop = PropName::from_parts(name.hash, name.bytes);

                    runtime::set_member(&mut machine, ctx, object, &prop, value);

                    machine.heap.release(object);
                }

                Op::Assert(string_index) => {
                    let value = ctx.pop();
                    let condition = runtime::as_boolean(&mut machine, ctx, value);
                    machine.heap.release(value);

                    if condition == Some(false) {
                        let expression = modules[ctx.active_module as usize].string(string_index);
                        let message = format!(
                            "failed assertion `{}`",
                            String::from_utf8_lossy(expression.bytes)
                        );
                        ctx.raise_with_message(&mut machine, &message);
                    }
                }

                Op::NewList(count) => {
                    let list = machine.heap.new_list(count as usize);
                    let handle = list.container_handle().expect("fresh list");

                    // Popped in reverse so the list keeps the push order.
                    for index in (0..count as usize).rev() {
                        let value = ctx.pop();
                        machine.heap.list_set_item(handle, index, value);
                    }

                    ctx.push(list);
                }

                Op::NewObj => {
                    let object = machine.heap.new_object();
                    ctx.push(object);
                }
            }

            if ctx.state() == State::RaisedException {
                Self::unwind(&mut machine, ctx);
            }
        }
    }

    /// Scans frames top-down for a handler covering the raising pc; pops
    /// frames without one. On a hit the operand stack is truncated to the
    /// matching frame's base and the pending exception is pushed.
    fn unwind(machine: &mut Machine<'_>, ctx: &mut ActivationContext) {
        let mut frame_switch = false;
        let mut found = false;

        while let Some(frame) = ctx.frames.last() {
            // The frame at raise time is scanned with the raising pc;
            // frames below it with the resume pc they flushed when calling
            // out, which addresses their own call site.
            let pc = if frame_switch { frame.saved_pc } else { ctx.pc };
            let function =
                machine.modules[frame.module_index as usize].function(frame.function_index);

            if let Some(at) = pc.checked_sub(1) {
                for handler in &function.exception_handlers {
                    if handler.covers(at) {
                        ctx.pc = handler.handler;
                        found = true;
                        break;
                    }
                }
            }

            if found {
                break;
            }

            let frame = ctx.frames.pop().expect("frame present");
            for value in frame.locals {
                machine.heap.release(value);
            }

            frame_switch = true;
        }

        if !found {
            // No handler anywhere; the context finishes in the raised state.
            return;
        }

        if frame_switch {
            let top = ctx.frames.last().expect("handler frame");
            ctx.active_module = top.module_index;
        }

        let base = ctx.frames.last().expect("handler frame").stack_base;

        while ctx.stack_height() > base {
            let value = ctx.pop();
            machine.heap.release(value);
        }

        let exception = std::mem::replace(&mut ctx.exception, Value::Undefined);
        ctx.push(exception);
        ctx.resume();
    }
}
