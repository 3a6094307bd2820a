//! Integration tests for the dispatch loop: calls, returns, unwinding,
//! switch tables and native interop.

use std::sync::Arc;

use quill_vm::bytecode::{
    ArgumentList, CompiledModule, HandlerRange, Instruction, InstructionOrigin, Op, ScriptFunction,
    SwitchTable, SwitchValue, MAIN_FUNCTION_NAME,
};
use quill_vm::heap::PropName;
use quill_vm::{ActivationContext, NativeCallContext, State, Value, Vm, VmError};

/// A module whose whole code array is one `.main` taking no arguments.
fn main_only_module(code: Vec<Instruction>) -> CompiledModule {
    CompiledModule {
        dependencies: Vec::new(),
        functions: vec![ScriptFunction {
            name: MAIN_FUNCTION_NAME.into(),
            arguments: ArgumentList::Explicit { count: 0 },
            start: 0,
            length: code.len() as u32,
            exception_handlers: Vec::new(),
        }],
        code,
        string_pool: Vec::new(),
        switch_tables: Vec::new(),
    }
}

fn run(vm: &mut Vm, module: &CompiledModule) -> ActivationContext {
    let module_index = vm.load_module(module).expect("module loads");
    let mut ctx = ActivationContext::new();
    assert!(vm.call_main_function(&mut ctx, module_index));
    vm.execute(&mut ctx);
    ctx
}

fn exception_desc(vm: &mut Vm, ctx: &ActivationContext) -> String {
    let handle = ctx.exception().container_handle().expect("exception object");
    let desc = vm
        .heap_mut()
        .object_clone_property(handle, &PropName::new(b"desc"));
    let Value::String(string) = desc else {
        panic!("exception without desc");
    };

    let text = String::from_utf8_lossy(vm.heap().string_bytes(string)).into_owned();
    vm.heap_mut().release(desc);
    text
}

#[test]
fn test_arithmetic_and_return() {
    let mut vm = Vm::new();
    let module = main_only_module(vec![
        Instruction::new(Op::PushInt(1)),
        Instruction::new(Op::PushInt(2)),
        Instruction::new(Op::PushInt(3)),
        Instruction::new(Op::Mul),
        Instruction::new(Op::Add),
        Instruction::new(Op::Ret),
    ]);

    let mut ctx = run(&mut vm, &module);

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert!(matches!(ctx.pop(), Value::Integer(7)));
    assert!(ctx.exception().is_undefined());
}

#[test]
fn test_dup1_duplicates_below_top() {
    let mut vm = Vm::new();
    let module = main_only_module(vec![
        Instruction::new(Op::PushInt(1)),
        Instruction::new(Op::PushInt(2)),
        Instruction::new(Op::Dup1),
        Instruction::new(Op::Ret),
    ]);

    let mut ctx = run(&mut vm, &module);

    assert_eq!(ctx.stack_height(), 3);
    assert!(matches!(ctx.pop(), Value::Integer(1)));
    assert!(matches!(ctx.pop(), Value::Integer(2)));
    assert!(matches!(ctx.pop(), Value::Integer(1)));
}

#[test]
fn test_handler_in_raising_frame_truncates_stack() {
    let mut vm = Vm::new();
    let mut module = main_only_module(vec![
        Instruction::new(Op::PushInt(9)),
        Instruction::new(Op::PushInt(8)),
        Instruction::new(Op::NewObj),
        Instruction::new(Op::ThrowVar),
        Instruction::new(Op::Ret),
        // handler
        Instruction::new(Op::Ret),
    ]);
    module.functions[0].exception_handlers.push(HandlerRange {
        start: 0,
        length: 5,
        handler: 5,
    });

    let mut ctx = run(&mut vm, &module);

    assert_eq!(ctx.state(), State::ReturnedValue);
    // Exactly the exception on top of the frame base.
    assert_eq!(ctx.stack_height(), 1);
    assert!(ctx.pop().is_object());
    assert!(ctx.exception().is_undefined());
}

#[test]
fn test_exception_unwinds_across_frames_to_call_site_handler() {
    let mut vm = Vm::new();
    let mut module = main_only_module(vec![
        // .main
        Instruction::new(Op::Args(0)),
        Instruction::new(Op::CallFunc(1)),
        Instruction::new(Op::PushNil),
        Instruction::new(Op::Ret),
        // handler: return the caught exception
        Instruction::new(Op::Ret),
        // boom()
        Instruction::new(Op::NewObj),
        Instruction::new(Op::ThrowVar),
        Instruction::new(Op::Ret),
    ]);
    module.functions[0].length = 5;
    module.functions[0].exception_handlers.push(HandlerRange {
        start: 0,
        length: 4,
        handler: 4,
    });
    module.functions.push(ScriptFunction {
        name: "boom".into(),
        arguments: ArgumentList::Explicit { count: 0 },
        start: 5,
        length: 3,
        exception_handlers: Vec::new(),
    });

    let mut ctx = run(&mut vm, &module);

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert_eq!(ctx.stack_height(), 1);

    let result = ctx.pop();
    assert!(result.is_object());
    vm.heap_mut().release(result);
}

#[test]
fn test_uncaught_exception_finishes_raised() {
    let mut vm = Vm::new();
    let module = main_only_module(vec![
        Instruction::new(Op::NewObj),
        Instruction::new(Op::ThrowVar),
        Instruction::new(Op::Ret),
    ]);

    let ctx = run(&mut vm, &module);

    assert_eq!(ctx.state(), State::RaisedException);
    assert!(ctx.exception().is_object());
}

#[test]
fn test_arity_mismatch_raises_without_entering_callee() {
    let mut vm = Vm::new();
    let mut module = main_only_module(vec![
        // .main: call two_args with three arguments
        Instruction::new(Op::PushInt(1)),
        Instruction::new(Op::PushInt(2)),
        Instruction::new(Op::PushInt(3)),
        Instruction::new(Op::Args(3)),
        Instruction::new(Op::CallFunc(1)),
        Instruction::new(Op::Ret),
        // two_args(a, b): would return 42 if it ever ran
        Instruction::new(Op::PushInt(42)),
        Instruction::new(Op::Ret),
    ]);
    module.functions[0].length = 6;
    module.functions.push(ScriptFunction {
        name: "two_args".into(),
        arguments: ArgumentList::Explicit { count: 2 },
        start: 6,
        length: 2,
        exception_handlers: Vec::new(),
    });

    let ctx = run(&mut vm, &module);

    assert_eq!(ctx.state(), State::RaisedException);
    assert!(exception_desc(&mut vm, &ctx).contains("Incorrect number of arguments"));
}

#[test]
fn test_script_call_binds_arguments_in_source_order() {
    let mut vm = Vm::new();
    let mut module = main_only_module(vec![
        // .main: sub2(10, 4) with arguments pushed in reverse source order
        Instruction::new(Op::PushInt(4)),
        Instruction::new(Op::PushInt(10)),
        Instruction::new(Op::Args(2)),
        Instruction::new(Op::CallFunc(1)),
        Instruction::new(Op::Ret),
        // sub2(a, b) = a - b
        Instruction::new(Op::GetLocal(1)),
        Instruction::new(Op::GetLocal(2)),
        Instruction::new(Op::Sub),
        Instruction::new(Op::Ret),
    ]);
    module.functions[0].length = 5;
    module.functions.push(ScriptFunction {
        name: "sub2".into(),
        arguments: ArgumentList::Explicit { count: 2 },
        start: 5,
        length: 4,
        exception_handlers: Vec::new(),
    });

    let mut ctx = run(&mut vm, &module);

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert!(matches!(ctx.pop(), Value::Integer(6)));
}

#[test]
fn test_switch_falls_back_to_else_handler() {
    let mut vm = Vm::new();
    let mut module = main_only_module(vec![
        Instruction::new(Op::PushInt(7)),
        Instruction::new(Op::Switch(0)),
        Instruction::new(Op::PushString(0)),
        Instruction::new(Op::Ret),
        Instruction::new(Op::PushString(1)),
        Instruction::new(Op::Ret),
        Instruction::new(Op::PushString(2)),
        Instruction::new(Op::Ret),
    ]);
    module.string_pool = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
    module.switch_tables.push(SwitchTable {
        cases: vec![SwitchValue::Integer(1), SwitchValue::Integer(2)],
        handlers: vec![2, 4, 6],
    });

    let mut ctx = run(&mut vm, &module);

    assert_eq!(ctx.state(), State::ReturnedValue);
    let result = ctx.pop();
    let Value::String(handle) = result else {
        panic!("expected a string result");
    };
    assert_eq!(vm.heap().string_bytes(handle), b"c");
    vm.heap_mut().release(result);
}

#[test]
fn test_switch_selects_matching_case() {
    let mut vm = Vm::new();
    let mut module = main_only_module(vec![
        Instruction::new(Op::PushInt(2)),
        Instruction::new(Op::Switch(0)),
        Instruction::new(Op::PushInt(100)),
        Instruction::new(Op::Ret),
        Instruction::new(Op::PushInt(200)),
        Instruction::new(Op::Ret),
        Instruction::new(Op::PushInt(300)),
        Instruction::new(Op::Ret),
    ]);
    module.switch_tables.push(SwitchTable {
        cases: vec![SwitchValue::Integer(1), SwitchValue::Integer(2)],
        handlers: vec![2, 4, 6],
    });

    let mut ctx = run(&mut vm, &module);

    assert!(matches!(ctx.pop(), Value::Integer(200)));
}

fn native_sum2(ctx: &mut NativeCallContext<'_, '_>) {
    let first = ctx.arg(0);
    let second = ctx.arg(1);

    let Some(first) = ctx.as_integer(first) else {
        return;
    };
    let Some(second) = ctx.as_integer(second) else {
        return;
    };

    ctx.set_return_value(Value::Integer(first + second));
}

#[test]
fn test_call_ext_invokes_registered_native() {
    let mut vm = Vm::new();
    vm.register_callback("sum2", native_sum2).unwrap();

    let mut module = main_only_module(vec![
        Instruction::new(Op::PushInt(20)),
        Instruction::new(Op::PushInt(10)),
        Instruction::new(Op::Args(2)),
        Instruction::new(Op::CallExt(0)),
        Instruction::new(Op::Ret),
    ]);
    module.dependencies.push("sum2".into());

    let mut ctx = run(&mut vm, &module);

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert!(matches!(ctx.pop(), Value::Integer(30)));
    // Arguments were popped by the VM after the native returned.
    assert_eq!(ctx.stack_height(), 0);
}

#[test]
fn test_unresolved_external_fails_module_load() {
    let mut vm = Vm::new();
    let mut module = main_only_module(vec![Instruction::new(Op::Ret)]);
    module.dependencies.push("nowhere".into());

    let error = vm.load_module(&module).unwrap_err();
    assert!(matches!(error, VmError::UnresolvedExternal { .. }));
}

#[test]
fn test_invoke_dispatches_builtin_list_method() {
    let mut vm = Vm::new();
    let mut module = main_only_module(vec![
        // local 1 = []
        Instruction::new(Op::NewList(0)),
        Instruction::new(Op::SetLocal(1)),
        // local1.add(5)
        Instruction::new(Op::PushInt(5)),
        Instruction::new(Op::Args(1)),
        Instruction::new(Op::GetLocal(1)),
        Instruction::new(Op::Invoke(0)),
        Instruction::new(Op::Drop),
        // return local1.length
        Instruction::new(Op::GetLocal(1)),
        Instruction::new(Op::GetProperty(1)),
        Instruction::new(Op::Ret),
    ]);
    module.string_pool = vec![b"add".to_vec(), b"length".to_vec()];

    let mut ctx = run(&mut vm, &module);

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert!(matches!(ctx.pop(), Value::Integer(1)));
}

#[test]
fn test_invoke_dispatches_object_method_with_receiver() {
    let mut vm = Vm::new();
    let mut module = main_only_module(vec![
        // .main: o = new obj; o.get = getter; o.tag = 7; return o.get()
        Instruction::new(Op::NewObj),
        Instruction::new(Op::SetLocal(1)),
        Instruction::new(Op::PushFunc(1)),
        Instruction::new(Op::GetLocal(1)),
        Instruction::new(Op::SetMember(0)),
        Instruction::new(Op::PushInt(7)),
        Instruction::new(Op::GetLocal(1)),
        Instruction::new(Op::SetMember(1)),
        Instruction::new(Op::Args(0)),
        Instruction::new(Op::GetLocal(1)),
        Instruction::new(Op::Invoke(0)),
        Instruction::new(Op::Ret),
        // getter(): return this.tag
        Instruction::new(Op::GetLocal(0)),
        Instruction::new(Op::GetProperty(1)),
        Instruction::new(Op::Ret),
    ]);
    module.functions[0].length = 12;
    module.functions.push(ScriptFunction {
        name: "getter".into(),
        arguments: ArgumentList::Explicit { count: 0 },
        start: 12,
        length: 3,
        exception_handlers: Vec::new(),
    });
    module.string_pool = vec![b"get".to_vec(), b"tag".to_vec()];

    let mut ctx = run(&mut vm, &module);

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert!(matches!(ctx.pop(), Value::Integer(7)));
}

fn native_pause(ctx: &mut NativeCallContext<'_, '_>) {
    ctx.activation().suspend();
}

#[test]
fn test_suspend_and_resume() {
    let mut vm = Vm::new();
    vm.register_callback("pause", native_pause).unwrap();

    let mut module = main_only_module(vec![
        Instruction::new(Op::Args(0)),
        Instruction::new(Op::CallExt(0)),
        Instruction::new(Op::Drop),
        Instruction::new(Op::PushInt(5)),
        Instruction::new(Op::Ret),
    ]);
    module.dependencies.push("pause".into());

    let module_index = vm.load_module(&module).unwrap();
    let mut ctx = ActivationContext::new();
    assert!(vm.call_main_function(&mut ctx, module_index));

    vm.execute(&mut ctx);
    assert_eq!(ctx.state(), State::Suspended);

    ctx.resume();
    vm.execute(&mut ctx);

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert!(matches!(ctx.pop(), Value::Integer(5)));
}

#[test]
fn test_stacktrace_walks_frames_with_origins() {
    let unit: Arc<str> = Arc::from("test.q");
    let main_name: Arc<str> = Arc::from(MAIN_FUNCTION_NAME);
    let boom_name: Arc<str> = Arc::from("boom");

    let origin_at = |function: &Arc<str>, line: u32| {
        Arc::new(InstructionOrigin {
            unit: Arc::clone(&unit),
            function: Arc::clone(function),
            line,
        })
    };

    let mut vm = Vm::new();
    let mut module = main_only_module(vec![
        Instruction::with_origin(Op::Args(0), origin_at(&main_name, 10)),
        Instruction::with_origin(Op::CallFunc(1), origin_at(&main_name, 10)),
        Instruction::with_origin(Op::Ret, origin_at(&main_name, 11)),
        Instruction::with_origin(Op::NewObj, origin_at(&boom_name, 3)),
        Instruction::with_origin(Op::ThrowVar, origin_at(&boom_name, 3)),
        Instruction::with_origin(Op::Ret, origin_at(&boom_name, 4)),
    ]);
    module.functions[0].length = 3;
    module.functions.push(ScriptFunction {
        name: "boom".into(),
        arguments: ArgumentList::Explicit { count: 0 },
        start: 3,
        length: 3,
        exception_handlers: Vec::new(),
    });

    let ctx = run(&mut vm, &module);
    assert_eq!(ctx.state(), State::RaisedException);

    let exception = ctx.exception().container_handle().unwrap();
    let stacktrace = vm
        .heap_mut()
        .object_clone_property(exception, &PropName::new(b"stacktrace"));
    let trace_handle = stacktrace.container_handle().expect("stacktrace list");

    let lines: Vec<String> = vm
        .heap()
        .list(trace_handle)
        .items
        .iter()
        .map(|item| {
            let Value::String(handle) = item else {
                panic!("stacktrace entries are strings");
            };
            String::from_utf8_lossy(vm.heap().string_bytes(*handle)).into_owned()
        })
        .collect();

    assert_eq!(lines, vec!["boom (test.q:3)", ".main (test.q:10)"]);
    vm.heap_mut().release(stacktrace);
}

#[test]
fn test_teardown_and_shutdown_free_everything() {
    let mut vm = Vm::new();
    let mut module = main_only_module(vec![
        // Leave garbage in locals and on the global object.
        Instruction::new(Op::NewObj),
        Instruction::new(Op::SetLocal(1)),
        Instruction::new(Op::PushString(0)),
        Instruction::new(Op::PushGlobal),
        Instruction::new(Op::SetMember(1)),
        Instruction::new(Op::NewList(0)),
        Instruction::new(Op::Ret),
    ]);
    module.string_pool = vec![b"payload".to_vec(), b"stash".to_vec()];

    let mut ctx = run(&mut vm, &module);
    assert_eq!(ctx.state(), State::ReturnedValue);

    ctx.teardown(vm.heap_mut());
    vm.shutdown();

    assert_eq!(vm.heap().live_count(), 0);
}

#[test]
fn test_static_stack_effects_add_up() {
    // A straight-line program of opcodes with a static stack effect; the
    // final height must equal the sum of the per-opcode effects.
    let ops = [
        Op::PushInt(1),
        Op::PushInt(2),
        Op::Add,
        Op::Dup,
        Op::Drop,
        Op::PushNil,
        Op::SetLocal(1),
        Op::GetLocal(1),
        Op::NewObj,
        Op::Dup1,
        Op::Drop,
    ];

    let expected: isize = ops
        .iter()
        .map(|op| {
            let (pops, pushes) = op.stack_effect().expect("static effect");
            pushes as isize - pops as isize
        })
        .sum();

    let mut code: Vec<Instruction> = ops.iter().copied().map(Instruction::new).collect();
    code.push(Instruction::new(Op::Ret));

    let mut vm = Vm::new();
    let module = main_only_module(code);
    let ctx = run(&mut vm, &module);

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert_eq!(ctx.stack_height() as isize, expected);
}

#[test]
fn test_pending_exception_iff_raised_state() {
    let mut vm = Vm::new();
    let module = main_only_module(vec![
        Instruction::new(Op::PushNil),
        Instruction::new(Op::Ret),
    ]);

    let ctx = run(&mut vm, &module);
    assert_eq!(ctx.state(), State::ReturnedValue);
    assert!(ctx.exception().is_undefined());

    let raising = main_only_module(vec![
        Instruction::new(Op::NewObj),
        Instruction::new(Op::ThrowVar),
        Instruction::new(Op::Ret),
    ]);
    let ctx = run(&mut vm, &raising);
    assert_eq!(ctx.state(), State::RaisedException);
    assert!(!ctx.exception().is_undefined());
}
