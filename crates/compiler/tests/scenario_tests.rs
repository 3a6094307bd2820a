//! End-to-end tests: compile source text and execute it on the VM.

use proptest::prelude::*;
use quill_compiler::{compile_source, optimize, CodegenOptions};
use quill_vm::disasm::disassemble;
use quill_vm::heap::PropName;
use quill_vm::{ActivationContext, State, Value, Vm};

fn run_source(source: &str) -> (Vm, ActivationContext) {
    let module = compile_source(source, &CodegenOptions::default()).expect("compiles");

    let mut vm = Vm::new();
    let module_index = vm.load_module(&module).expect("loads");

    let mut ctx = ActivationContext::new();
    assert!(vm.call_main_function(&mut ctx, module_index));
    vm.execute(&mut ctx);

    (vm, ctx)
}

fn returned_string(vm: &Vm, value: Value) -> String {
    let Value::String(handle) = value else {
        panic!("expected a string, got {}", value.type_name());
    };

    String::from_utf8_lossy(vm.heap().string_bytes(handle)).into_owned()
}

fn exception_property(vm: &mut Vm, ctx: &ActivationContext, name: &[u8]) -> Value {
    let handle = ctx.exception().container_handle().expect("exception object");
    vm.heap_mut()
        .object_clone_property(handle, &PropName::new(name))
}

fn exception_desc(vm: &mut Vm, ctx: &ActivationContext) -> String {
    let desc = exception_property(vm, ctx, b"desc");
    let text = returned_string(vm, desc);
    vm.heap_mut().release(desc);
    text
}

#[test]
fn test_arithmetic_and_return() {
    let (_, mut ctx) = run_source("return 1 + 2 * 3;");

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert!(matches!(ctx.pop(), Value::Integer(7)));
}

#[test]
fn test_exception_catch_returns_desc() {
    let (vm, mut ctx) = run_source("try { throw { desc: 'x' }; } catch e { return e.desc; }");

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert_eq!(returned_string(&vm, ctx.pop()), "x");
}

#[test]
fn test_cycle_is_reclaimed_after_run() {
    let (mut vm, mut ctx) = run_source(
        "a = {};\n\
         b = {};\n\
         a.x = b;\n\
         b.x = a;\n\
         a = nil;\n\
         b = nil;\n\
         return nil;",
    );

    assert_eq!(ctx.state(), State::ReturnedValue);

    ctx.teardown(vm.heap_mut());
    vm.collect_garbage(quill_vm::CollectReason::Explicit);

    // Only the global object remains.
    assert_eq!(vm.heap().live_containers(), 1);
}

#[test]
fn test_missing_property_raises_with_name() {
    let (mut vm, ctx) = run_source("o = {};\nreturn o.missing;");

    assert_eq!(ctx.state(), State::RaisedException);
    assert!(exception_desc(&mut vm, &ctx).contains("missing"));
}

#[test]
fn test_arity_mismatch_raises() {
    let (mut vm, ctx) = run_source("function f(a, b) { return a; }\nreturn f(1, 2, 3);");

    assert_eq!(ctx.state(), State::RaisedException);
    assert!(exception_desc(&mut vm, &ctx).contains("Incorrect number of arguments"));
}

#[test]
fn test_switch_else_handler() {
    let (vm, mut ctx) = run_source(
        "x = 7;\nswitch x { 1: return 'a', 2: return 'b', else: return 'c' }\nreturn 'after';",
    );

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert_eq!(returned_string(&vm, ctx.pop()), "c");
}

#[test]
fn test_switch_matching_case_and_multi_value_cases() {
    let (vm, mut ctx) = run_source(
        "x = 3;\nswitch x { 1: return 'one', 2, 3: return 'few', else: return 'many' }",
    );

    assert_eq!(returned_string(&vm, ctx.pop()), "few");
}

#[test]
fn test_function_calls_and_recursion() {
    let (_, mut ctx) = run_source(
        "function fib(n) {\n\
         \tif n < 2 { return n; }\n\
         \treturn fib(n - 1) + fib(n - 2);\n\
         }\n\
         return fib(10);",
    );

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert!(matches!(ctx.pop(), Value::Integer(55)));
}

#[test]
fn test_while_loop_accumulates() {
    let (_, mut ctx) = run_source(
        "total = 0;\n\
         n = 1;\n\
         while n <= 4 {\n\
         \ttotal = total + n;\n\
         \tn = n + 1;\n\
         }\n\
         return total;",
    );

    assert!(matches!(ctx.pop(), Value::Integer(10)));
}

#[test]
fn test_for_loop() {
    let (_, mut ctx) = run_source(
        "total = 0;\nfor i = 0; i < 5; i = i + 1 { total = total + i; }\nreturn total;",
    );

    assert!(matches!(ctx.pop(), Value::Integer(10)));
}

#[test]
fn test_iterate_over_list() {
    let (_, mut ctx) = run_source(
        "l = (1, 2, 3);\ntotal = 0;\niterate v in l { total = total + v; }\nreturn total;",
    );

    assert!(matches!(ctx.pop(), Value::Integer(6)));
}

#[test]
fn test_list_builtins_and_indexing() {
    let (_, mut ctx) = run_source(
        "l = ();\nl.add(4);\nl.add(5);\nl[1] = 6;\nreturn l[0] + l[1] + l.length;",
    );

    assert!(matches!(ctx.pop(), Value::Integer(12)));
}

#[test]
fn test_string_builtins() {
    let (_, mut ctx) = run_source("s = 'hello';\nreturn s.startsWith('he') && s.endsWith('lo');");

    assert!(matches!(ctx.pop(), Value::Boolean(true)));
}

#[test]
fn test_string_concatenation_and_length() {
    let (vm, mut ctx) = run_source("s = 'count: ' + 3;\nreturn s + '!';");

    assert_eq!(returned_string(&vm, ctx.pop()), "count: 3!");
}

#[test]
fn test_string_length_and_indexing_are_byte_oriented() {
    // 'é' is two bytes in the source; length counts bytes, not code points.
    let (_, mut ctx) = run_source("return '\u{e9}!'.length;");
    assert!(matches!(ctx.pop(), Value::Integer(3)));

    // Indexing yields the raw byte value.
    let (_, mut ctx) = run_source("return '\u{e9}'[0];");
    assert!(matches!(ctx.pop(), Value::Integer(0xc3)));
}

#[test]
fn test_class_desugars_to_objects_and_functions() {
    let (_, mut ctx) = run_source(
        "class Counter {\n\
         \tmember count = 0;\n\
         \tconstructor(start) { count = start; }\n\
         \tbump() { count = count + 1; }\n\
         \tvalue() { return count; }\n\
         }\n\
         c = Counter(5);\n\
         c.bump();\n\
         c.bump();\n\
         return c.value();",
    );

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert!(matches!(ctx.pop(), Value::Integer(7)));
}

#[test]
fn test_anonymous_function_value() {
    let (_, mut ctx) = run_source("f = function (x) { return x * 2; };\nreturn f(21);");

    assert!(matches!(ctx.pop(), Value::Integer(42)));
}

#[test]
fn test_exception_unwinds_across_script_frames() {
    let (vm, mut ctx) = run_source(
        "function boom() { throw { desc: 'kaboom' }; }\n\
         try { boom(); } catch e { return e.desc; }",
    );

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert_eq!(returned_string(&vm, ctx.pop()), "kaboom");
}

#[test]
fn test_uncaught_exception_carries_exit_code_property() {
    let (mut vm, ctx) = run_source("throw { desc: 'bye', exitCode: 3 };");

    assert_eq!(ctx.state(), State::RaisedException);
    let exit_code = exception_property(&mut vm, &ctx, b"exitCode");
    assert!(matches!(exit_code, Value::Integer(3)));
}

#[test]
fn test_assert_failure_reports_expression_text() {
    let (mut vm, ctx) = run_source("assert 1 == 2;");

    assert_eq!(ctx.state(), State::RaisedException);
    assert_eq!(exception_desc(&mut vm, &ctx), "failed assertion `1 == 2`");
}

#[test]
fn test_assert_success_continues() {
    let (_, mut ctx) = run_source("assert 2 == 2;\nreturn 1;");

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert!(matches!(ctx.pop(), Value::Integer(1)));
}

#[test]
fn test_object_merge_operator() {
    let (_, mut ctx) = run_source("return ({ a: 1 } + { b: 2 }).b;");

    assert!(matches!(ctx.pop(), Value::Integer(2)));
}

#[test]
fn test_globals_are_shared_through_global_object() {
    let (_, mut ctx) = run_source(
        "_global.counter = 1;\n\
         function bump() { _global.counter = _global.counter + 1; }\n\
         bump();\n\
         bump();\n\
         return _global.counter;",
    );

    assert!(matches!(ctx.pop(), Value::Integer(3)));
}

#[test]
fn test_script_without_return_yields_this() {
    let (_, mut ctx) = run_source("x = 1;");

    // The implicit trailing `return this` surfaces main's unbound slot 0.
    assert_eq!(ctx.state(), State::ReturnedValue);
    assert!(ctx.pop().is_undefined());
}

#[test]
fn test_stacktrace_lists_function_and_line() {
    let (mut vm, ctx) = run_source("function boom() {\n\tthrow { desc: 'x' };\n}\nboom();");

    assert_eq!(ctx.state(), State::RaisedException);

    let stacktrace = exception_property(&mut vm, &ctx, b"stacktrace");
    let handle = stacktrace.container_handle().expect("stacktrace list");

    let first = vm.heap().list(handle).items[0];
    let Value::String(line) = first else {
        panic!("stacktrace entries are strings");
    };
    let text = String::from_utf8_lossy(vm.heap().string_bytes(line)).into_owned();

    assert_eq!(text, "boom (<script>:2)");
    vm.heap_mut().release(stacktrace);
}

#[test]
fn test_compilation_is_deterministic() {
    let source = "function f(a) { return a + 1; }\nswitch f(1) { 2: return 'two', else: return 'other' }";
    let options = CodegenOptions::default();

    let first = compile_source(source, &options).unwrap();
    let second = compile_source(source, &options).unwrap();

    assert_eq!(disassemble(&first), disassemble(&second));
}

#[test]
fn test_optimized_module_still_runs() {
    let source = "5;\n'unused';\nreturn 2;";
    let options = CodegenOptions::default();

    let mut module = compile_source(source, &options).unwrap();
    let removed = optimize(&mut module);
    assert!(removed >= 4);

    let mut vm = Vm::new();
    let module_index = vm.load_module(&module).unwrap();

    let mut ctx = ActivationContext::new();
    assert!(vm.call_main_function(&mut ctx, module_index));
    vm.execute(&mut ctx);

    assert_eq!(ctx.state(), State::ReturnedValue);
    assert!(matches!(ctx.pop(), Value::Integer(2)));
}

proptest! {
    /// Integer arithmetic round-trips through the whole pipeline.
    #[test]
    fn prop_integer_expressions_evaluate(a in -1000i64..1000, b in -1000i64..1000) {
        let source = format!("return {a} + {b} * 2;");
        let (_, mut ctx) = run_source(&source);

        prop_assert_eq!(ctx.state(), State::ReturnedValue);
        let result = ctx.pop();
        prop_assert!(matches!(result, Value::Integer(value) if value == a + b * 2));
    }

    /// Thrown constants always come back out of an enclosing catch.
    #[test]
    fn prop_thrown_value_is_caught(payload in 0i64..10_000) {
        let source =
            format!("try {{ throw {{ code: {payload} }}; }} catch e {{ return e.code; }}");
        let (_, mut ctx) = run_source(&source);

        prop_assert_eq!(ctx.state(), State::ReturnedValue);
        prop_assert!(matches!(ctx.pop(), Value::Integer(value) if value == payload));
    }
}

#[test]
fn test_teardown_leaves_no_allocations() {
    let (mut vm, mut ctx) = run_source(
        "l = ('a', 'b', 'c');\n\
         o = { items: l, label: 'box' };\n\
         _global.keep = o;\n\
         return o;",
    );

    assert_eq!(ctx.state(), State::ReturnedValue);

    ctx.teardown(vm.heap_mut());
    vm.shutdown();

    assert_eq!(vm.heap().live_count(), 0);
}
