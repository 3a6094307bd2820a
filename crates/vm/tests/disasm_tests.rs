//! Golden tests for the disassembly format.

use quill_vm::bytecode::{
    ArgumentList, CompiledModule, HandlerRange, Instruction, Op, ScriptFunction, SwitchTable,
    SwitchValue, MAIN_FUNCTION_NAME,
};
use quill_vm::disasm::disassemble;

fn sample_module() -> CompiledModule {
    CompiledModule {
        dependencies: vec!["print".into()],
        functions: vec![
            ScriptFunction {
                name: MAIN_FUNCTION_NAME.into(),
                arguments: ArgumentList::Explicit { count: 0 },
                start: 0,
                length: 8,
                exception_handlers: vec![HandlerRange {
                    start: 0,
                    length: 6,
                    handler: 7,
                }],
            },
            ScriptFunction {
                name: "greet".into(),
                arguments: ArgumentList::Explicit { count: 2 },
                start: 8,
                length: 3,
                exception_handlers: Vec::new(),
            },
        ],
        code: vec![
            Instruction::new(Op::PushString(0)),
            Instruction::new(Op::SetLocal(1)),
            Instruction::new(Op::PushInt(2)),
            Instruction::new(Op::Switch(0)),
            Instruction::new(Op::PushReal(0.5)),
            Instruction::new(Op::Drop),
            Instruction::new(Op::Jmp(0x0007)),
            Instruction::new(Op::Ret),
            Instruction::new(Op::GetLocal(0)),
            Instruction::new(Op::PushFunc(1)),
            Instruction::new(Op::Ret),
        ],
        string_pool: vec![b"hello".to_vec(), b"world".to_vec()],
        switch_tables: vec![SwitchTable {
            cases: vec![SwitchValue::Integer(1), SwitchValue::String(b"two".to_vec())],
            handlers: vec![4, 5, 6],
        }],
    }
}

#[test]
fn test_disassembly_golden() {
    let expected = "\
; 2 functions in module
def `.main` at 0000h length 0008h\t;   0, 0 explicit arguments, 1 exception handlers
def `greet` at 0008h length 0003h\t;   1, 2 explicit arguments, 0 exception handlers

; 1 dependencies
import `print`\t;   0

; def `.main`()
; eh 0: <0000; 0006) => 0007
0000\t1f\tpushc.s 0\t; 'hello'
0001\t26\tsetLocal 1
0002\t1e\tpushc.i 2
0003\t0a\tswitch
              case 1 : 0004h
              case 'two' : 0005h
              default : 0006h
0004\t1d\tpushc.f 0.5
0005\t22\tdrop
0006\t06\tjmp 0007h
0007\t09\tret
; def `greet`(arg0, arg1)
0008\t25\tgetLocal 0\t; `this`
0009\t20\tpushc.func 0001h\t; `greet`
000a\t09\tret

; 2 strings
string 'hello'\t;   0
string 'world'\t;   1
";

    assert_eq!(disassemble(&sample_module()), expected);
}

#[test]
fn test_disassembly_is_deterministic() {
    let module = sample_module();
    assert_eq!(disassemble(&module), disassemble(&module));
}
