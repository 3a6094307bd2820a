//! Human-readable disassembly of compiled modules.
//!
//! The output is deterministic for a given module and stable enough to
//! drive golden-file tests: one header line per function, the import list,
//! one line per instruction (`pc 04x`, opcode byte, mnemonic, operand,
//! optional annotation), switch tables expanded one line per case, and a
//! trailing string-pool listing.

use std::fmt::Write;

use crate::bytecode::{CompiledModule, Op, SwitchValue, LOCAL_THIS};

/// Disassembles a whole module into one string.
pub fn disassemble(module: &CompiledModule) -> String {
    let mut out = String::new();
    let mut sink = |line: &str| {
        out.push_str(line);
        out.push('\n');
    };
    disassemble_to(module, &mut sink);
    out
}

/// Disassembles a module line by line into `sink`.
pub fn disassemble_to(module: &CompiledModule, sink: &mut dyn FnMut(&str)) {
    sink(&format!("; {} functions in module", module.functions.len()));

    for (index, function) in module.functions.iter().enumerate() {
        sink(&format!(
            "def `{}` at {:04X}h length {:04X}h\t; {:3}, {} explicit arguments, {} exception handlers",
            function.name,
            function.start,
            function.length,
            index,
            function.num_args(),
            function.exception_handlers.len()
        ));
    }

    sink("");
    sink(&format!("; {} dependencies", module.dependencies.len()));

    for (index, name) in module.dependencies.iter().enumerate() {
        sink(&format!("import `{name}`\t; {index:3}"));
    }

    sink("");

    for (pc, instruction) in module.code.iter().enumerate() {
        if let Some(function) = module
            .functions
            .iter()
            .find(|function| function.start as usize == pc)
        {
            let mut header = format!("; def `{}`(", function.name);

            for argument in 0..function.num_args() {
                if argument > 0 {
                    header.push_str(", ");
                }
                let _ = write!(header, "arg{argument}");
            }

            header.push(')');
            sink(&header);

            for (index, handler) in function.exception_handlers.iter().enumerate() {
                sink(&format!(
                    "; eh {}: <{:04X}; {:04X}) => {:04X}",
                    index,
                    handler.start,
                    handler.start + handler.length,
                    handler.handler
                ));
            }
        }

        let op = instruction.op;
        let mut line = format!("{:04x}\t{:02x}\t{}", pc, op.code(), op.mnemonic());

        match op {
            Op::Jmp(address) | Op::JmpTrue(address) | Op::JmpFalse(address) => {
                let _ = write!(line, " {address:04X}h");
            }

            Op::CallFunc(function) | Op::PushFunc(function) => {
                let _ = write!(
                    line,
                    " {:04X}h\t; `{}`",
                    function, module.functions[function as usize].name
                );
            }

            Op::Args(value) | Op::CallExt(value) | Op::NewList(value) => {
                let _ = write!(line, " {value}");
            }

            Op::PushBool(value) => {
                let _ = write!(line, " {}", value as i64);
            }

            Op::PushInt(value) => {
                let _ = write!(line, " {value}");
            }

            Op::PushReal(value) => {
                let _ = write!(line, " {value}");
            }

            Op::GetLocal(index) | Op::SetLocal(index) => {
                let _ = write!(line, " {index}");

                if index == LOCAL_THIS {
                    line.push_str("\t; `this`");
                }
            }

            Op::Invoke(index)
            | Op::PushString(index)
            | Op::GetProperty(index)
            | Op::SetMember(index)
            | Op::Assert(index) => {
                let _ = write!(
                    line,
                    " {}\t; '{}'",
                    index,
                    String::from_utf8_lossy(&module.string_pool[index as usize])
                );
            }

            Op::Switch(table_index) => {
                sink(&line);
                line.clear();

                let table = &module.switch_tables[table_index as usize];

                for (index, handler) in table.handlers.iter().enumerate() {
                    let label = if index < table.cases.len() {
                        format!("case {}", switch_value_to_string(&table.cases[index]))
                    } else {
                        "default".to_owned()
                    };

                    sink(&format!("              {label} : {handler:04X}h"));
                }

                continue;
            }

            _ => {}
        }

        sink(&line);
    }

    sink("");
    sink(&format!("; {} strings", module.string_pool.len()));

    for (index, string) in module.string_pool.iter().enumerate() {
        sink(&format!(
            "string '{}'\t; {:3}",
            String::from_utf8_lossy(string),
            index
        ));
    }
}

fn switch_value_to_string(value: &SwitchValue) -> String {
    match value {
        SwitchValue::Nil => "nil".to_owned(),
        SwitchValue::Boolean(value) => value.to_string(),
        SwitchValue::Integer(value) => value.to_string(),
        SwitchValue::Real(value) => value.to_string(),
        SwitchValue::String(bytes) => format!("'{}'", String::from_utf8_lossy(bytes)),
    }
}
