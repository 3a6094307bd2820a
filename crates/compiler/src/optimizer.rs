//! Peephole optimizer.
//!
//! Removes `pushc.* ; drop` pairs whose `drop` is not a jump target,
//! relocating code addresses, switch-table handlers, function spans and
//! exception-handler ranges across each removal.

use quill_vm::bytecode::{CompiledModule, Op};

fn is_removable_push(op: &Op) -> bool {
    matches!(
        op,
        Op::PushReal(_) | Op::PushFunc(_) | Op::PushInt(_) | Op::PushString(_)
    )
}

/// True if any jump or switch handler targets `index`.
fn is_referenced(module: &CompiledModule, index: u32) -> bool {
    for instruction in &module.code {
        match instruction.op {
            Op::Jmp(address) | Op::JmpTrue(address) | Op::JmpFalse(address) => {
                if address == index {
                    return true;
                }
            }
            Op::Switch(table) => {
                if module.switch_tables[table as usize]
                    .handlers
                    .iter()
                    .any(|&handler| handler == index)
                {
                    return true;
                }
            }
            _ => {}
        }
    }

    false
}

fn remove_instruction(module: &mut CompiledModule, index: u32) {
    module.code.remove(index as usize);

    for instruction in &mut module.code {
        match &mut instruction.op {
            Op::Jmp(address) | Op::JmpTrue(address) | Op::JmpFalse(address) => {
                if *address > index {
                    *address -= 1;
                }
            }
            _ => {}
        }
    }

    for table in &mut module.switch_tables {
        for handler in &mut table.handlers {
            if *handler > index {
                *handler -= 1;
            }
        }
    }

    for function in &mut module.functions {
        let starts_after = index < function.start;
        let within = !starts_after && index < function.start + function.length;

        if starts_after {
            function.start -= 1;
        } else if within {
            function.length -= 1;
        } else {
            // The function lies entirely before the removal point.
            continue;
        }

        for handler in &mut function.exception_handlers {
            if index < handler.start {
                handler.start -= 1;
            } else if index < handler.start + handler.length {
                handler.length -= 1;
            }

            if index < handler.handler {
                handler.handler -= 1;
            }
        }
    }
}

/// Runs the peephole pass over a whole module. Returns the number of
/// instructions removed.
pub fn optimize(module: &mut CompiledModule) -> usize {
    let before = module.code.len();
    let mut index = 0usize;

    while index < module.code.len() {
        // Removals always happen back to front within a window.
        let current = &module.code[index].op;
        let next = module.code.get(index + 1).map(|instruction| &instruction.op);

        if is_removable_push(current)
            && matches!(next, Some(Op::Drop))
            && !is_referenced(module, (index + 1) as u32)
        {
            remove_instruction(module, (index + 1) as u32);
            remove_instruction(module, index as u32);

            index = index.saturating_sub(3);
            continue;
        }

        index += 1;
    }

    let removed = before - module.code.len();

    if removed > 0 {
        log::debug!(
            "optimizer: removed {removed} of {before} instructions ({}%)",
            removed * 100 / before
        );
    }

    removed
}
