//! Runtime helper functions.
//!
//! These implement the dynamic operator and accessor semantics shared by the
//! dispatch loop and native code. Helpers never fail out-of-band: on error
//! they raise a script exception on the context and report failure through
//! their return value (`None`, `false`, or an undefined [`Value`]).

use crate::bytecode::SwitchValue;
use crate::context::ActivationContext;
use crate::heap::{Heap, PropName, SetPropertyResult};
use crate::machine::Machine;
use crate::value::{StringHandle, Value};

/// Truthiness coercion used by conditional jumps and `assert`.
pub fn as_boolean(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    value: Value,
) -> Option<bool> {
    match value {
        Value::Undefined => {
            ctx.raise_with_message(machine, "Expected a value");
            None
        }
        Value::Nil => Some(false),
        Value::Boolean(value) => Some(value),
        Value::Integer(value) => Some(value != 0),
        Value::Real(value) => Some(value != 0.0),
        Value::String(handle) => Some(!machine.heap.string_bytes(handle).is_empty()),
        Value::Internal(_)
        | Value::NativeFunction(_)
        | Value::ScriptFunction { .. }
        | Value::List(_)
        | Value::Object(_) => Some(true),
    }
}

pub fn as_integer(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    value: Value,
) -> Option<i64> {
    match value {
        Value::Integer(value) => Some(value),
        _ => {
            ctx.raise_with_message(machine, "Expected an integer");
            None
        }
    }
}

pub fn as_real(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    value: Value,
) -> Option<f64> {
    match value {
        Value::Integer(value) => Some(value as f64),
        Value::Real(value) => Some(value),
        _ => {
            ctx.raise_with_message(machine, "Expected a real");
            None
        }
    }
}

pub fn as_string(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    value: Value,
) -> Option<StringHandle> {
    match value {
        Value::String(handle) => Some(handle),
        _ => {
            ctx.raise_with_message(machine, "Expected a string");
            None
        }
    }
}

/// `range[index]` read. Lists yield a new reference to the item; strings
/// yield the byte value as an integer.
pub fn get_indexed(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    range: Value,
    index: Value,
) -> Option<Value> {
    match range {
        Value::List(handle) => match index {
            Value::Integer(index) if index >= 0 && (index as usize) < machine.heap.list_len(handle) => {
                let item = machine.heap.list(handle).items[index as usize];
                Some(machine.heap.reference(item))
            }
            Value::Integer(_) => {
                ctx.raise_with_message(machine, "List index out of range");
                None
            }
            _ => {
                ctx.raise_with_message(machine, "Invalid index for operator []");
                None
            }
        },
        Value::String(handle) => match index {
            Value::Integer(index)
                if index >= 0 && (index as usize) < machine.heap.string_bytes(handle).len() =>
            {
                Some(Value::Integer(
                    machine.heap.string_bytes(handle)[index as usize] as i64,
                ))
            }
            Value::Integer(_) => {
                ctx.raise_with_message(machine, "String index out of range");
                None
            }
            _ => {
                ctx.raise_with_message(machine, "Invalid index for operator []");
                None
            }
        },
        _ => {
            ctx.raise_with_message(machine, "Invalid value for operator []");
            None
        }
    }
}

/// `range[index] = value` write. Ownership of `value` transfers; it is
/// released if the write fails.
pub fn set_indexed(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    range: Value,
    index: Value,
    value: Value,
) -> bool {
    match range {
        Value::List(handle) => match index {
            Value::Integer(index) if index >= 0 && (index as usize) < machine.heap.list_len(handle) => {
                machine.heap.list_set_item(handle, index as usize, value);
                true
            }
            Value::Integer(_) => {
                machine.heap.release(value);
                ctx.raise_with_message(machine, "List index out of range");
                false
            }
            _ => {
                machine.heap.release(value);
                ctx.raise_with_message(machine, "Invalid index for operator []");
                false
            }
        },
        _ => {
            machine.heap.release(value);
            ctx.raise_with_message(machine, "Invalid value for operator []");
            false
        }
    }
}

/// Property read with the non-object fallbacks: integers expose `string`,
/// lists and strings expose `length`.
pub fn get_property(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    object: Value,
    name: &PropName<'_>,
    raise_if_missing: bool,
) -> Option<Value> {
    match object {
        Value::Object(handle) => {
            let value = machine.heap.object_clone_property(handle, name);

            if !value.is_undefined() {
                return Some(value);
            }
        }
        Value::Integer(value) => {
            if name.bytes == b"string" {
                return Some(machine.heap.new_string(value.to_string().as_bytes()));
            }
        }
        Value::List(handle) => {
            if name.bytes == b"length" {
                return Some(Value::Integer(machine.heap.list_len(handle) as i64));
            }
        }
        Value::String(handle) => {
            if name.bytes == b"length" {
                return Some(Value::Integer(machine.heap.string_bytes(handle).len() as i64));
            }
        }
        _ => {}
    }

    if raise_if_missing {
        let message = format!(
            "Property '{}' does not exist",
            String::from_utf8_lossy(name.bytes)
        );
        ctx.raise_with_message(machine, &message);
    }

    None
}

/// Property write from script code. Ownership of `value` transfers; it is
/// released if the write fails.
pub fn set_member(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    object: Value,
    name: &PropName<'_>,
    value: Value,
) -> bool {
    match object {
        Value::Object(handle) => {
            match machine.heap.object_set_property(handle, name, value, false) {
                SetPropertyResult::Success => true,
                SetPropertyResult::ReadOnlyError => {
                    ctx.raise_with_message(machine, "Attempting to overwrite a read-only property");
                    false
                }
            }
        }
        _ => {
            machine.heap.release(value);
            ctx.raise_with_message(machine, "Attempting to set a member variable in a non-object");
            false
        }
    }
}

/// `+` operator. Operands are non-owning views; the result is a new owning
/// value, or undefined after a raise.
pub fn operator_add(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    left: Value,
    right: Value,
) -> Value {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => Value::Integer(l.wrapping_add(r)),
        (Value::Integer(l), Value::Real(r)) => Value::Real(l as f64 + r),
        (Value::Real(l), Value::Integer(r)) => Value::Real(l + r as f64),
        (Value::Real(l), Value::Real(r)) => Value::Real(l + r),
        (Value::String(l), Value::String(r)) => {
            let tail = machine.heap.string_bytes(r).to_vec();
            machine.heap.append_string(l, &tail)
        }
        (Value::String(l), _) => {
            let tail = display_value(machine.heap, right, 0);
            machine.heap.append_string(l, tail.as_bytes())
        }
        (Value::List(l), Value::List(r)) => {
            let left_len = machine.heap.list_len(l);
            let right_len = machine.heap.list_len(r);
            let sum = machine.heap.new_list(left_len + right_len);
            let sum_handle = sum.container_handle().expect("fresh list");

            // Items are shared, not cloned; aliasing is observable.
            for index in 0..left_len {
                let item = machine.heap.list(l).items[index];
                let reference = machine.heap.reference(item);
                machine.heap.list_add_item(sum_handle, reference);
            }

            for index in 0..right_len {
                let item = machine.heap.list(r).items[index];
                let reference = machine.heap.reference(item);
                machine.heap.list_add_item(sum_handle, reference);
            }

            sum
        }
        (Value::Object(_), Value::Object(r)) => {
            let copy = machine.heap.replicate(left);
            let copy_handle = copy.container_handle().expect("replicated object");

            for index in 0..machine.heap.object(r).properties.len() {
                let (hash, key, read_only, value) = {
                    let property = &machine.heap.object(r).properties[index];
                    (
                        property.hash,
                        property.key.clone(),
                        property
                            .flags
                            .contains(crate::heap::PropertyFlags::READ_ONLY),
                        property.value,
                    )
                };

                let reference = machine.heap.reference(value);
                let result = machine.heap.object_overlay_property(
                    copy_handle,
                    &PropName::from_parts(hash, &key),
                    reference,
                    read_only,
                );

                if result == SetPropertyResult::ReadOnlyError {
                    machine.heap.release(copy);
                    ctx.raise_with_message(machine, "Attempting to overwrite a read-only property");
                    return Value::Undefined;
                }
            }

            copy
        }
        _ => {
            ctx.raise_with_message(machine, "Invalid operands to operator '+'");
            Value::Undefined
        }
    }
}

pub fn operator_sub(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    left: Value,
    right: Value,
) -> Value {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => Value::Integer(l.wrapping_sub(r)),
        (Value::Integer(l), Value::Real(r)) => Value::Real(l as f64 - r),
        (Value::Real(l), Value::Integer(r)) => Value::Real(l - r as f64),
        (Value::Real(l), Value::Real(r)) => Value::Real(l - r),
        _ => {
            ctx.raise_with_message(machine, "Invalid operands to operator '-'");
            Value::Undefined
        }
    }
}

pub fn operator_mul(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    left: Value,
    right: Value,
) -> Value {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => Value::Integer(l.wrapping_mul(r)),
        (Value::Integer(l), Value::Real(r)) => Value::Real(l as f64 * r),
        (Value::Real(l), Value::Integer(r)) => Value::Real(l * r as f64),
        (Value::Real(l), Value::Real(r)) => Value::Real(l * r),
        _ => {
            ctx.raise_with_message(machine, "Invalid operands to operator '*'");
            Value::Undefined
        }
    }
}

pub fn operator_div(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    left: Value,
    right: Value,
) -> Value {
    let divide_by_zero = match right {
        Value::Integer(r) => r == 0,
        Value::Real(r) => r == 0.0,
        _ => false,
    };

    match (left, right) {
        (Value::Integer(_), Value::Integer(_))
        | (Value::Integer(_), Value::Real(_))
        | (Value::Real(_), Value::Integer(_))
        | (Value::Real(_), Value::Real(_))
            if divide_by_zero =>
        {
            ctx.raise_with_message(machine, "Division by 0");
            Value::Undefined
        }
        (Value::Integer(l), Value::Integer(r)) => Value::Integer(l.wrapping_div(r)),
        (Value::Integer(l), Value::Real(r)) => Value::Real(l as f64 / r),
        (Value::Real(l), Value::Integer(r)) => Value::Real(l / r as f64),
        (Value::Real(l), Value::Real(r)) => Value::Real(l / r),
        _ => {
            ctx.raise_with_message(machine, "Invalid operands to operator '/'");
            Value::Undefined
        }
    }
}

pub fn operator_mod(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    left: Value,
    right: Value,
) -> Value {
    match (left, right) {
        (Value::Integer(_), Value::Integer(0)) => {
            ctx.raise_with_message(machine, "Division by 0");
            Value::Undefined
        }
        (Value::Integer(l), Value::Integer(r)) => Value::Integer(l.wrapping_rem(r)),
        _ => {
            ctx.raise_with_message(machine, "Invalid operands to operator '%'");
            Value::Undefined
        }
    }
}

pub fn operator_neg(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    operand: Value,
) -> Value {
    match operand {
        Value::Integer(value) => Value::Integer(value.wrapping_neg()),
        Value::Real(value) => Value::Real(-value),
        _ => {
            ctx.raise_with_message(machine, "Invalid operand to unary operator '-'");
            Value::Undefined
        }
    }
}

pub fn operator_log_and(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    left: Value,
    right: Value,
) -> Value {
    match (left, right) {
        (Value::Boolean(l), Value::Boolean(r)) => Value::Boolean(l && r),
        _ => {
            ctx.raise_with_message(machine, "Invalid operands to operator '&&'");
            Value::Undefined
        }
    }
}

pub fn operator_log_or(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    left: Value,
    right: Value,
) -> Value {
    match (left, right) {
        (Value::Boolean(l), Value::Boolean(r)) => Value::Boolean(l || r),
        _ => {
            ctx.raise_with_message(machine, "Invalid operands to operator '||'");
            Value::Undefined
        }
    }
}

pub fn operator_log_not(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    operand: Value,
) -> Value {
    match operand {
        Value::Boolean(value) => Value::Boolean(!value),
        _ => {
            ctx.raise_with_message(machine, "Invalid operand to operator '!'");
            Value::Undefined
        }
    }
}

/// `==`. Same tag required; there is no cross-type numeric equality.
/// Structural for primitives, byte-equal for strings, identity for lists
/// and objects.
pub fn operator_equals(heap: &Heap, left: Value, right: Value) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) => true,
        (Value::Boolean(l), Value::Boolean(r)) => l == r,
        (Value::Integer(l), Value::Integer(r)) => l == r,
        (Value::Real(l), Value::Real(r)) => l == r,
        (Value::String(l), Value::String(r)) => heap.string_bytes(l) == heap.string_bytes(r),
        (Value::List(l), Value::List(r)) => l == r,
        (Value::Object(l), Value::Object(r)) => l == r,
        (Value::Internal(l), Value::Internal(r)) => l == r,
        (Value::NativeFunction(l), Value::NativeFunction(r)) => l as usize == r as usize,
        (
            Value::ScriptFunction {
                module: lm,
                function: lf,
            },
            Value::ScriptFunction {
                module: rm,
                function: rf,
            },
        ) => lm == rm && lf == rf,
        _ => {
            debug_assert!(!left.is_undefined() && !right.is_undefined());
            false
        }
    }
}

pub fn operator_greater_than(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    left: Value,
    right: Value,
) -> Option<bool> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => Some(l > r),
        (Value::Integer(l), Value::Real(r)) => Some(l as f64 > r),
        (Value::Real(l), Value::Integer(r)) => Some(l > r as f64),
        (Value::Real(l), Value::Real(r)) => Some(l > r),
        _ => {
            ctx.raise_with_message(machine, "Invalid operands to operator '>'");
            None
        }
    }
}

pub fn operator_less_than(
    machine: &mut Machine<'_>,
    ctx: &mut ActivationContext,
    left: Value,
    right: Value,
) -> Option<bool> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => Some(l < r),
        (Value::Integer(l), Value::Real(r)) => Some((l as f64) < r),
        (Value::Real(l), Value::Integer(r)) => Some(l < r as f64),
        (Value::Real(l), Value::Real(r)) => Some(l < r),
        _ => {
            ctx.raise_with_message(machine, "Invalid operands to operator '<'");
            None
        }
    }
}

/// Equality between a runtime value and a switch-table case constant,
/// following the same same-tag rules as `==`.
pub fn switch_case_matches(heap: &Heap, value: Value, case: &SwitchValue) -> bool {
    match (value, case) {
        (Value::Nil, SwitchValue::Nil) => true,
        (Value::Boolean(l), SwitchValue::Boolean(r)) => l == *r,
        (Value::Integer(l), SwitchValue::Integer(r)) => l == *r,
        (Value::Real(l), SwitchValue::Real(r)) => l == *r,
        (Value::String(l), SwitchValue::String(r)) => heap.string_bytes(l) == &r[..],
        _ => false,
    }
}

/// Human-readable rendering used by `print`, string concatenation with
/// non-string operands, and driver diagnostics.
pub fn display_value(heap: &Heap, value: Value, depth: usize) -> String {
    if depth > 6 {
        return "...".into();
    }

    match value {
        Value::Undefined => "undefined".into(),
        Value::Nil => "nil".into(),
        Value::Boolean(value) => if value { "true" } else { "false" }.into(),
        Value::Integer(value) => value.to_string(),
        Value::Real(value) => value.to_string(),
        Value::Internal(pointer) => format!("[internal {pointer:p}]"),
        Value::NativeFunction(_) => "[nativeFunction]".into(),
        Value::ScriptFunction { module, function } => {
            format!("[scriptFunction @ {module}/{function}]")
        }
        Value::String(handle) => String::from_utf8_lossy(heap.string_bytes(handle)).into_owned(),
        Value::List(handle) => {
            let mut out = String::from("( ");

            for (index, item) in heap.list(handle).items.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                out.push_str(&display_value(heap, *item, depth + 1));
            }

            out.push_str(" )");
            out
        }
        Value::Object(handle) => {
            let mut out = String::from("{ ");

            for (index, property) in heap.object(handle).properties.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                out.push_str(&String::from_utf8_lossy(&property.key));
                out.push_str(": ");
                out.push_str(&display_value(heap, property.value, depth + 1));
            }

            out.push_str(" }");
            out
        }
    }
}
