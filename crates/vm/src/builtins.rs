//! Builtin methods on primitive receivers.
//!
//! `invoke` consults these fixed tables before falling back to property
//! dispatch: lists first, then strings. A match is called as a native
//! function with the receiver pushed as the additional last argument.

use hashbrown::HashMap;
use once_cell::sync::Lazy;

use crate::machine::NativeCallContext;
use crate::value::{NativeFn, Value};

static LIST_METHODS: Lazy<HashMap<&'static str, NativeFn>> = Lazy::new(|| {
    let mut methods: HashMap<&'static str, NativeFn> = HashMap::new();
    methods.insert("add", list_add as NativeFn);
    methods.insert("remove", list_remove as NativeFn);
    methods
});

static STRING_METHODS: Lazy<HashMap<&'static str, NativeFn>> = Lazy::new(|| {
    let mut methods: HashMap<&'static str, NativeFn> = HashMap::new();
    methods.insert("endsWith", string_ends_with as NativeFn);
    methods.insert("startsWith", string_starts_with as NativeFn);
    methods
});

/// Looks up a builtin list method by name.
pub fn list_method(name: &[u8]) -> Option<NativeFn> {
    std::str::from_utf8(name)
        .ok()
        .and_then(|name| LIST_METHODS.get(name).copied())
}

/// Looks up a builtin string method by name.
pub fn string_method(name: &[u8]) -> Option<NativeFn> {
    std::str::from_utf8(name)
        .ok()
        .and_then(|name| STRING_METHODS.get(name).copied())
}

/// `<List>.add(item, ...)` — appends new references to each argument.
fn list_add(ctx: &mut NativeCallContext<'_, '_>) {
    if ctx.num_args() < 1 {
        ctx.raise("Not enough arguments to <List>.add()");
        return;
    }

    let Value::List(handle) = ctx.arg(0) else {
        ctx.raise("Expected a list");
        return;
    };

    for index in 1..ctx.num_args() {
        let item = ctx.arg(index);
        let reference = ctx.heap().reference(item);
        ctx.heap().list_add_item(handle, reference);
    }
}

/// `<List>.remove(offset [, count])` — releases and removes items.
fn list_remove(ctx: &mut NativeCallContext<'_, '_>) {
    if ctx.num_args() < 2 || ctx.num_args() > 3 {
        ctx.raise("Unexpected number of arguments to <List>.remove()");
        return;
    }

    let Value::List(handle) = ctx.arg(0) else {
        ctx.raise("Expected a list");
        return;
    };

    let offset_value = ctx.arg(1);
    let Some(offset) = ctx.as_integer(offset_value) else {
        return;
    };

    let count = if ctx.num_args() >= 3 {
        let count_value = ctx.arg(2);
        let Some(count) = ctx.as_integer(count_value) else {
            return;
        };
        count
    } else {
        1
    };

    if offset < 0 || count < 0 {
        ctx.raise("List index out of range");
        return;
    }

    ctx.heap()
        .list_remove_items(handle, offset as usize, count as usize);
}

/// `<String>.startsWith(head)`.
fn string_starts_with(ctx: &mut NativeCallContext<'_, '_>) {
    if ctx.num_args() != 2 {
        ctx.raise("Unexpected number of arguments to <String>.startsWith()");
        return;
    }

    let Value::String(receiver) = ctx.arg(0) else {
        ctx.raise("Expected a string");
        return;
    };

    let head_value = ctx.arg(1);
    let Some(head) = ctx.as_string(head_value) else {
        return;
    };

    let result = {
        let heap = ctx.heap();
        let bytes = heap.string_bytes(receiver);
        let head = heap.string_bytes(head);
        bytes.starts_with(head)
    };

    ctx.set_return_value(Value::Boolean(result));
}

/// `<String>.endsWith(tail)`.
fn string_ends_with(ctx: &mut NativeCallContext<'_, '_>) {
    if ctx.num_args() != 2 {
        ctx.raise("Unexpected number of arguments to <String>.endsWith()");
        return;
    }

    let Value::String(receiver) = ctx.arg(0) else {
        ctx.raise("Expected a string");
        return;
    };

    let tail_value = ctx.arg(1);
    let Some(tail) = ctx.as_string(tail_value) else {
        return;
    };

    let result = {
        let heap = ctx.heap();
        let bytes = heap.string_bytes(receiver);
        let tail = heap.string_bytes(tail);
        bytes.ends_with(tail)
    };

    ctx.set_return_value(Value::Boolean(result));
}
