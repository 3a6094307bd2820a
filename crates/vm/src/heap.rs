//! Heap and cycle collector for the Quill VM.
//!
//! The heap owns every string, list and object allocation. Lists and objects
//! carry a reference count plus a tricolor GC state and are reclaimed either
//! when their count drops to zero or by the synchronous trial-deletion cycle
//! collector (Bacon & Rajan). Strings are reference-counted only.
//!
//! The only write barriers are [`Heap::release`], which may add a container
//! to the possible-roots buffer, and [`Heap::reference`], which clears the
//! target's color back to black. A collection pass runs only when the VM
//! asks for one; no allocation or value mutation happens during a pass.

use std::fmt;

use bitflags::bitflags;
use xxhash_rust::xxh32::xxh32;

use crate::value::{HeapHandle, StringHandle, Value};

/// Number of possible cycle roots that triggers a collection pass.
pub const GC_POSSIBLE_ROOTS_THRESHOLD: usize = 1000;

/// Why a collection pass was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectReason {
    /// The possible-roots buffer crossed [`GC_POSSIBLE_ROOTS_THRESHOLD`].
    PossibleRootsThreshold,
    /// The owning VM is shutting down.
    VmShutdown,
    /// The embedder requested a pass.
    Explicit,
}

impl fmt::Display for CollectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectReason::PossibleRootsThreshold => f.write_str("possibleRootsThreshold"),
            CollectReason::VmShutdown => f.write_str("vmShutdown"),
            CollectReason::Explicit => f.write_str("explicit"),
        }
    }
}

bitflags! {
    /// Per-property flags on object members.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct PropertyFlags: u8 {
        /// Assignment to the property from script code raises an error.
        const READ_ONLY = 1 << 0;
    }
}

/// A property name with its precomputed 32-bit hash.
#[derive(Debug, Clone, Copy)]
pub struct PropName<'a> {
    pub hash: u32,
    pub bytes: &'a [u8],
}

impl<'a> PropName<'a> {
    /// Hashes `bytes` and builds the name.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            hash: hash_name(bytes),
            bytes,
        }
    }

    /// Builds a name from an already-computed hash (interned module strings).
    pub fn from_parts(hash: u32, bytes: &'a [u8]) -> Self {
        Self { hash, bytes }
    }
}

/// Hash function used for property names and interned strings.
pub fn hash_name(bytes: &[u8]) -> u32 {
    xxh32(bytes, 0)
}

/// Outcome of [`Heap::object_set_property`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetPropertyResult {
    Success,
    /// The existing property is read-only; the new value was released.
    ReadOnlyError,
}

/// Runs on an object before its members are released, on both reclamation
/// paths. Intended for native bindings holding external resources.
pub type FinalizeFn = fn(&mut ObjectBody);

/// Custom deep-clone hook consulted by [`Heap::replicate`].
pub type CloneFn = fn(&mut Heap, HeapHandle) -> Value;

/// One object member. Key bytes are owned UTF-8.
#[derive(Debug)]
pub struct Property {
    pub hash: u32,
    pub key: Box<[u8]>,
    pub flags: PropertyFlags,
    pub value: Value,
}

/// Payload of an object allocation: a linear member array plus the optional
/// native-binding callbacks. The linear scan is deliberate; member counts
/// are expected to stay small.
#[derive(Default)]
pub struct ObjectBody {
    pub properties: Vec<Property>,
    pub finalize: Option<FinalizeFn>,
    pub clone: Option<CloneFn>,
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("properties", &self.properties)
            .field("finalize", &self.finalize.map(|callback| callback as usize))
            .field("clone", &self.clone.map(|callback| callback as usize))
            .finish()
    }
}

/// Payload of a list allocation.
#[derive(Debug, Default)]
pub struct ListBody {
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Black,
    Grey,
    White,
    Purple,
}

#[derive(Debug)]
struct GcHeader {
    refs: u32,
    color: Color,
    registered: bool,
}

enum Container {
    List(ListBody),
    Object(ObjectBody),
}

struct Entry {
    header: GcHeader,
    body: Container,
}

struct StringEntry {
    refs: u32,
    bytes: Box<[u8]>,
}

/// Owner of all script-visible allocations.
pub struct Heap {
    entries: Vec<Option<Entry>>,
    free: Vec<u32>,
    strings: Vec<Option<StringEntry>>,
    string_free: Vec<u32>,
    /// Possible roots of cycles (purple in the paper's terminology).
    possible_roots: Vec<HeapHandle>,
    live_containers: usize,
    live_strings: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            strings: Vec::new(),
            string_free: Vec::new(),
            possible_roots: Vec::new(),
            live_containers: 0,
            live_strings: 0,
        }
    }

    /// Number of live list/object allocations.
    pub fn live_containers(&self) -> usize {
        self.live_containers
    }

    /// Number of live string allocations.
    pub fn live_strings(&self) -> usize {
        self.live_strings
    }

    /// Total live allocations, used by leak checks.
    pub fn live_count(&self) -> usize {
        self.live_containers + self.live_strings
    }

    /// Current size of the possible-roots buffer.
    pub fn possible_roots_len(&self) -> usize {
        self.possible_roots.len()
    }

    fn entry(&self, handle: HeapHandle) -> &Entry {
        self.entries[handle.0 as usize]
            .as_ref()
            .expect("stale heap handle")
    }

    fn entry_mut(&mut self, handle: HeapHandle) -> &mut Entry {
        self.entries[handle.0 as usize]
            .as_mut()
            .expect("stale heap handle")
    }

    fn insert_entry(&mut self, entry: Entry) -> HeapHandle {
        self.live_containers += 1;

        if let Some(index) = self.free.pop() {
            self.entries[index as usize] = Some(entry);
            HeapHandle(index)
        } else {
            self.entries.push(Some(entry));
            HeapHandle((self.entries.len() - 1) as u32)
        }
    }

    /* STRINGS */

    /// Allocates a new immutable string with a reference count of one.
    pub fn new_string(&mut self, bytes: &[u8]) -> Value {
        let entry = StringEntry {
            refs: 1,
            bytes: bytes.into(),
        };

        self.live_strings += 1;

        let index = if let Some(index) = self.string_free.pop() {
            self.strings[index as usize] = Some(entry);
            index
        } else {
            self.strings.push(Some(entry));
            (self.strings.len() - 1) as u32
        };

        Value::String(StringHandle(index))
    }

    /// Borrows the byte contents of a string.
    pub fn string_bytes(&self, handle: StringHandle) -> &[u8] {
        &self.strings[handle.0 as usize]
            .as_ref()
            .expect("stale string handle")
            .bytes
    }

    /// Reference count of a string, exposed for tests.
    pub fn string_refs(&self, handle: StringHandle) -> u32 {
        self.strings[handle.0 as usize]
            .as_ref()
            .expect("stale string handle")
            .refs
    }

    /// Concatenation; always allocates a new string.
    pub fn append_string(&mut self, handle: StringHandle, tail: &[u8]) -> Value {
        let mut buffer = self.string_bytes(handle).to_vec();
        buffer.extend_from_slice(tail);
        self.new_string(&buffer)
    }

    /* LISTS */

    /// Allocates a list with capacity for at least `prealloc_size` items and
    /// a reference count of one.
    pub fn new_list(&mut self, prealloc_size: usize) -> Value {
        let capacity = prealloc_size.clamp(1, u32::MAX as usize);
        let body = ListBody {
            items: Vec::with_capacity(capacity),
        };

        let handle = self.insert_entry(Entry {
            header: GcHeader {
                refs: 1,
                color: Color::Black,
                registered: false,
            },
            body: Container::List(body),
        });

        Value::List(handle)
    }

    pub fn list(&self, handle: HeapHandle) -> &ListBody {
        match &self.entry(handle).body {
            Container::List(body) => body,
            Container::Object(_) => panic!("expected a list"),
        }
    }

    fn list_mut(&mut self, handle: HeapHandle) -> &mut ListBody {
        match &mut self.entry_mut(handle).body {
            Container::List(body) => body,
            Container::Object(_) => panic!("expected a list"),
        }
    }

    pub fn list_len(&self, handle: HeapHandle) -> usize {
        self.list(handle).items.len()
    }

    /// Stores `value` (ownership transfers to the list) at `index`, growing
    /// the list as needed. Slots between the old length and `index` are
    /// created as undefined; the caller sequence writes them before they can
    /// be observed.
    pub fn list_set_item(&mut self, handle: HeapHandle, index: usize, value: Value) {
        let old = {
            let items = &mut self.list_mut(handle).items;

            if index < items.len() {
                std::mem::replace(&mut items[index], value)
            } else {
                if index >= items.capacity() {
                    let target = index + index / 2 + 1;
                    items.reserve(target - items.len());
                }

                items.resize(index, Value::Undefined);
                items.push(value);
                Value::Undefined
            }
        };

        self.release(old);
    }

    /// Appends `value`, transferring ownership to the list.
    pub fn list_add_item(&mut self, handle: HeapHandle, value: Value) {
        let index = self.list_len(handle);
        self.list_set_item(handle, index, value);
    }

    /// Releases and removes up to `count` items starting at `index`.
    pub fn list_remove_items(&mut self, handle: HeapHandle, index: usize, count: usize) {
        let removed: Vec<Value> = {
            let items = &mut self.list_mut(handle).items;

            if index >= items.len() {
                return;
            }

            let count = count.min(items.len() - index);
            items.drain(index..index + count).collect()
        };

        for value in removed {
            self.release(value);
        }
    }

    /* OBJECTS */

    /// Allocates an empty object with a reference count of one.
    pub fn new_object(&mut self) -> Value {
        let body = ObjectBody {
            properties: Vec::with_capacity(4),
            finalize: None,
            clone: None,
        };

        let handle = self.insert_entry(Entry {
            header: GcHeader {
                refs: 1,
                color: Color::Black,
                registered: false,
            },
            body: Container::Object(body),
        });

        Value::Object(handle)
    }

    pub fn object(&self, handle: HeapHandle) -> &ObjectBody {
        match &self.entry(handle).body {
            Container::List(_) => panic!("expected an object"),
            Container::Object(body) => body,
        }
    }

    fn object_mut(&mut self, handle: HeapHandle) -> &mut ObjectBody {
        match &mut self.entry_mut(handle).body {
            Container::List(_) => panic!("expected an object"),
            Container::Object(body) => body,
        }
    }

    pub fn object_set_finalize(&mut self, handle: HeapHandle, finalize: Option<FinalizeFn>) {
        self.object_mut(handle).finalize = finalize;
    }

    pub fn object_set_clone(&mut self, handle: HeapHandle, clone: Option<CloneFn>) {
        self.object_mut(handle).clone = clone;
    }

    /// Linear scan by hash, then byte-equal key.
    pub fn object_find_property(&self, handle: HeapHandle, name: &PropName<'_>) -> Option<usize> {
        self.object(handle)
            .properties
            .iter()
            .position(|property| property.hash == name.hash && *property.key == *name.bytes)
    }

    /// Stores a property, transferring ownership of `value` to the object.
    /// Overwriting preserves the existing flags; a read-only hit releases
    /// `value` and reports [`SetPropertyResult::ReadOnlyError`].
    pub fn object_set_property(
        &mut self,
        handle: HeapHandle,
        name: &PropName<'_>,
        value: Value,
        read_only: bool,
    ) -> SetPropertyResult {
        match self.object_find_property(handle, name) {
            Some(index) => {
                let property = &mut self.object_mut(handle).properties[index];

                if property.flags.contains(PropertyFlags::READ_ONLY) {
                    self.release(value);
                    return SetPropertyResult::ReadOnlyError;
                }

                let old = std::mem::replace(&mut property.value, value);
                self.release(old);
            }
            None => {
                self.object_mut(handle).properties.push(Property {
                    hash: name.hash,
                    key: name.bytes.into(),
                    flags: if read_only {
                        PropertyFlags::READ_ONLY
                    } else {
                        PropertyFlags::empty()
                    },
                    value,
                });
            }
        }

        SetPropertyResult::Success
    }

    /// Property write used by the object-overlay operator: like
    /// [`Heap::object_set_property`], except that a hit takes its flags from
    /// the overlaying side instead of preserving the existing ones.
    pub fn object_overlay_property(
        &mut self,
        handle: HeapHandle,
        name: &PropName<'_>,
        value: Value,
        read_only: bool,
    ) -> SetPropertyResult {
        match self.object_find_property(handle, name) {
            Some(index) => {
                let property = &mut self.object_mut(handle).properties[index];

                if property.flags.contains(PropertyFlags::READ_ONLY) {
                    self.release(value);
                    return SetPropertyResult::ReadOnlyError;
                }

                property.flags = if read_only {
                    PropertyFlags::READ_ONLY
                } else {
                    PropertyFlags::empty()
                };

                let old = std::mem::replace(&mut property.value, value);
                self.release(old);
                SetPropertyResult::Success
            }
            None => self.object_set_property(handle, name, value, read_only),
        }
    }

    /// Returns a new reference to the property's value, or undefined on a
    /// miss.
    pub fn object_clone_property(&mut self, handle: HeapHandle, name: &PropName<'_>) -> Value {
        match self.object_find_property(handle, name) {
            Some(index) => {
                let value = self.object(handle).properties[index].value;
                self.reference(value)
            }
            None => Value::Undefined,
        }
    }

    /// Deep-clone semantics for objects: the custom clone callback if one is
    /// set, otherwise a fresh object whose properties take new references to
    /// the source values (contained lists/objects stay shared). For every
    /// other tag this is equivalent to [`Heap::reference`].
    pub fn replicate(&mut self, value: Value) -> Value {
        let Value::Object(handle) = value else {
            return self.reference(value);
        };

        if let Some(clone) = self.object(handle).clone {
            return clone(self, handle);
        }

        let copy = self.new_object();
        let Value::Object(copy_handle) = copy else {
            unreachable!()
        };

        {
            let source = self.object(handle);
            let copy_body = ObjectBody {
                finalize: source.finalize,
                clone: source.clone,
                properties: Vec::new(),
            };
            *self.object_mut(copy_handle) = copy_body;
        }

        for index in 0..self.object(handle).properties.len() {
            let (hash, key, flags, value) = {
                let property = &self.object(handle).properties[index];
                (property.hash, property.key.clone(), property.flags, property.value)
            };

            let reference = self.reference(value);
            self.object_set_property(
                copy_handle,
                &PropName::from_parts(hash, &key),
                reference,
                flags.contains(PropertyFlags::READ_ONLY),
            );
        }

        copy
    }

    /* OWNERSHIP */

    /// Takes a new strong reference. For handle-bearing tags this bumps the
    /// target's count and clears its GC color back to black; primitives are
    /// returned as plain copies. Never fails.
    pub fn reference(&mut self, value: Value) -> Value {
        match value {
            Value::String(handle) => {
                self.strings[handle.0 as usize]
                    .as_mut()
                    .expect("stale string handle")
                    .refs += 1;
                value
            }
            Value::List(handle) | Value::Object(handle) => {
                let header = &mut self.entry_mut(handle).header;
                header.refs += 1;
                header.color = Color::Black;
                value
            }
            _ => value,
        }
    }

    /// Gives up a strong reference. Containers whose count stays above zero
    /// are colored purple and registered as possible cycle roots; containers
    /// reaching zero release their members and are destroyed immediately
    /// unless the collector still knows about them.
    pub fn release(&mut self, value: Value) {
        match value {
            Value::String(handle) => {
                let slot = &mut self.strings[handle.0 as usize];
                let entry = slot.as_mut().expect("stale string handle");
                debug_assert!(entry.refs > 0);
                entry.refs -= 1;

                if entry.refs == 0 {
                    *slot = None;
                    self.string_free.push(handle.0);
                    self.live_strings -= 1;
                }
            }
            Value::List(handle) | Value::Object(handle) => {
                let (refs, color) = {
                    let header = &mut self.entry_mut(handle).header;
                    debug_assert!(header.refs > 0);
                    header.refs -= 1;
                    (header.refs, header.color)
                };

                if refs == 0 {
                    self.release_members(handle);

                    if self.entry(handle).header.registered {
                        // The collector will reap the husk in its next pass.
                        self.entry_mut(handle).header.color = Color::Black;
                    } else {
                        self.destroy(handle);
                    }
                } else if color != Color::Purple {
                    // This decrement may have broken a cycle.
                    let needs_registration = {
                        let header = &mut self.entry_mut(handle).header;
                        header.color = Color::Purple;
                        let needs = !header.registered;
                        header.registered = true;
                        needs
                    };

                    if needs_registration {
                        self.possible_roots.push(handle);
                    }
                }
            }
            _ => {}
        }
    }

    /// Reference count of a container, exposed for tests.
    pub fn container_refs(&self, handle: HeapHandle) -> u32 {
        self.entry(handle).header.refs
    }

    /// Runs the finalize callback (objects), then releases every member,
    /// leaving undefined slots behind.
    fn release_members(&mut self, handle: HeapHandle) {
        let values: Vec<Value> = match &mut self.entry_mut(handle).body {
            Container::List(body) => body
                .items
                .iter_mut()
                .map(|slot| std::mem::replace(slot, Value::Undefined))
                .collect(),
            Container::Object(body) => {
                if let Some(finalize) = body.finalize.take() {
                    finalize(body);
                }

                body.properties
                    .iter_mut()
                    .map(|property| std::mem::replace(&mut property.value, Value::Undefined))
                    .collect()
            }
        };

        for value in values {
            self.release(value);
        }
    }

    /// Frees the allocation. Container children are expected to have been
    /// dealt with already (released, or destroyed by the collector walk);
    /// remaining non-container members still hold references and are
    /// released here.
    fn destroy(&mut self, handle: HeapHandle) {
        let entry = self.entries[handle.0 as usize]
            .take()
            .expect("stale heap handle");
        self.free.push(handle.0);
        self.live_containers -= 1;

        let values: Vec<Value> = match entry.body {
            Container::List(body) => body.items,
            Container::Object(body) => body
                .properties
                .into_iter()
                .map(|property| property.value)
                .collect(),
        };

        for value in values {
            if !value.is_container() {
                self.release(value);
            }
        }
    }

    /* CYCLE COLLECTION */

    fn container_children(&self, handle: HeapHandle) -> Vec<HeapHandle> {
        match &self.entry(handle).body {
            Container::List(body) => body
                .items
                .iter()
                .filter_map(Value::container_handle)
                .collect(),
            Container::Object(body) => body
                .properties
                .iter()
                .filter_map(|property| property.value.container_handle())
                .collect(),
        }
    }

    /// Synchronous trial-deletion pass over the possible-roots buffer.
    /// Returns the number of values collected.
    pub fn collect(&mut self, reason: CollectReason) -> usize {
        log::debug!(
            "gc: begin collect ({reason}), {} possible roots",
            self.possible_roots.len()
        );

        let mut roots = std::mem::take(&mut self.possible_roots);

        // Mark roots: purple roots are marked grey (trial-deleting their
        // internal edges); anything else leaves the set, and a black root
        // with no references left has become reclaimable conventionally.
        let mut index = roots.len();
        while index > 0 {
            index -= 1;
            let handle = roots[index];
            let header = &self.entry(handle).header;

            if header.color == Color::Purple {
                self.mark_grey(handle);
            } else {
                let header = &mut self.entry_mut(handle).header;
                header.registered = false;

                if header.color == Color::Black && header.refs == 0 {
                    self.destroy(handle);
                }

                roots.remove(index);
            }
        }

        // Scan: roots with surviving external references are restored to
        // black (re-incrementing children); the rest turn white.
        for index in 0..roots.len() {
            self.scan(roots[index]);
        }

        // Collect white components.
        let mut collected = 0;
        for index in (0..roots.len()).rev() {
            let handle = roots[index];
            self.entry_mut(handle).header.registered = false;
            collected += self.collect_white(handle);
        }

        log::debug!(
            "gc: end collect, {collected} values collected, {} containers live",
            self.live_containers
        );

        collected
    }

    fn mark_grey(&mut self, handle: HeapHandle) {
        if self.entry(handle).header.color == Color::Grey {
            return;
        }

        self.entry_mut(handle).header.color = Color::Grey;

        for child in self.container_children(handle) {
            self.entry_mut(child).header.refs -= 1;
            self.mark_grey(child);
        }
    }

    fn scan(&mut self, handle: HeapHandle) {
        if self.entry(handle).header.color != Color::Grey {
            return;
        }

        if self.entry(handle).header.refs > 0 {
            self.scan_black(handle);
        } else {
            self.entry_mut(handle).header.color = Color::White;

            for child in self.container_children(handle) {
                self.scan(child);
            }
        }
    }

    fn scan_black(&mut self, handle: HeapHandle) {
        self.entry_mut(handle).header.color = Color::Black;

        for child in self.container_children(handle) {
            self.entry_mut(child).header.refs += 1;

            if self.entry(child).header.color != Color::Black {
                self.scan_black(child);
            }
        }
    }

    fn collect_white(&mut self, handle: HeapHandle) -> usize {
        let header = &self.entry(handle).header;

        if header.color != Color::White || header.registered {
            return 0;
        }

        self.entry_mut(handle).header.color = Color::Black;

        let mut count = 1;

        if let Container::Object(body) = &mut self.entry_mut(handle).body {
            if let Some(finalize) = body.finalize.take() {
                finalize(body);
            }
        }

        for child in self.container_children(handle) {
            count += self.collect_white(child);
        }

        self.destroy(handle);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_refcount_lifecycle() {
        let mut heap = Heap::new();
        let string = heap.new_string(b"hello");

        let Value::String(handle) = string else {
            panic!("expected a string");
        };

        assert_eq!(heap.string_refs(handle), 1);
        assert_eq!(heap.string_bytes(handle), b"hello");

        heap.reference(string);
        assert_eq!(heap.string_refs(handle), 2);

        heap.release(string);
        assert_eq!(heap.string_refs(handle), 1);

        heap.release(string);
        assert_eq!(heap.live_strings(), 0);
    }

    #[test]
    fn test_list_set_item_grows_with_undefined_slots() {
        let mut heap = Heap::new();
        let list = heap.new_list(0);
        let handle = list.container_handle().unwrap();

        heap.list_set_item(handle, 3, Value::Integer(7));
        assert_eq!(heap.list_len(handle), 4);
        assert!(heap.list(handle).items[0].is_undefined());
        assert!(matches!(heap.list(handle).items[3], Value::Integer(7)));

        heap.release(list);
        assert_eq!(heap.live_containers(), 0);
    }

    #[test]
    fn test_release_overwrites_old_item() {
        let mut heap = Heap::new();
        let list = heap.new_list(1);
        let handle = list.container_handle().unwrap();

        let string = heap.new_string(b"old");
        heap.list_set_item(handle, 0, string);
        assert_eq!(heap.live_strings(), 1);

        heap.list_set_item(handle, 0, Value::Integer(1));
        assert_eq!(heap.live_strings(), 0);

        heap.release(list);
    }

    #[test]
    fn test_read_only_property_rejects_overwrite() {
        let mut heap = Heap::new();
        let object = heap.new_object();
        let handle = object.container_handle().unwrap();

        let name = PropName::new(b"version");
        assert_eq!(
            heap.object_set_property(handle, &name, Value::Integer(1), true),
            SetPropertyResult::Success
        );
        assert_eq!(
            heap.object_set_property(handle, &name, Value::Integer(2), false),
            SetPropertyResult::ReadOnlyError
        );

        let index = heap.object_find_property(handle, &name).unwrap();
        assert!(matches!(
            heap.object(handle).properties[index].value,
            Value::Integer(1)
        ));

        heap.release(object);
    }

    #[test]
    fn test_release_to_nonzero_registers_possible_root() {
        let mut heap = Heap::new();
        let object = heap.new_object();

        heap.reference(object);
        assert_eq!(heap.possible_roots_len(), 0);

        heap.release(object);
        assert_eq!(heap.possible_roots_len(), 1);

        // A second release-to-nonzero must not register twice.
        heap.reference(object);
        heap.release(object);
        assert_eq!(heap.possible_roots_len(), 1);

        heap.release(object);
        heap.collect(CollectReason::Explicit);
        assert_eq!(heap.live_containers(), 0);
    }

    #[test]
    fn test_acyclic_garbage_is_reclaimed_without_collector() {
        let mut heap = Heap::new();
        let outer = heap.new_list(2);
        let outer_handle = outer.container_handle().unwrap();
        let inner = heap.new_object();

        heap.list_add_item(outer_handle, inner);
        assert_eq!(heap.live_containers(), 2);

        heap.release(outer);
        assert_eq!(heap.live_containers(), 0);
    }
}
