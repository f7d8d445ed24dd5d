//! The TypeDescriptor registry (spec.md §4.1).
//!
//! Each built-in [`TypeKind`] is registered twice — an **owning** descriptor
//! (`copy` deep-duplicates, `destroy` frees) and a **no-copy** descriptor
//! (`copy` is an identity share, `destroy` is a no-op) — per spec.md §3's
//! owning/no-copy duality. Rather than doubling every field on
//! `TypeDescriptor`, the duality is expressed as an [`Ownership`] policy
//! that [`StoredValue::copy`] consults: a `StoredValue` is always an
//! `Arc<Value>`, so "no-copy" is simply `Arc::clone` (cheap, shared) and
//! "owning" is `Arc::new((*v).clone())` (a fresh allocation). Dropping the
//! last reference to either variant frees the payload automatically —
//! that is just `Arc`'s existing behavior, so there is no separate
//! `destroy` fn pointer to maintain by hand.
//!
//! Descriptors are interned as `&'static TypeDescriptor`; the registry
//! compares them by pointer identity, matching "types compared by pointer
//! identity since descriptors are interned" (spec.md §4.3).

use super::value::{self, TypeKind, Value};
use crate::bytes::Bytes;
use crate::error::DbxResult;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

/// Owning vs. no-copy, per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// `copy` deep-duplicates; `destroy` frees immediately.
    Owning,
    /// `copy` is an identity share (cheap); `destroy` only frees once the
    /// last reference is gone.
    NoCopy,
}

/// A shared, reference-counted value. Every `DbResult` cell, and every
/// value handed to a `TypeDescriptor`'s `copy`/`destroy`, is one of these.
pub type StoredValue = Arc<Value>;

/// Process-lifetime immutable record naming a value type and its nine
/// operation capabilities (spec.md §4.1).
#[derive(Debug)]
pub struct TypeDescriptor {
    pub kind: TypeKind,
    pub ownership: Ownership,
    /// Whether the value is held by reference rather than embedded. True
    /// for every `NoCopy` descriptor; false for `Owning` descriptors.
    pub data_is_pointer: bool,
}

impl TypeDescriptor {
    pub fn to_string(&self, v: &Value) -> String {
        value::to_string(v)
    }

    pub fn to_bytes(&self, v: &Value) -> Bytes {
        value::to_bytes(v)
    }

    pub fn to_blob(&self, v: &Value) -> Bytes {
        value::to_blob(v)
    }

    pub fn from_blob(
        &self,
        input: &[u8],
        in_place: bool,
        disable_thread_safety: bool,
    ) -> DbxResult<(Value, u64)> {
        value::from_blob(self.kind, input, in_place, disable_thread_safety)
    }

    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        value::compare(a, b)
    }

    pub fn create(&self, init: Option<&str>) -> Value {
        value::create(self.kind, init)
    }

    /// Copy a stored (reference-counted) value per this descriptor's
    /// ownership policy.
    pub fn copy(&self, v: &StoredValue) -> StoredValue {
        match self.ownership {
            Ownership::Owning => Arc::new((**v).clone()),
            Ownership::NoCopy => Arc::clone(v),
        }
    }

    /// Drop a stored value. Present for API parity with the spec's
    /// explicit `destroy` operation — `Arc`'s own `Drop` impl already does
    /// the right thing for both ownership policies.
    pub fn destroy(&self, v: StoredValue) {
        drop(v);
    }

    pub fn size(&self, v: &Value) -> usize {
        value::size(v)
    }

    pub fn hash(&self, v: &Value) -> u32 {
        value::hash(v)
    }

    pub fn clear(&self, v: &mut Value) {
        value::clear(v)
    }
}

macro_rules! builtin_pair {
    ($owning_name:ident, $nocopy_name:ident, $kind:expr) => {
        pub static $owning_name: TypeDescriptor = TypeDescriptor {
            kind: $kind,
            ownership: Ownership::Owning,
            data_is_pointer: false,
        };
        pub static $nocopy_name: TypeDescriptor = TypeDescriptor {
            kind: $kind,
            ownership: Ownership::NoCopy,
            data_is_pointer: true,
        };
    };
}

// Built-in descriptors, one owning/no-copy pair per TypeKind.
builtin_pair!(NULL, NULL_NOCOPY, TypeKind::Null);
builtin_pair!(BOOL, BOOL_NOCOPY, TypeKind::Bool);
builtin_pair!(I8, I8_NOCOPY, TypeKind::I8);
builtin_pair!(I16, I16_NOCOPY, TypeKind::I16);
builtin_pair!(I32, I32_NOCOPY, TypeKind::I32);
builtin_pair!(I64, I64_NOCOPY, TypeKind::I64);
builtin_pair!(I128, I128_NOCOPY, TypeKind::I128);
builtin_pair!(U8, U8_NOCOPY, TypeKind::U8);
builtin_pair!(U16, U16_NOCOPY, TypeKind::U16);
builtin_pair!(U32, U32_NOCOPY, TypeKind::U32);
builtin_pair!(U64, U64_NOCOPY, TypeKind::U64);
builtin_pair!(U128, U128_NOCOPY, TypeKind::U128);
builtin_pair!(F32, F32_NOCOPY, TypeKind::F32);
builtin_pair!(F64, F64_NOCOPY, TypeKind::F64);
builtin_pair!(STRING, STRING_NOCOPY, TypeKind::String);
builtin_pair!(STRING_CI, STRING_CI_NOCOPY, TypeKind::StringCi);
builtin_pair!(BYTES, BYTES_NOCOPY, TypeKind::Bytes);

impl TypeDescriptor {
    /// The XML element name for schema export (spec.md §4.1).
    pub fn xml_name(&self) -> &'static str {
        self.kind.xml_name()
    }
}

/// The fixed built-in array, scanned linearly by `index_of` before falling
/// through to the hash-table lookup (spec.md §4.1).
static BUILTINS: &[&TypeDescriptor] = &[
    &NULL,
    &NULL_NOCOPY,
    &BOOL,
    &BOOL_NOCOPY,
    &I8,
    &I8_NOCOPY,
    &I16,
    &I16_NOCOPY,
    &I32,
    &I32_NOCOPY,
    &I64,
    &I64_NOCOPY,
    &I128,
    &I128_NOCOPY,
    &U8,
    &U8_NOCOPY,
    &U16,
    &U16_NOCOPY,
    &U32,
    &U32_NOCOPY,
    &U64,
    &U64_NOCOPY,
    &U128,
    &U128_NOCOPY,
    &F32,
    &F32_NOCOPY,
    &F64,
    &F64_NOCOPY,
    &STRING,
    &STRING_NOCOPY,
    &STRING_CI,
    &STRING_CI_NOCOPY,
    &BYTES,
    &BYTES_NOCOPY,
];

fn ptr_key(d: &'static TypeDescriptor) -> usize {
    d as *const TypeDescriptor as usize
}

struct Registry {
    /// Descriptors registered beyond the built-in array, in registration
    /// order; index into this vec is offset by `BUILTINS.len()`.
    extra: RwLock<Vec<&'static TypeDescriptor>>,
    /// Reverse lookup (descriptor pointer -> global index), covering both
    /// built-ins and extras, for O(1) average `index_of` on miss from the
    /// linear scan.
    by_ptr: DashMap<usize, usize>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let by_ptr = DashMap::new();
        for (i, d) in BUILTINS.iter().enumerate() {
            by_ptr.insert(ptr_key(d), i);
        }
        Registry {
            extra: RwLock::new(Vec::new()),
            by_ptr,
        }
    })
}

/// Register a descriptor, returning its stable index. Idempotent: if
/// already registered (by pointer identity), returns the existing index.
/// Thread-safe against concurrent registration and lookup.
pub fn register(descriptor: &'static TypeDescriptor) -> usize {
    let reg = registry();
    if let Some(idx) = reg.by_ptr.get(&ptr_key(descriptor)) {
        return *idx;
    }
    let mut extra = reg.extra.write();
    // Re-check under the write lock: another thread may have registered
    // the same descriptor while we were waiting.
    if let Some(idx) = reg.by_ptr.get(&ptr_key(descriptor)) {
        return *idx;
    }
    let idx = BUILTINS.len() + extra.len();
    extra.push(descriptor);
    reg.by_ptr.insert(ptr_key(descriptor), idx);
    idx
}

/// Look up a descriptor's index. Tries the fixed built-in array first
/// (cache-friendly linear scan, the common case), then falls through to
/// the pointer-identity hash table for extension descriptors.
pub fn index_of(descriptor: &'static TypeDescriptor) -> Option<usize> {
    for (i, d) in BUILTINS.iter().enumerate() {
        if std::ptr::eq(*d, descriptor) {
            return Some(i);
        }
    }
    registry().by_ptr.get(&ptr_key(descriptor)).map(|i| *i)
}

/// Reverse lookup: index -> descriptor.
pub fn descriptor_of(index: usize) -> Option<&'static TypeDescriptor> {
    if index < BUILTINS.len() {
        return Some(BUILTINS[index]);
    }
    let reg = registry();
    let extra = reg.extra.read();
    extra.get(index - BUILTINS.len()).copied()
}

/// Resolve the owning descriptor for a `TypeKind` — used when translating
/// engine-reported column types (e.g. SQLite's `column_type()`) into a
/// `TypeDescriptor` for a `DbResult`'s `field_types`.
pub fn owning_descriptor_for(kind: TypeKind) -> &'static TypeDescriptor {
    match kind {
        TypeKind::Null => &NULL,
        TypeKind::Bool => &BOOL,
        TypeKind::I8 => &I8,
        TypeKind::I16 => &I16,
        TypeKind::I32 => &I32,
        TypeKind::I64 => &I64,
        TypeKind::I128 => &I128,
        TypeKind::U8 => &U8,
        TypeKind::U16 => &U16,
        TypeKind::U32 => &U32,
        TypeKind::U64 => &U64,
        TypeKind::U128 => &U128,
        TypeKind::F32 => &F32,
        TypeKind::F64 => &F64,
        TypeKind::String => &STRING,
        TypeKind::StringCi => &STRING_CI,
        TypeKind::Bytes => &BYTES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_index_is_stable_and_reversible() {
        let idx = index_of(&I64).expect("I64 must be a builtin");
        assert!(std::ptr::eq(descriptor_of(idx).unwrap(), &I64));
    }

    #[test]
    fn register_is_idempotent() {
        static EXTRA: TypeDescriptor = TypeDescriptor {
            kind: TypeKind::I32,
            ownership: Ownership::Owning,
            data_is_pointer: false,
        };
        let first = register(&EXTRA);
        let second = register(&EXTRA);
        let third = register(&EXTRA);
        assert_eq!(first, second);
        assert_eq!(second, third);
        assert!(std::ptr::eq(descriptor_of(first).unwrap(), &EXTRA));
    }

    #[test]
    fn owning_copy_deep_duplicates() {
        let v: StoredValue = Arc::new(Value::I64(7));
        let copy = I64.copy(&v);
        assert!(!Arc::ptr_eq(&v, &copy));
        assert_eq!(value::compare(&v, &copy), Ordering::Equal);
    }

    #[test]
    fn nocopy_copy_shares_identity() {
        let v: StoredValue = Arc::new(Value::I64(7));
        let copy = I64_NOCOPY.copy(&v);
        assert!(Arc::ptr_eq(&v, &copy));
    }

    #[test]
    fn concurrent_registration_and_lookup_are_consistent() {
        use std::thread;
        static CONCURRENT: TypeDescriptor = TypeDescriptor {
            kind: TypeKind::Bool,
            ownership: Ownership::Owning,
            data_is_pointer: false,
        };
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| register(&CONCURRENT)))
            .collect();
        let indices: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(indices.windows(2).all(|w| w[0] == w[1]));
    }
}
