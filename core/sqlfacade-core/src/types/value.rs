//! The sum type backing every [`TypeDescriptor`](super::descriptor::TypeDescriptor)
//! and every cell in a [`DbResult`](crate::result::DbResult).
//!
//! Per the DESIGN NOTES translation of the original's global
//! `TypeDescriptor` pointers: "replace with enum-tagged value variants (a
//! sum type of the fixed set of built-in types)". `TypeKind` is the
//! type-only tag (what a `field_types[]` column in a `DbResult` stores);
//! `Value` carries the tag's payload.

use crate::bytes::Bytes;
use crate::error::{DbxError, DbxResult};
use std::cmp::Ordering;

/// The fixed set of built-in value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Null,
    Bool,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    /// UTF-8 text, stored internally as [`Bytes`] per spec.md §3.
    String,
    /// Case-insensitive text; compares and hashes ignoring ASCII case.
    StringCi,
    /// Untyped binary payload, stored internally as [`Bytes`].
    Bytes,
}

impl TypeKind {
    /// The XML element name used for schema export (spec.md §4.1).
    pub fn xml_name(self) -> &'static str {
        match self {
            TypeKind::Null => "null",
            TypeKind::Bool => "bool",
            TypeKind::I8 => "i8",
            TypeKind::I16 => "i16",
            TypeKind::I32 => "i32",
            TypeKind::I64 => "i64",
            TypeKind::I128 => "i128",
            TypeKind::U8 => "u8",
            TypeKind::U16 => "u16",
            TypeKind::U32 => "u32",
            TypeKind::U64 => "u64",
            TypeKind::U128 => "u128",
            TypeKind::F32 => "float",
            TypeKind::F64 => "double",
            TypeKind::String => "string",
            TypeKind::StringCi => "ci_string",
            TypeKind::Bytes => "bytes",
        }
    }
}

/// A typed value. Strings and raw bytes share the `Bytes` representation
/// internally, matching spec.md §3's "strings are universally stored
/// internally as Bytes" invariant.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    F32(f32),
    F64(f64),
    String(Bytes),
    StringCi(Bytes),
    Bytes(Bytes),
}

impl Value {
    pub fn kind(&self) -> TypeKind {
        match self {
            Value::Null => TypeKind::Null,
            Value::Bool(_) => TypeKind::Bool,
            Value::I8(_) => TypeKind::I8,
            Value::I16(_) => TypeKind::I16,
            Value::I32(_) => TypeKind::I32,
            Value::I64(_) => TypeKind::I64,
            Value::I128(_) => TypeKind::I128,
            Value::U8(_) => TypeKind::U8,
            Value::U16(_) => TypeKind::U16,
            Value::U32(_) => TypeKind::U32,
            Value::U64(_) => TypeKind::U64,
            Value::U128(_) => TypeKind::U128,
            Value::F32(_) => TypeKind::F32,
            Value::F64(_) => TypeKind::F64,
            Value::String(_) => TypeKind::String,
            Value::StringCi(_) => TypeKind::StringCi,
            Value::Bytes(_) => TypeKind::Bytes,
        }
    }
}

/// Floating-point formatting per spec.md §4.1: format with fixed precision,
/// and if the result collapses to `"0.000000"`/`"-0.000000"` re-format in
/// scientific notation so a tiny nonzero magnitude isn't reported as zero.
fn format_float(v: f64) -> String {
    let fixed = format!("{v:.6}");
    if fixed == "0.000000" || fixed == "-0.000000" {
        if v == 0.0 {
            fixed
        } else {
            format!("{v:e}")
        }
    } else {
        fixed
    }
}

pub fn to_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::I8(n) => n.to_string(),
        Value::I16(n) => n.to_string(),
        Value::I32(n) => n.to_string(),
        Value::I64(n) => n.to_string(),
        Value::I128(n) => n.to_string(),
        Value::U8(n) => n.to_string(),
        Value::U16(n) => n.to_string(),
        Value::U32(n) => n.to_string(),
        Value::U64(n) => n.to_string(),
        Value::U128(n) => n.to_string(),
        Value::F32(n) => format_float(*n as f64),
        Value::F64(n) => format_float(*n),
        Value::String(b) | Value::StringCi(b) => b.as_str_lossy().into_owned(),
        Value::Bytes(b) => {
            let mut s = String::with_capacity(b.length() * 2);
            for byte in b.payload() {
                s.push_str(&format!("{byte:02X}"));
            }
            s
        }
    }
}

/// The "value as Bytes" conversion. Strings/bytes return their own
/// backing `Bytes` (no copy of representation); everything else is
/// `to_string` wrapped in a `Bytes`.
pub fn to_bytes(v: &Value) -> Bytes {
    match v {
        Value::String(b) | Value::StringCi(b) | Value::Bytes(b) => b.clone(),
        other => Bytes::from(to_string(other).as_str()),
    }
}

/// Serialize per the blob codec contract (spec.md §4.1): little-endian on
/// wire, and for `Bytes`/`String` the on-wire Bytes header format
/// (spec.md §4.2).
pub fn to_blob(v: &Value) -> Bytes {
    match v {
        Value::Null => Bytes::new(),
        Value::Bool(b) => Bytes::from([*b as u8].as_slice()),
        Value::I8(n) => Bytes::from(n.to_le_bytes().as_slice()),
        Value::I16(n) => Bytes::from(n.to_le_bytes().as_slice()),
        Value::I32(n) => Bytes::from(n.to_le_bytes().as_slice()),
        Value::I64(n) => Bytes::from(n.to_le_bytes().as_slice()),
        Value::I128(n) => Bytes::from(n.to_le_bytes().as_slice()),
        Value::U8(n) => Bytes::from(n.to_le_bytes().as_slice()),
        Value::U16(n) => Bytes::from(n.to_le_bytes().as_slice()),
        Value::U32(n) => Bytes::from(n.to_le_bytes().as_slice()),
        Value::U64(n) => Bytes::from(n.to_le_bytes().as_slice()),
        Value::U128(n) => Bytes::from(n.to_le_bytes().as_slice()),
        Value::F32(n) => Bytes::from(n.to_le_bytes().as_slice()),
        Value::F64(n) => Bytes::from(n.to_le_bytes().as_slice()),
        Value::String(b) | Value::StringCi(b) | Value::Bytes(b) => Bytes::from(b.to_wire().as_slice()),
    }
}

/// Decode per the blob codec contract. `in_place` is honored for
/// `Bytes`/`String`/`StringCi`: when true, the payload is moved directly
/// into the returned `Bytes` without an intermediate defensive copy of the
/// already-owned input slice beyond what decoding itself requires.
/// `disable_thread_safety` has no effect here — decoding a blob never
/// touches shared state — it is accepted for signature parity with the
/// spec's contract.
pub fn from_blob(
    kind: TypeKind,
    input: &[u8],
    _in_place: bool,
    _disable_thread_safety: bool,
) -> DbxResult<(Value, u64)> {
    macro_rules! fixed_width {
        ($ty:ty, $variant:ident) => {{
            let width = std::mem::size_of::<$ty>();
            if input.len() < width {
                return Err(DbxError::BlobDecode(format!(
                    "expected {width} bytes for {kind:?}, got {}",
                    input.len()
                )));
            }
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            buf.copy_from_slice(&input[..width]);
            (Value::$variant(<$ty>::from_le_bytes(buf)), width as u64)
        }};
    }

    let (value, consumed) = match kind {
        TypeKind::Null => (Value::Null, 0u64),
        TypeKind::Bool => {
            if input.is_empty() {
                return Err(DbxError::BlobDecode("expected 1 byte for bool".to_string()));
            }
            (Value::Bool(input[0] != 0), 1u64)
        }
        TypeKind::I8 => fixed_width!(i8, I8),
        TypeKind::I16 => fixed_width!(i16, I16),
        TypeKind::I32 => fixed_width!(i32, I32),
        TypeKind::I64 => fixed_width!(i64, I64),
        TypeKind::I128 => fixed_width!(i128, I128),
        TypeKind::U8 => fixed_width!(u8, U8),
        TypeKind::U16 => fixed_width!(u16, U16),
        TypeKind::U32 => fixed_width!(u32, U32),
        TypeKind::U64 => fixed_width!(u64, U64),
        TypeKind::U128 => fixed_width!(u128, U128),
        TypeKind::F32 => fixed_width!(f32, F32),
        TypeKind::F64 => fixed_width!(f64, F64),
        TypeKind::String => {
            let (b, consumed) = Bytes::from_wire(input)?;
            (Value::String(b), consumed)
        }
        TypeKind::StringCi => {
            let (b, consumed) = Bytes::from_wire(input)?;
            (Value::StringCi(b), consumed)
        }
        TypeKind::Bytes => {
            let (b, consumed) = Bytes::from_wire(input)?;
            (Value::Bytes(b), consumed)
        }
    };
    Ok((value, consumed))
}

/// `{-1,0,1}`-style comparison used by `TypeDescriptor::compare`, expressed
/// as `Ordering`.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::I8(x), Value::I8(y)) => x.cmp(y),
        (Value::I16(x), Value::I16(y)) => x.cmp(y),
        (Value::I32(x), Value::I32(y)) => x.cmp(y),
        (Value::I64(x), Value::I64(y)) => x.cmp(y),
        (Value::I128(x), Value::I128(y)) => x.cmp(y),
        (Value::U8(x), Value::U8(y)) => x.cmp(y),
        (Value::U16(x), Value::U16(y)) => x.cmp(y),
        (Value::U32(x), Value::U32(y)) => x.cmp(y),
        (Value::U64(x), Value::U64(y)) => x.cmp(y),
        (Value::U128(x), Value::U128(y)) => x.cmp(y),
        (Value::F32(x), Value::F32(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::F64(x), Value::F64(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.compare(y),
        (Value::StringCi(x), Value::StringCi(y)) => {
            x.as_str_lossy().to_ascii_uppercase().cmp(&y.as_str_lossy().to_ascii_uppercase())
        }
        (Value::Bytes(x), Value::Bytes(y)) => x.compare(y),
        // Mixed kinds: fall back to comparing the string representation.
        _ => to_string(a).cmp(&to_string(b)),
    }
}

/// Construct a default/"create" value for a kind, optionally seeded from a
/// string initializer (e.g. the default column value used by
/// copy-and-rename schema evolution, spec.md §4.7).
pub fn create(kind: TypeKind, init: Option<&str>) -> Value {
    if let Some(s) = init {
        if let Ok(v) = parse(kind, s) {
            return v;
        }
    }
    match kind {
        TypeKind::Null => Value::Null,
        TypeKind::Bool => Value::Bool(false),
        TypeKind::I8 => Value::I8(0),
        TypeKind::I16 => Value::I16(0),
        TypeKind::I32 => Value::I32(0),
        TypeKind::I64 => Value::I64(0),
        TypeKind::I128 => Value::I128(0),
        TypeKind::U8 => Value::U8(0),
        TypeKind::U16 => Value::U16(0),
        TypeKind::U32 => Value::U32(0),
        TypeKind::U64 => Value::U64(0),
        TypeKind::U128 => Value::U128(0),
        TypeKind::F32 => Value::F32(0.0),
        TypeKind::F64 => Value::F64(0.0),
        TypeKind::String => Value::String(Bytes::new()),
        TypeKind::StringCi => Value::StringCi(Bytes::new()),
        TypeKind::Bytes => Value::Bytes(Bytes::new()),
    }
}

/// Parse a string representation into a value of the given kind.
pub fn parse(kind: TypeKind, s: &str) -> DbxResult<Value> {
    let type_mismatch = || DbxError::TypeMismatch {
        expected: kind.xml_name().to_string(),
        actual: s.to_string(),
    };
    Ok(match kind {
        TypeKind::Null => Value::Null,
        TypeKind::Bool => Value::Bool(s.parse().map_err(|_| type_mismatch())?),
        TypeKind::I8 => Value::I8(s.parse().map_err(|_| type_mismatch())?),
        TypeKind::I16 => Value::I16(s.parse().map_err(|_| type_mismatch())?),
        TypeKind::I32 => Value::I32(s.parse().map_err(|_| type_mismatch())?),
        TypeKind::I64 => Value::I64(s.parse().map_err(|_| type_mismatch())?),
        TypeKind::I128 => Value::I128(s.parse().map_err(|_| type_mismatch())?),
        TypeKind::U8 => Value::U8(s.parse().map_err(|_| type_mismatch())?),
        TypeKind::U16 => Value::U16(s.parse().map_err(|_| type_mismatch())?),
        TypeKind::U32 => Value::U32(s.parse().map_err(|_| type_mismatch())?),
        TypeKind::U64 => Value::U64(s.parse().map_err(|_| type_mismatch())?),
        TypeKind::U128 => Value::U128(s.parse().map_err(|_| type_mismatch())?),
        TypeKind::F32 => Value::F32(s.parse().map_err(|_| type_mismatch())?),
        TypeKind::F64 => Value::F64(s.parse().map_err(|_| type_mismatch())?),
        TypeKind::String => Value::String(Bytes::from(s)),
        TypeKind::StringCi => Value::StringCi(Bytes::from(s)),
        TypeKind::Bytes => Value::Bytes(Bytes::from(s.as_bytes())),
    })
}

/// Byte size contributed by a value (used for `DbResult` size accounting).
pub fn size(v: &Value) -> usize {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::I8(_) | Value::U8(_) => 1,
        Value::I16(_) | Value::U16(_) => 2,
        Value::I32(_) | Value::U32(_) | Value::F32(_) => 4,
        Value::I64(_) | Value::U64(_) | Value::F64(_) => 8,
        Value::I128(_) | Value::U128(_) => 16,
        Value::String(b) | Value::StringCi(b) | Value::Bytes(b) => b.length(),
    }
}

/// Hash a value. Strings use the dedicated byte accumulator (case folding
/// applied for `StringCi`); everything else hashes its little-endian blob
/// representation through the same accumulator.
pub fn hash(v: &Value) -> u32 {
    match v {
        Value::StringCi(b) => super::hash::one_at_a_time_ci(b.payload()),
        Value::String(b) | Value::Bytes(b) => super::hash::one_at_a_time(b.payload()),
        other => super::hash::one_at_a_time(to_blob(other).payload()),
    }
}

/// Reset a value in place to its kind's zero/empty representation.
pub fn clear(v: &mut Value) {
    *v = create(v.kind(), None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_formatting_falls_back_for_tiny_values() {
        assert_eq!(to_string(&Value::F64(1.0)), "1.000000");
        let tiny = to_string(&Value::F64(1e-10));
        assert!(tiny.contains('e'), "expected scientific notation, got {tiny}");
        assert_eq!(to_string(&Value::F64(0.0)), "0.000000");
    }

    #[test]
    fn blob_round_trip_numeric() {
        for v in [
            Value::I64(-1234567890),
            Value::U32(42),
            Value::Bool(true),
            Value::F64(3.25),
        ] {
            let blob = to_blob(&v);
            let (decoded, consumed) = from_blob(v.kind(), blob.payload(), false, false).unwrap();
            assert_eq!(consumed, blob.length() as u64);
            assert_eq!(compare(&v, &decoded), Ordering::Equal);
        }
    }

    #[test]
    fn blob_round_trip_string() {
        let v = Value::String(Bytes::from("hello, world"));
        let blob = to_blob(&v);
        let (decoded, consumed) = from_blob(TypeKind::String, blob.payload(), false, false).unwrap();
        assert_eq!(consumed, blob.length() as u64);
        assert_eq!(compare(&v, &decoded), Ordering::Equal);
    }

    #[test]
    fn string_ci_compares_ignoring_case() {
        let a = Value::StringCi(Bytes::from("Hello"));
        let b = Value::StringCi(Bytes::from("HELLO"));
        assert_eq!(compare(&a, &b), Ordering::Equal);
    }

    #[test]
    fn clear_resets_to_kind_default() {
        let mut v = Value::I32(77);
        clear(&mut v);
        assert!(matches!(v, Value::I32(0)));
    }

    proptest::proptest! {
        #[test]
        fn i64_round_trip(n in proptest::prelude::any::<i64>()) {
            let v = Value::I64(n);
            let blob = to_blob(&v);
            let (decoded, consumed) = from_blob(TypeKind::I64, blob.payload(), false, false).unwrap();
            proptest::prop_assert_eq!(consumed, blob.length() as u64);
            proptest::prop_assert_eq!(compare(&v, &decoded), Ordering::Equal);
        }

        #[test]
        fn string_round_trip(s in "\\PC*") {
            let v = Value::String(Bytes::from(s.as_str()));
            let blob = to_blob(&v);
            let (decoded, consumed) = from_blob(TypeKind::String, blob.payload(), false, false).unwrap();
            proptest::prop_assert_eq!(consumed, blob.length() as u64);
            proptest::prop_assert_eq!(compare(&v, &decoded), Ordering::Equal);
        }
    }
}
