//! Length-prefixed, NUL-terminated byte buffer (spec.md §4.2).
//!
//! Conceptually a tuple `(size, length, payload[size])` where `length <=
//! size` and `payload[length] == 0`. The original C type keeps the header
//! immediately before the payload in memory so that a bare pointer to the
//! payload is a valid C string; that memory layout has no counterpart in
//! safe Rust, so here `Bytes` is a thin wrapper around a `Vec<u8>` that
//! maintains the same two externally-visible invariants: `length() <=
//! size()`, and the byte immediately after the logical payload is always
//! zero.
//!
//! An empty `Bytes` (no allocation at all) is a valid, "null" value — it
//! needs no special-casing because `Vec::new()` already has length 0 and
//! capacity 0.

use std::cmp::Ordering;

/// A growable, NUL-terminated byte buffer.
///
/// `size()` reports the allocated capacity; `length()` reports the used
/// prefix. Growth is amortized doubling, matching the original's realloc
/// strategy.
#[derive(Debug, Clone, Default, Eq)]
pub struct Bytes {
    /// Invariant: `buf` is either empty, or `buf.len() == length + 1` with
    /// `buf[length] == 0`.
    buf: Vec<u8>,
}

impl PartialEq for Bytes {
    fn eq(&self, other: &Self) -> bool {
        self.payload() == other.payload()
    }
}

impl std::hash::Hash for Bytes {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.payload().hash(state);
    }
}

impl Bytes {
    /// A valid, empty Bytes — the equivalent of a NULL pointer in the
    /// original.
    pub fn new() -> Self {
        Bytes { buf: Vec::new() }
    }

    /// Allocate a Bytes with at least `capacity` bytes of headroom and
    /// length 0.
    pub fn allocate(capacity: usize) -> Self {
        let mut b = Bytes {
            buf: Vec::with_capacity(capacity + 1),
        };
        b.fix_nul();
        b
    }

    /// Called when `buf` holds exactly the payload with no trailing NUL
    /// slot yet; appends the single NUL byte that restores the invariant.
    fn fix_nul(&mut self) {
        self.buf.push(0);
    }

    /// Used prefix length (excludes the trailing NUL).
    pub fn length(&self) -> usize {
        self.buf.len().saturating_sub(1)
    }

    /// Allocated capacity.
    pub fn size(&self) -> usize {
        self.buf.capacity()
    }

    /// The logical payload, excluding the trailing NUL.
    pub fn payload(&self) -> &[u8] {
        let len = self.length();
        &self.buf[..len]
    }

    /// Ensure at least `new_size` bytes of capacity without changing
    /// `length()`.
    pub fn set_size(&mut self, new_size: usize) {
        let len = self.length();
        if self.buf.capacity() < new_size + 1 {
            self.buf.reserve(new_size + 1 - self.buf.len().max(0));
        }
        let _ = len;
    }

    /// Truncate or zero-extend the logical length to `new_length`.
    /// Newly exposed bytes (when growing) are zero-filled.
    pub fn set_length(&mut self, new_length: usize) {
        if new_length < self.length() {
            self.buf.truncate(new_length);
        } else {
            self.buf.resize(new_length, 0);
        }
        self.fix_nul();
    }

    fn grow_for(&mut self, extra: usize) {
        let needed = self.buf.len() + extra + 1;
        if self.buf.capacity() < needed {
            let doubled = (self.buf.capacity().max(1)) * 2;
            let target = doubled.max(needed);
            self.buf.reserve(target - self.buf.len());
        }
    }

    /// Append raw bytes to the payload.
    pub fn add_data(&mut self, data: &[u8]) {
        let len = self.length();
        self.grow_for(data.len());
        self.buf.truncate(len);
        self.buf.extend_from_slice(data);
        self.fix_nul();
    }

    /// Append the payload of another Bytes.
    pub fn add_bytes(&mut self, other: &Bytes) {
        self.add_data(other.payload());
    }

    /// Append a UTF-8 string.
    pub fn add_str(&mut self, s: &str) {
        self.add_data(s.as_bytes());
    }

    /// Replace the entire contents with a UTF-8 string.
    pub fn replace_str(&mut self, s: &str) {
        self.buf.clear();
        self.add_str(s);
    }

    /// Lexicographic comparison of the payloads.
    pub fn compare(&self, other: &Bytes) -> Ordering {
        self.payload().cmp(other.payload())
    }

    /// Consume and drop. Present for API parity with the spec's explicit
    /// `destroy` operation; in Rust this is just `drop(bytes)`.
    pub fn destroy(self) {
        drop(self)
    }

    /// Interpret the payload as UTF-8, lossily.
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.payload())
    }

    /// Serialize per the on-wire Bytes header format (spec.md §4.2):
    /// `[length: u64 LE][size: u64 LE][payload][NUL]`. The serialized
    /// `size` field always equals `length` — the generic blob contract
    /// (spec.md §4.1) never serializes trailing unused capacity.
    pub fn to_wire(&self) -> Vec<u8> {
        let len = self.length() as u64;
        let mut out = Vec::with_capacity(16 + self.length() + 1);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(self.payload());
        out.push(0);
        out
    }

    /// Parse the on-wire Bytes header format. Returns the decoded `Bytes`
    /// and the number of input bytes consumed.
    pub fn from_wire(input: &[u8]) -> crate::error::DbxResult<(Bytes, u64)> {
        use crate::error::DbxError;
        const HEADER_LEN: usize = 16;
        if input.len() < HEADER_LEN {
            return Err(DbxError::BlobDecode(
                "Bytes header truncated (need 16 bytes)".to_string(),
            ));
        }
        let length = u64::from_le_bytes(input[0..8].try_into().unwrap());
        let size = u64::from_le_bytes(input[8..16].try_into().unwrap());
        let remaining = input.len() - HEADER_LEN;
        if size as usize > remaining {
            return Err(DbxError::BlobDecode(format!(
                "Bytes payload size {size} exceeds remaining input {remaining}"
            )));
        }
        let payload = &input[HEADER_LEN..HEADER_LEN + size as usize];
        let mut b = Bytes::new();
        b.add_data(payload);
        let consumed = HEADER_LEN as u64 + size + 1;
        Ok((b, consumed.min(input.len() as u64)))
    }
}

impl From<&str> for Bytes {
    fn from(s: &str) -> Self {
        let mut b = Bytes::new();
        b.add_str(s);
        b
    }
}

impl From<String> for Bytes {
    fn from(s: String) -> Self {
        Bytes::from(s.as_str())
    }
}

impl From<&[u8]> for Bytes {
    fn from(data: &[u8]) -> Self {
        let mut b = Bytes::new();
        b.add_data(data);
        b
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(data: Vec<u8>) -> Self {
        Bytes::from(data.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_valid() {
        let b = Bytes::new();
        assert_eq!(b.length(), 0);
        assert_eq!(b.size(), 0);
    }

    #[test]
    fn add_data_tracks_length_and_nul() {
        let mut b = Bytes::new();
        b.add_data(b"hello");
        assert_eq!(b.length(), 5);
        assert!(b.size() >= b.length());
        assert_eq!(b.payload(), b"hello");
    }

    #[test]
    fn replace_str_resets_contents() {
        let mut b = Bytes::from("first");
        b.replace_str("second-longer");
        assert_eq!(b.as_str_lossy(), "second-longer");
    }

    #[test]
    fn compare_is_lexicographic() {
        let a = Bytes::from("abc");
        let b = Bytes::from("abd");
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(a.compare(&a.clone()), Ordering::Equal);
    }

    #[test]
    fn wire_round_trip() {
        let b = Bytes::from("round trip me");
        let wire = b.to_wire();
        let (decoded, consumed) = Bytes::from_wire(&wire).unwrap();
        assert_eq!(decoded, b);
        assert_eq!(consumed as usize, wire.len());
    }

    #[test]
    fn wire_rejects_truncated_header() {
        let err = Bytes::from_wire(&[1, 2, 3]);
        assert!(err.is_err());
    }

    #[test]
    fn set_length_shrink_and_grow() {
        let mut b = Bytes::from("hello world");
        b.set_length(5);
        assert_eq!(b.payload(), b"hello");
        b.set_length(8);
        assert_eq!(b.length(), 8);
        assert_eq!(&b.payload()[5..], &[0, 0, 0]);
    }

    proptest::proptest! {
        #[test]
        fn length_never_exceeds_size(data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let mut b = Bytes::new();
            b.add_data(&data);
            proptest::prop_assert!(b.length() <= b.size());
            proptest::prop_assert_eq!(b.payload(), data.as_slice());
        }
    }
}
