//! The bytewise hash accumulator used by string-typed `TypeDescriptor`s
//! (spec.md §4.1). This is Bob Jenkins' one-at-a-time hash, which the
//! original engine uses for every string column's hash operation.

/// Hash `bytes` with the accumulator:
/// `h += b; h += h<<10; h ^= h>>6;` per byte, then a final avalanche of
/// `h += h<<3; h ^= h>>11; h += h<<15;`.
pub fn one_at_a_time(bytes: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &b in bytes {
        h = h.wrapping_add(b as u32);
        h = h.wrapping_add(h << 10);
        h ^= h >> 6;
    }
    h = h.wrapping_add(h << 3);
    h ^= h >> 11;
    h = h.wrapping_add(h << 15);
    h
}

/// Case-insensitive variant: folds ASCII 'a'-'z' to upper-case before
/// accumulating, so `"Foo"` and `"FOO"` hash identically.
pub fn one_at_a_time_ci(bytes: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &b in bytes {
        let folded = if b.is_ascii_lowercase() { b - 32 } else { b };
        h = h.wrapping_add(folded as u32);
        h = h.wrapping_add(h << 10);
        h ^= h >> 6;
    }
    h = h.wrapping_add(h << 3);
    h ^= h >> 11;
    h = h.wrapping_add(h << 15);
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_hashes_to_zero() {
        assert_eq!(one_at_a_time(b""), 0);
    }

    #[test]
    fn case_insensitive_variant_folds_case() {
        assert_eq!(one_at_a_time_ci(b"Foo"), one_at_a_time_ci(b"FOO"));
        assert_eq!(one_at_a_time_ci(b"foo"), one_at_a_time_ci(b"FOO"));
    }

    #[test]
    fn case_sensitive_variant_distinguishes_case() {
        assert_ne!(one_at_a_time(b"Foo"), one_at_a_time(b"foo"));
    }

    #[test]
    fn different_inputs_differ() {
        assert_ne!(one_at_a_time(b"hello"), one_at_a_time(b"world"));
    }
}
