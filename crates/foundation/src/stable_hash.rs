//! Stable hashing for config fingerprints.
//!
//! Two nodes may only be combined (aggregated, added, read back from a
//! checkpoint) when they were built from the same parameter config. Configs are
//! compared through a 64-bit FNV-1a fingerprint that must be identical across
//! runs, processes and platforms, so `std::hash` is not an option.
//!
//! NOTE: FNV-1a is **not** cryptographically secure.
//! It is used strictly for stable identity checks.

const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const PRIME: u64 = 0x0000_0100_0000_01b3;

const fn mix(mut hash: u64, bytes: &[u8]) -> u64 {
    let mut i = 0;
    while i < bytes.len() {
        hash = (hash ^ bytes[i] as u64).wrapping_mul(PRIME);
        i += 1;
    }
    hash
}

/// FNV-1a 64-bit hash of `bytes`.
pub const fn fnv1a64(bytes: &[u8]) -> u64 {
    mix(OFFSET_BASIS, bytes)
}

/// FNV-1a 64-bit hash of the UTF-8 bytes of `s`.
pub const fn fnv1a64_str(s: &str) -> u64 {
    fnv1a64(s.as_bytes())
}

/// Incremental FNV-1a hasher for structured values.
///
/// Strings are length-prefixed so `["ab", "c"]` and `["a", "bc"]` hash
/// differently. Floats are hashed by their bit pattern.
///
/// ```
/// use enkf_foundation::StableHasher;
///
/// let mut h = StableHasher::new();
/// h.write_str("F1").write_f64(0.5);
/// let a = h.finish();
///
/// let mut h = StableHasher::new();
/// h.write_str("F1").write_f64(0.5);
/// assert_eq!(a, h.finish());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableHasher {
    state: u64,
}

impl Default for StableHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl StableHasher {
    pub const fn new() -> Self {
        Self {
            state: OFFSET_BASIS,
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.state = mix(self.state, bytes);
        self
    }

    /// Little-endian.
    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    /// By bit pattern: `0.0` and `-0.0` differ.
    pub fn write_f64(&mut self, value: f64) -> &mut Self {
        self.write_u64(value.to_bits())
    }

    /// Length-prefixed.
    pub fn write_str(&mut self, s: &str) -> &mut Self {
        self.write_u64(s.len() as u64);
        self.write_bytes(s.as_bytes())
    }

    pub const fn finish(&self) -> u64 {
        self.state
    }
}
