//! Content hashing for cache addressing and incremental rebuilds.

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// A 128-bit content hash computed using XXH3.
///
/// Two inputs with the same `ContentHash` are assumed to be identical. Used
/// throughout the driver to address cache artifacts and to detect when source
/// files or compiler inputs have changed. The `Display` form is 32 lowercase
/// hex characters, which is the digest component of every cache path.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes a content hash from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Reconstructs a hash from its raw little-endian bytes.
    pub fn from_raw(raw: [u8; 16]) -> Self {
        Self(raw)
    }

    /// Parses the 32-character lowercase hex form produced by `Display`.
    ///
    /// Returns `None` for any string that is not exactly 32 hex digits.
    pub fn parse_hex(s: &str) -> Option<Self> {
        if s.len() != 32 || !s.is_ascii() {
            return None;
        }
        let mut raw = [0u8; 16];
        for (i, chunk) in s.as_bytes().chunks_exact(2).enumerate() {
            let hi = (chunk[0] as char).to_digit(16)?;
            let lo = (chunk[1] as char).to_digit(16)?;
            raw[i] = ((hi << 4) | lo) as u8;
        }
        Some(Self(raw))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// A streaming XXH3-128 hasher accumulating heterogeneous compiler inputs.
///
/// This is the hash state behind the cache manifest: callers feed it bytes,
/// strings, integers, and booleans, and snapshot it (it is `Clone`) so an
/// optimistic cache probe can be rolled back later.
#[derive(Clone)]
pub struct ContentHasher {
    state: Xxh3,
}

impl ContentHasher {
    /// Creates a fresh hasher with an empty state.
    pub fn new() -> Self {
        Self { state: Xxh3::new() }
    }

    /// Folds raw bytes into the hash state.
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    /// Folds a string into the hash state, delimited so that adjacent
    /// strings cannot collide by concatenation.
    pub fn update_str(&mut self, s: &str) {
        self.state.update(s.as_bytes());
        self.state.update(&[0x1f]);
    }

    /// Folds an unsigned integer into the hash state (little-endian).
    pub fn update_u64(&mut self, v: u64) {
        self.state.update(&v.to_le_bytes());
    }

    /// Folds a boolean into the hash state.
    pub fn update_bool(&mut self, v: bool) {
        self.state.update(&[v as u8]);
    }

    /// Produces the hash of everything fed so far without consuming the state.
    pub fn peek(&self) -> ContentHash {
        ContentHash(self.state.digest128().to_le_bytes())
    }

    /// Consumes the hasher and produces the final hash.
    pub fn finish(self) -> ContentHash {
        self.peek()
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHasher({})", self.peek())
    }
}
