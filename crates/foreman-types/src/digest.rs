use crate::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte blake3 digest.
///
/// Result hashes, worker binding signs and enclave attestations are all
/// digests; the zero digest means "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Digest of a single byte string.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Digest over the concatenation of several parts.
    pub fn of_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// The commitment binding a worker to a result preimage.
    pub fn bind(preimage: &[u8], worker: &Address) -> Self {
        Self::of_parts(&[preimage, worker.as_bytes()])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_digest() {
        assert!(Digest::ZERO.is_zero());
        assert!(!Digest::of(b"result").is_zero());
    }

    #[test]
    fn test_of_parts_matches_concatenation() {
        let joined = Digest::of(b"helloworld");
        let parts = Digest::of_parts(&[b"hello", b"world"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn test_single_bit_sensitivity() {
        let a = Digest::of(b"result");
        let b = Digest::of(b"resulu"); // one bit apart in the last byte
        assert_ne!(a, b);
    }

    #[test]
    fn test_bind_depends_on_worker() {
        let w1 = Address::from_bytes([1; 32]);
        let w2 = Address::from_bytes([2; 32]);
        assert_ne!(Digest::bind(b"result", &w1), Digest::bind(b"result", &w2));
    }
}
