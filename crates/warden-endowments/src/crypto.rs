//! Cryptographic primitives exposed to snaps.

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Cryptographic primitives scoped to one snap.
///
/// Random bytes come straight from the operating system's CSPRNG; digests
/// use SHA-256.
#[derive(Debug, Default)]
pub struct CryptoSuite;

impl CryptoSuite {
    /// Create the suite.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Fill and return `len` cryptographically secure random bytes.
    #[must_use]
    pub fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }

    /// SHA-256 digest of `data`.
    #[must_use]
    pub fn sha256(&self, data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    /// SHA-256 digest of `data` as a lowercase hex string.
    #[must_use]
    pub fn sha256_hex(&self, data: &[u8]) -> String {
        hex::encode(self.sha256(data))
    }
}
