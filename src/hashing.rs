use sha2::{Digest, Sha256};

use crate::error::TransferError;

/// SHA-256 computed over the body as it streams in.
pub struct Checksum {
    expected: String,
    hasher: Sha256,
}

impl Checksum {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            hasher: Sha256::new(),
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    pub fn verify(self) -> Result<String, TransferError> {
        let actual = hex::encode(self.hasher.finalize());
        if !self.expected.eq_ignore_ascii_case(&actual) {
            return Err(TransferError::ChecksumMismatch {
                expected: self.expected,
                actual,
            });
        }
        Ok(actual)
    }
}
