//! Program hashing for change detection.
//!
//! The rendered program of a unit is hashed so that the program file is
//! only rewritten when its content actually changes.

use sha2::{Digest, Sha256};

/// Hasher for rendered unit programs.
#[derive(Debug, Default)]
pub struct ProgramHasher;

impl ProgramHasher {
    /// Creates a new program hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the hash of a rendered program document.
    #[must_use]
    pub fn hash_program(&self, program: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(program.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Returns true if two hashes are equal, ignoring hex case.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        hash1.eq_ignore_ascii_case(hash2)
    }
}
