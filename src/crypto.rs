// src/crypto.rs
use anyhow::{anyhow, Result};
use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};

const TOKEN_BYTES: usize = 32;

#[derive(Clone)]
pub struct Crypto {
    rng: SystemRandom,
}

impl Default for Crypto {
    fn default() -> Self {
        Self::new()
    }
}

impl Crypto {
    pub fn new() -> Self {
        Crypto {
            rng: SystemRandom::new(),
        }
    }

    /// 32 random bytes, hex encoded.
    pub fn session_token(&self) -> Result<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|e| anyhow!("Failed to generate session token: {}", e))?;
        Ok(hex::encode(bytes))
    }
}

/// Lowercase hex SHA-256, the format stored in `passhash`.
pub fn hash_password(password: &str) -> String {
    hex::encode(digest(&SHA256, password.as_bytes()))
}

/// Compares two hex digests, ignoring case.
pub fn hashes_match(expected: &str, actual: &str) -> bool {
    expected.eq_ignore_ascii_case(actual)
}
