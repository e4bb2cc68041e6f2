//! Salted password digests for user records.
//!
//! Digests are Argon2id PHC strings. The salt is stored next to the digest
//! as well as inside it, and the two must agree for a password to verify.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl From<argon2::password_hash::Error> for PasswordError {
    fn from(e: argon2::password_hash::Error) -> Self {
        Self::Hash(e.to_string())
    }
}

/// An Argon2id digest and the B64 salt it was derived under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordDigest {
    pub hashed_password: String,
    pub salt: String,
}

/// Hash `password` under a fresh random 16-byte salt.
pub fn hash_password(password: &str) -> Result<PasswordDigest, PasswordError> {
    let mut bytes = [0u8; 16];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    let salt = SaltString::encode_b64(&bytes)?;
    let hashed_password = Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string();
    Ok(PasswordDigest {
        hashed_password,
        salt: salt.as_str().to_string(),
    })
}

/// Check `password` against a stored digest.
///
/// A malformed digest, or one whose embedded salt differs from `salt`,
/// never verifies.
pub fn verify_password(password: &str, hashed_password: &str, salt: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hashed_password) else {
        return false;
    };
    if parsed.salt.map(|s| s.as_str()) != Some(salt) {
        return false;
    }
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
