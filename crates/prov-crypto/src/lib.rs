//! Credential source for Provenant.
//!
//! Issues ed25519 signing keys whose public halves become the opaque
//! [`VerifyKey`](prov_types::VerifyKey) credentials carried on every store
//! call, and derives salted Argon2id password digests for user records.

pub mod key;
pub mod password;

pub use key::{KeyError, SigningKey};
pub use password::{PasswordDigest, PasswordError, hash_password, verify_password};
