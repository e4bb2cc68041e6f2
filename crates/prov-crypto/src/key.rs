use prov_types::VerifyKey;

/// Errors from decoding key material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("invalid hex in signing key: {0}")]
    InvalidHex(String),

    #[error("signing key must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// The private half of a credential. Only its [`VerifyKey`] ever reaches
/// the store.
pub struct SigningKey(ed25519_dalek::SigningKey);

impl SigningKey {
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::thread_rng()))
    }

    pub fn from_bytes(secret: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&secret))
    }

    /// Parse a 64-character hex secret, as written by [`SigningKey::to_hex`].
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        let secret: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidLength(bytes.len()))?;
        Ok(Self::from_bytes(secret))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    /// The credential this key presents.
    pub fn verify_key(&self) -> VerifyKey {
        VerifyKey::from_bytes(self.0.verifying_key().to_bytes())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SigningKey")
            .field(&self.verify_key().short_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_secret_same_credential() {
        let a = SigningKey::from_bytes([3; 32]);
        let b = SigningKey::from_bytes([3; 32]);
        assert_eq!(a.verify_key(), b.verify_key());
        assert_ne!(a.verify_key(), SigningKey::from_bytes([4; 32]).verify_key());
    }

    #[test]
    fn generated_keys_are_distinct() {
        assert_ne!(SigningKey::generate().verify_key(), SigningKey::generate().verify_key());
    }

    #[test]
    fn hex_export_and_import() {
        let key = SigningKey::generate();
        let back = SigningKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(back.verify_key(), key.verify_key());
    }

    #[test]
    fn bad_hex_is_rejected() {
        assert!(matches!(SigningKey::from_hex("zz"), Err(KeyError::InvalidHex(_))));
        assert_eq!(SigningKey::from_hex("abcd").unwrap_err(), KeyError::InvalidLength(2));
    }

    #[test]
    fn debug_shows_only_public_half() {
        let key = SigningKey::from_bytes([7; 32]);
        let shown = format!("{key:?}");
        assert!(shown.contains(&key.verify_key().short_id()));
        assert!(!shown.contains(&key.to_hex()));
    }
}
