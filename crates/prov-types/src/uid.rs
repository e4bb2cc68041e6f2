use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Globally unique identifier for a stored document or a derived value.
///
/// A `Uid` is assigned once, at construction time, and is never reused.
/// It wraps a UUID v7 so that identifiers minted later sort later, which
/// keeps debug output and listings roughly chronological. Nothing in the
/// store relies on that ordering for correctness.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(uuid::Uuid);

impl Uid {
    /// Mint a fresh identifier.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Short representation (first 8 characters).
    pub fn short_id(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }

    /// Parse from the hyphenated or simple UUID form.
    pub fn parse_str(s: &str) -> Result<Self, TypeError> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidUid(format!("{s}: {e}")))
    }
}

impl Default for Uid {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Uid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({})", self.short_id())
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_uids_are_unique() {
        let a = Uid::new();
        let b = Uid::new();
        assert_ne!(a, b);
    }

    #[test]
    fn short_id_is_8_chars() {
        assert_eq!(Uid::new().short_id().len(), 8);
    }

    #[test]
    fn display_parses_back() {
        let uid = Uid::new();
        let parsed: Uid = uid.to_string().parse().unwrap();
        assert_eq!(uid, parsed);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = Uid::parse_str("not-a-uid").unwrap_err();
        assert!(matches!(err, TypeError::InvalidUid(_)));
    }

    #[test]
    fn json_form_is_a_plain_string() {
        let uid = Uid::new();
        let json = serde_json::to_value(uid).unwrap();
        assert_eq!(json, serde_json::Value::String(uid.to_string()));
        let back: Uid = serde_json::from_value(json).unwrap();
        assert_eq!(uid, back);
    }

    #[test]
    fn bincode_roundtrip() {
        let uid = Uid::new();
        let bytes = bincode::serialize(&uid).unwrap();
        let back: Uid = bincode::deserialize(&bytes).unwrap();
        assert_eq!(uid, back);
    }

    #[test]
    fn debug_uses_short_form() {
        let uid = Uid::new();
        assert_eq!(format!("{uid:?}"), format!("Uid({})", uid.short_id()));
    }
}
