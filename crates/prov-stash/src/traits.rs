use prov_store::{validate_as, Described, PartitionKey, PartitionSettings};
use prov_types::Uid;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// An object kind that lives in its own partition.
pub trait StashObject: Serialize + DeserializeOwned + Described + Send + Sync {
    /// Canonical name; also the partition name.
    const OBJECT_TYPE: &'static str;

    /// Secondary indexes declared on the partition.
    const KEYS: &'static [PartitionKey];

    /// The partial-update type accepted for this kind.
    type Update: UpdateObject;

    fn uid(&self) -> Uid;

    fn settings() -> PartitionSettings {
        PartitionSettings::new(Self::OBJECT_TYPE, Self::OBJECT_TYPE, Self::KEYS)
            .with_validator(validate_as::<Self>)
    }
}

/// A partial update addressed to one object.
///
/// Fields that are `None` are left unchanged.
pub trait UpdateObject: Serialize + Send + Sync {
    /// Canonical name of the object kind this update targets.
    const TARGET: &'static str;

    fn uid(&self) -> Uid;
}

/// Update type for kinds that never change after they are stored.
#[derive(Debug, Serialize)]
pub enum NoUpdate {}

impl UpdateObject for NoUpdate {
    const TARGET: &'static str = "";

    fn uid(&self) -> Uid {
        match *self {}
    }
}
