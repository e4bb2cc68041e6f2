use prov_types::Uid;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// A persisted object: its UID, declared object type, insertion sequence
/// and canonical JSON body.
///
/// The store never interprets the body beyond extracting indexed fields and
/// running the partition validator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub uid: Uid,
    /// Canonical name of the object kind (must match the partition).
    pub object_type: String,
    /// Partition insertion sequence; assigned by the store on create and
    /// preserved by updates.
    pub seq: u64,
    pub body: Value,
}

impl Document {
    /// Build a document from any serializable object whose JSON form is an
    /// object.
    pub fn from_object<T: Serialize>(
        uid: Uid,
        object_type: impl Into<String>,
        object: &T,
    ) -> StoreResult<Self> {
        let body = serde_json::to_value(object)?;
        if !body.is_object() {
            return Err(StoreError::Serialization(
                "document body must serialize to a JSON object".into(),
            ));
        }
        Ok(Self {
            uid,
            object_type: object_type.into(),
            seq: 0,
            body,
        })
    }

    /// Decode the body back into a typed object.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_value(self.body.clone()).map_err(StoreError::from)
    }
}

/// A partial update: the target UID, the declared object type, and only the
/// fields that change.
///
/// Fields are merged shallowly over the stored body. `null` values are
/// dropped when building from a typed update, so an absent `Option` field
/// means "unchanged".
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentUpdate {
    pub uid: Uid,
    pub object_type: String,
    pub fields: Map<String, Value>,
}

impl DocumentUpdate {
    /// Build from a serializable update struct.
    pub fn from_update<U: Serialize>(
        uid: Uid,
        object_type: impl Into<String>,
        update: &U,
    ) -> StoreResult<Self> {
        let fields = match serde_json::to_value(update)? {
            Value::Object(map) => map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .collect(),
            _ => {
                return Err(StoreError::Serialization(
                    "update must serialize to a JSON object".into(),
                ));
            }
        };
        Ok(Self {
            uid,
            object_type: object_type.into(),
            fields,
        })
    }

    /// Apply the changed fields on top of `body`, returning the merged body.
    pub fn merge_into(&self, body: &Value) -> StoreResult<Value> {
        let mut merged = body
            .as_object()
            .cloned()
            .ok_or_else(|| StoreError::Serialization("stored body is not an object".into()))?;
        for (name, value) in &self.fields {
            merged.insert(name.clone(), value.clone());
        }
        Ok(Value::Object(merged))
    }
}
