use std::sync::Arc;

use prov_store::{
    Described, Descriptor, DocumentStore, FieldSpec, KeyType, PartitionKey, QueryKeys,
    StoreResult,
};
use prov_types::{Timestamp, Uid, VerifyKey};
use serde::{Deserialize, Serialize};

use crate::base::BaseUidStoreStash;
use crate::traits::{StashObject, UpdateObject};

/// Unique dataset name.
pub const NAME_PARTITION_KEY: PartitionKey = PartitionKey::new("name", KeyType::Str).unique();
/// Action objects a dataset refers to.
pub const ACTION_IDS_PARTITION_KEY: PartitionKey =
    PartitionKey::new("action_ids", KeyType::UidSet);

/// A named collection of action objects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Uid,
    pub name: String,
    pub description: String,
    pub action_ids: Vec<Uid>,
    pub created_at: Timestamp,
}

impl Dataset {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uid::new(),
            name: name.into(),
            description: description.into(),
            action_ids: Vec::new(),
            created_at: Timestamp::now(),
        }
    }

    pub fn with_action(mut self, id: Uid) -> Self {
        if !self.action_ids.contains(&id) {
            self.action_ids.push(id);
        }
        self
    }
}

/// Partial update for a [`Dataset`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetUpdate {
    #[serde(skip)]
    pub id: Uid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub action_ids: Option<Vec<Uid>>,
}

impl DatasetUpdate {
    pub fn new(id: Uid) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn action_ids(mut self, ids: Vec<Uid>) -> Self {
        self.action_ids = Some(ids);
        self
    }
}

impl StashObject for Dataset {
    const OBJECT_TYPE: &'static str = "Dataset";
    const KEYS: &'static [PartitionKey] = &[NAME_PARTITION_KEY, ACTION_IDS_PARTITION_KEY];
    type Update = DatasetUpdate;

    fn uid(&self) -> Uid {
        self.id
    }
}

impl UpdateObject for DatasetUpdate {
    const TARGET: &'static str = "Dataset";

    fn uid(&self) -> Uid {
        self.id
    }
}

impl Described for Dataset {
    const DESCRIPTOR: Descriptor = Descriptor {
        type_name: "Dataset",
        fields: &[
            FieldSpec::stringify("id"),
            FieldSpec::include("name"),
            FieldSpec::include("description"),
            FieldSpec::include("action_ids"),
            FieldSpec::stringify("created_at"),
        ],
    };
}

/// Stash for [`Dataset`]s.
#[derive(Clone, Debug)]
pub struct DatasetStash {
    base: BaseUidStoreStash<Dataset>,
}

impl DatasetStash {
    pub fn new(store: Arc<dyn DocumentStore>) -> StoreResult<Self> {
        Ok(Self {
            base: BaseUidStoreStash::new(store)?,
        })
    }

    pub fn base(&self) -> &BaseUidStoreStash<Dataset> {
        &self.base
    }

    pub fn set(&self, credential: &VerifyKey, dataset: &Dataset) -> StoreResult<Dataset> {
        self.base.set(credential, dataset)
    }

    pub fn get_by_uid(&self, credential: &VerifyKey, uid: &Uid) -> StoreResult<Option<Dataset>> {
        self.base.get_by_uid(credential, uid)
    }

    pub fn get_all(&self, credential: &VerifyKey) -> StoreResult<Vec<Dataset>> {
        self.base.get_all(credential)
    }

    pub fn delete_by_uid(&self, credential: &VerifyKey, uid: &Uid) -> StoreResult<()> {
        self.base.delete_by_uid(credential, uid)
    }

    pub fn get_by_name(&self, credential: &VerifyKey, name: &str) -> StoreResult<Option<Dataset>> {
        let qks = QueryKeys::single(NAME_PARTITION_KEY.with_obj(name));
        self.base.query_one(credential, &qks)
    }

    /// Update a dataset. Anything other than a [`DatasetUpdate`] is a type
    /// mismatch and leaves the store untouched.
    pub fn update<U: UpdateObject>(&self, credential: &VerifyKey, update: &U) -> StoreResult<Dataset> {
        self.base.update(credential, update)
    }

    /// Datasets that reference the action object `uid`.
    pub fn search_action_ids(&self, credential: &VerifyKey, uid: Uid) -> StoreResult<Vec<Dataset>> {
        let qks = QueryKeys::single(ACTION_IDS_PARTITION_KEY.with_obj(uid));
        self.base.query_all(credential, &qks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::UserUpdate;
    use prov_store::{Access, InMemoryDocumentStore, Role, RolePolicy, StoreError};

    fn stash() -> DatasetStash {
        DatasetStash::new(Arc::new(InMemoryDocumentStore::new())).unwrap()
    }

    fn key() -> VerifyKey {
        VerifyKey::ephemeral()
    }

    #[test]
    fn census_scenario() {
        let s = stash();
        let k = key();
        let action = Uid::new();
        let census = Dataset::new("census", "population counts").with_action(action);
        s.set(&k, &census).unwrap();

        let by_name = s.get_by_name(&k, "census").unwrap().unwrap();
        assert_eq!(by_name, census);

        let by_action = s.search_action_ids(&k, action).unwrap();
        assert_eq!(by_action, vec![census]);
        assert!(s.search_action_ids(&k, Uid::new()).unwrap().is_empty());
        assert!(s.get_by_name(&k, "nope").unwrap().is_none());
    }

    #[test]
    fn names_are_unique() {
        let s = stash();
        let k = key();
        s.set(&k, &Dataset::new("census", "")).unwrap();
        let err = s.set(&k, &Dataset::new("census", "again")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { ref key, .. } if key == "name"));
    }

    #[test]
    fn update_changes_only_given_fields() {
        let s = stash();
        let k = key();
        let ds = s.set(&k, &Dataset::new("census", "old")).unwrap();
        let action = Uid::new();
        let updated = s
            .update(
                &k,
                &DatasetUpdate::new(ds.id)
                    .description("new")
                    .action_ids(vec![action]),
            )
            .unwrap();
        assert_eq!(updated.id, ds.id);
        assert_eq!(updated.name, "census");
        assert_eq!(updated.description, "new");
        assert_eq!(updated.created_at, ds.created_at);
        assert_eq!(s.search_action_ids(&k, action).unwrap().len(), 1);
    }

    #[test]
    fn update_of_wrong_kind_is_type_mismatch_without_change() {
        let s = stash();
        let k = key();
        let ds = s.set(&k, &Dataset::new("census", "counts")).unwrap();
        let wrong = UserUpdate::new(ds.id).name("census-renamed");
        let err = s.update(&k, &wrong).unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
        assert_eq!(s.get_by_uid(&k, &ds.id).unwrap().unwrap(), ds);
    }

    #[test]
    fn read_only_credential_cannot_set() {
        let policy = Arc::new(RolePolicy::new());
        let reader = key();
        policy.grant(reader, Role::data_scientist());
        let s = DatasetStash::new(Arc::new(InMemoryDocumentStore::with_policy(policy))).unwrap();

        let ds = Dataset::new("census", "");
        let err = s.set(&reader, &ds).unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { access: Access::Create, .. }));
        assert!(s.get_by_uid(&reader, &ds.id).unwrap().is_none());
        assert!(s.get_all(&reader).unwrap().is_empty());
    }

    #[test]
    fn delete_removes_from_queries() {
        let s = stash();
        let k = key();
        let ds = s.set(&k, &Dataset::new("census", "")).unwrap();
        s.delete_by_uid(&k, &ds.id).unwrap();
        assert!(s.get_by_name(&k, "census").unwrap().is_none());
        assert!(s.base().is_empty().unwrap());
    }

    #[test]
    fn plain_form_stringifies_created_at() {
        let ds = Dataset::new("census", "");
        let plain = ds.to_plain().unwrap();
        assert_eq!(
            plain["created_at"],
            serde_json::Value::String(ds.created_at.as_millis().to_string())
        );
    }
}
