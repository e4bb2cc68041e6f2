use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use prov_types::{Uid, VerifyKey};
use tracing::{debug, warn};

use crate::document::{Document, DocumentUpdate};
use crate::error::{StoreError, StoreResult};
use crate::keys::QueryKeys;
use crate::partition::{Partition, PartitionSettings};
use crate::policy::{Access, AllowAll, PermissionPolicy};
use crate::traits::DocumentStore;

/// In-memory, HashMap-based document store.
///
/// Each partition sits behind its own `RwLock`. A store-wide UID directory
/// keeps UIDs unique across partitions; writers that touch the directory
/// always take it before the partition lock.
pub struct InMemoryDocumentStore {
    policy: Arc<dyn PermissionPolicy>,
    directory: RwLock<HashMap<Uid, String>>,
    partitions: RwLock<HashMap<String, Arc<RwLock<Partition>>>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store that grants every credential everything.
    pub fn new() -> Self {
        Self::with_policy(Arc::new(AllowAll))
    }

    /// Create an empty store guarded by `policy`.
    pub fn with_policy(policy: Arc<dyn PermissionPolicy>) -> Self {
        Self {
            policy,
            directory: RwLock::new(HashMap::new()),
            partitions: RwLock::new(HashMap::new()),
        }
    }

    /// Total number of documents across all partitions.
    pub fn total_documents(&self) -> StoreResult<usize> {
        Ok(self.directory.read().map_err(|_| poisoned("directory"))?.len())
    }

    /// The partition that holds `uid`, if any.
    pub fn partition_of(&self, uid: &Uid) -> StoreResult<Option<String>> {
        let directory = self.directory.read().map_err(|_| poisoned("directory"))?;
        Ok(directory.get(uid).cloned())
    }

    fn authorize(&self, credential: &VerifyKey, partition: &str, access: Access) -> StoreResult<()> {
        if self.policy.check(credential, partition, access) {
            return Ok(());
        }
        warn!(credential = %credential, partition, %access, "permission denied");
        Err(StoreError::PermissionDenied {
            credential: *credential,
            partition: partition.to_string(),
            access,
        })
    }

    fn partition(&self, name: &str) -> StoreResult<Arc<RwLock<Partition>>> {
        let partitions = self.partitions.read().map_err(|_| poisoned("partition table"))?;
        partitions
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownPartition(name.to_string()))
    }
}

fn poisoned(what: &str) -> StoreError {
    StoreError::Backend(format!("{what} lock poisoned"))
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn register_partition(&self, settings: PartitionSettings) -> StoreResult<()> {
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| poisoned("partition table"))?;

        if let Some(existing) = partitions.get(settings.name) {
            let existing = existing.read().map_err(|_| poisoned(settings.name))?;
            if existing.settings().same_layout(&settings) {
                return Ok(());
            }
            return Err(StoreError::PartitionConflict(settings.name.to_string()));
        }

        debug!(
            partition = settings.name,
            keys = settings.keys.len(),
            "registered partition"
        );
        partitions.insert(
            settings.name.to_string(),
            Arc::new(RwLock::new(Partition::new(settings))),
        );
        Ok(())
    }

    fn create(
        &self,
        credential: &VerifyKey,
        partition: &str,
        document: Document,
    ) -> StoreResult<Document> {
        self.authorize(credential, partition, Access::Create)?;
        let handle = self.partition(partition)?;

        let mut directory = self.directory.write().map_err(|_| poisoned("directory"))?;
        if directory.contains_key(&document.uid) {
            return Err(StoreError::DuplicateKey {
                partition: partition.to_string(),
                key: "id".into(),
                value: document.uid.to_string(),
            });
        }
        let mut part = handle.write().map_err(|_| poisoned(partition))?;
        let stored = part.insert(document)?;
        directory.insert(stored.uid, partition.to_string());

        debug!(partition, uid = %stored.uid.short_id(), seq = stored.seq, "created document");
        Ok(stored)
    }

    fn get_by_uid(
        &self,
        credential: &VerifyKey,
        partition: &str,
        uid: &Uid,
    ) -> StoreResult<Option<Document>> {
        self.authorize(credential, partition, Access::Read)?;
        let handle = self.partition(partition)?;
        let part = handle.read().map_err(|_| poisoned(partition))?;
        Ok(part.get(uid).cloned())
    }

    fn update(
        &self,
        credential: &VerifyKey,
        partition: &str,
        update: DocumentUpdate,
    ) -> StoreResult<Document> {
        self.authorize(credential, partition, Access::Update)?;
        let handle = self.partition(partition)?;
        let mut part = handle.write().map_err(|_| poisoned(partition))?;
        let updated = part.apply_update(&update)?;

        debug!(
            partition,
            uid = %updated.uid.short_id(),
            fields = update.fields.len(),
            "updated document"
        );
        Ok(updated)
    }

    fn delete_by_uid(&self, credential: &VerifyKey, partition: &str, uid: &Uid) -> StoreResult<()> {
        self.authorize(credential, partition, Access::Delete)?;
        let handle = self.partition(partition)?;

        let mut directory = self.directory.write().map_err(|_| poisoned("directory"))?;
        let mut part = handle.write().map_err(|_| poisoned(partition))?;
        part.remove(uid)?;
        directory.remove(uid);

        debug!(partition, uid = %uid.short_id(), "deleted document");
        Ok(())
    }

    fn query_all(
        &self,
        credential: &VerifyKey,
        partition: &str,
        qks: &QueryKeys,
    ) -> StoreResult<Vec<Document>> {
        self.authorize(credential, partition, Access::Read)?;
        let handle = self.partition(partition)?;
        let part = handle.read().map_err(|_| poisoned(partition))?;
        Ok(part.lookup(qks)?.into_iter().cloned().collect())
    }

    fn len(&self, partition: &str) -> StoreResult<usize> {
        let handle = self.partition(partition)?;
        let part = handle.read().map_err(|_| poisoned(partition))?;
        Ok(part.len())
    }

    fn partitions(&self) -> StoreResult<Vec<String>> {
        let partitions = self.partitions.read().map_err(|_| poisoned("partition table"))?;
        let mut names: Vec<String> = partitions.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let partitions = self.partitions().unwrap_or_default();
        let documents = self.total_documents().unwrap_or_default();
        f.debug_struct("InMemoryDocumentStore")
            .field("partitions", &partitions)
            .field("document_count", &documents)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyType, PartitionKey};
    use crate::partition::validate_as;
    use crate::policy::{Role, RolePolicy};
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};

    const NAME: PartitionKey = PartitionKey::new("name", KeyType::Str).unique();
    const TAG: PartitionKey = PartitionKey::new("tag", KeyType::Str);
    const SIZE: PartitionKey = PartitionKey::new("size", KeyType::Int);
    const KEYS: &[PartitionKey] = &[NAME, TAG, SIZE];

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        name: String,
        tag: String,
        size: i64,
    }

    #[derive(Serialize)]
    struct ItemUpdate {
        name: Option<String>,
        tag: Option<String>,
        size: Option<i64>,
    }

    fn settings() -> PartitionSettings {
        PartitionSettings::new("Item", "Item", KEYS).with_validator(validate_as::<Item>)
    }

    fn store() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        store.register_partition(settings()).unwrap();
        store
    }

    fn item(name: &str, tag: &str, size: i64) -> Item {
        Item {
            name: name.into(),
            tag: tag.into(),
            size,
        }
    }

    fn doc(item: &Item) -> Document {
        Document::from_object(Uid::new(), "Item", item).unwrap()
    }

    fn key() -> VerifyKey {
        VerifyKey::ephemeral()
    }

    // ---------------------------------------------------------------
    // Partition registration
    // ---------------------------------------------------------------

    #[test]
    fn register_same_settings_is_noop() {
        let s = store();
        s.register_partition(settings()).unwrap();
        assert_eq!(s.partitions().unwrap(), vec!["Item".to_string()]);
    }

    #[test]
    fn register_different_settings_conflicts() {
        let s = store();
        let other = PartitionSettings::new("Item", "Item", &[NAME]);
        assert_eq!(
            s.register_partition(other),
            Err(StoreError::PartitionConflict("Item".into()))
        );
    }

    #[test]
    fn unknown_partition() {
        let s = store();
        let err = s.get_by_uid(&key(), "Nope", &Uid::new()).unwrap_err();
        assert_eq!(err, StoreError::UnknownPartition("Nope".into()));
        assert!(s.len("Nope").is_err());
    }

    // ---------------------------------------------------------------
    // CRUD
    // ---------------------------------------------------------------

    #[test]
    fn create_then_get_round_trips() {
        let s = store();
        let k = key();
        let it = item("a", "x", 1);
        let created = s.create(&k, "Item", doc(&it)).unwrap();
        let fetched = s.get_by_uid(&k, "Item", &created.uid).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.decode::<Item>().unwrap(), it);
        assert_eq!(s.len("Item").unwrap(), 1);
    }

    #[test]
    fn get_missing_is_none() {
        let s = store();
        assert!(s.get_by_uid(&key(), "Item", &Uid::new()).unwrap().is_none());
    }

    #[test]
    fn uid_unique_across_partitions() {
        let s = store();
        s.register_partition(PartitionSettings::new("Other", "Item", &[]))
            .unwrap();
        let k = key();
        let d = doc(&item("a", "x", 1));
        s.create(&k, "Item", d.clone()).unwrap();
        let err = s.create(&k, "Other", d.clone()).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { ref key, .. } if key == "id"));
        assert_eq!(s.len("Other").unwrap(), 0);
        assert_eq!(s.partition_of(&d.uid).unwrap().as_deref(), Some("Item"));
    }

    #[test]
    fn update_preserves_uid_and_other_fields() {
        let s = store();
        let k = key();
        let created = s.create(&k, "Item", doc(&item("a", "x", 1))).unwrap();
        let update = DocumentUpdate::from_update(
            created.uid,
            "Item",
            &ItemUpdate {
                name: None,
                tag: None,
                size: Some(9),
            },
        )
        .unwrap();
        let updated = s.update(&k, "Item", update).unwrap();
        assert_eq!(updated.uid, created.uid);
        assert_eq!(updated.decode::<Item>().unwrap(), item("a", "x", 9));

        let by_size = s
            .query_all(&k, "Item", &QueryKeys::single(SIZE.with_obj(9i64)))
            .unwrap();
        assert_eq!(by_size.len(), 1);
    }

    #[test]
    fn update_with_wrong_declared_type_changes_nothing() {
        let s = store();
        let k = key();
        let created = s.create(&k, "Item", doc(&item("a", "x", 1))).unwrap();
        let update = DocumentUpdate::from_update(
            created.uid,
            "User",
            &ItemUpdate {
                name: Some("b".into()),
                tag: None,
                size: None,
            },
        )
        .unwrap();
        assert!(matches!(
            s.update(&k, "Item", update),
            Err(StoreError::TypeMismatch { .. })
        ));
        assert_eq!(s.get_by_uid(&k, "Item", &created.uid).unwrap().unwrap(), created);
    }

    #[test]
    fn update_missing_is_not_found() {
        let s = store();
        let update = DocumentUpdate::from_update(
            Uid::new(),
            "Item",
            &ItemUpdate {
                name: None,
                tag: None,
                size: Some(1),
            },
        )
        .unwrap();
        assert!(matches!(
            s.update(&key(), "Item", update),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_then_get_is_none_and_second_delete_fails() {
        let s = store();
        let k = key();
        let created = s.create(&k, "Item", doc(&item("a", "x", 1))).unwrap();
        s.delete_by_uid(&k, "Item", &created.uid).unwrap();
        assert!(s.get_by_uid(&k, "Item", &created.uid).unwrap().is_none());
        assert!(matches!(
            s.delete_by_uid(&k, "Item", &created.uid),
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(s.total_documents().unwrap(), 0);
        assert!(s
            .query_all(&k, "Item", &QueryKeys::single(NAME.with_obj("a")))
            .unwrap()
            .is_empty());
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    #[test]
    fn query_one_returns_earliest_match() {
        let s = store();
        let k = key();
        s.create(&k, "Item", doc(&item("first", "x", 1))).unwrap();
        s.create(&k, "Item", doc(&item("second", "x", 1))).unwrap();
        let found = s
            .query_one(&k, "Item", &QueryKeys::single(TAG.with_obj("x")))
            .unwrap()
            .unwrap();
        assert_eq!(found.body["name"], "first");
        assert!(s
            .query_one(&k, "Item", &QueryKeys::single(TAG.with_obj("none")))
            .unwrap()
            .is_none());
    }

    #[test]
    fn query_unknown_key_is_rejected() {
        let s = store();
        let colour = PartitionKey::new("colour", KeyType::Str);
        assert!(matches!(
            s.query_all(&key(), "Item", &QueryKeys::single(colour.with_obj("red"))),
            Err(StoreError::UnknownPartitionKey { .. })
        ));
    }

    // ---------------------------------------------------------------
    // Permissions
    // ---------------------------------------------------------------

    #[test]
    fn denied_create_stores_nothing() {
        let policy = Arc::new(RolePolicy::new());
        let reader = key();
        policy.grant(reader, Role::data_scientist());
        let s = InMemoryDocumentStore::with_policy(policy);
        s.register_partition(settings()).unwrap();

        let d = doc(&item("a", "x", 1));
        let err = s.create(&reader, "Item", d.clone()).unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { access: Access::Create, .. }));
        assert_eq!(s.len("Item").unwrap(), 0);
        assert!(s.get_by_uid(&reader, "Item", &d.uid).unwrap().is_none());
    }

    #[test]
    fn denied_read_for_unknown_credential() {
        let s = InMemoryDocumentStore::with_policy(Arc::new(RolePolicy::new()));
        s.register_partition(settings()).unwrap();
        assert!(matches!(
            s.get_all(&key(), "Item"),
            Err(StoreError::PermissionDenied { access: Access::Read, .. })
        ));
    }

    #[test]
    fn debug_shows_counts() {
        let s = store();
        s.create(&key(), "Item", doc(&item("a", "x", 1))).unwrap();
        let rendered = format!("{s:?}");
        assert!(rendered.contains("document_count: 1"));
    }

    // ---------------------------------------------------------------
    // Query soundness and completeness
    // ---------------------------------------------------------------

    // ---------------------------------------------------------------
    // Concurrent callers
    // ---------------------------------------------------------------

    fn assert_matches_keys(docs: &[Document], tag: &str, size: i64) {
        for d in docs {
            let it = d.decode::<Item>().unwrap();
            assert_eq!((it.tag.as_str(), it.size), (tag, size), "index disagrees with record");
        }
    }

    #[test]
    fn concurrent_writers_and_readers_keep_index_consistent() {
        const WRITERS: usize = 4;
        const PER_WRITER: usize = 25;

        let s = store();
        let k = key();
        std::thread::scope(|scope| {
            for w in 0..WRITERS {
                let s = &s;
                scope.spawn(move || {
                    let tag = format!("t{w}");
                    for i in 0..PER_WRITER {
                        let size = (i % 4) as i64;
                        let created = s
                            .create(&k, "Item", doc(&item(&format!("w{w}-{i}"), &tag, size)))
                            .unwrap();
                        let update = DocumentUpdate::from_update(
                            created.uid,
                            "Item",
                            &ItemUpdate {
                                name: None,
                                tag: None,
                                size: Some(size + 10),
                            },
                        )
                        .unwrap();
                        s.update(&k, "Item", update).unwrap();
                    }
                });
            }
            for _ in 0..2 {
                let s = &s;
                scope.spawn(move || {
                    for round in 0..200 {
                        let tag = format!("t{}", round % WRITERS);
                        let size = (round % 4) as i64 + if round % 2 == 0 { 0 } else { 10 };
                        let qks = QueryKeys::single(TAG.with_obj(tag.as_str())).and(SIZE.with_obj(size));
                        let docs = s.query_all(&k, "Item", &qks).unwrap();
                        assert_matches_keys(&docs, &tag, size);
                        let all = s.get_all(&k, "Item").unwrap();
                        assert!(all.windows(2).all(|w| w[0].seq < w[1].seq));
                    }
                });
            }
        });

        let total = WRITERS * PER_WRITER;
        assert_eq!(s.len("Item").unwrap(), total);
        assert_eq!(s.get_all(&k, "Item").unwrap().len(), total);
        assert_eq!(s.total_documents().unwrap(), total);
        for w in 0..WRITERS {
            let tag = format!("t{w}");
            let by_tag = s
                .query_all(&k, "Item", &QueryKeys::single(TAG.with_obj(tag.as_str())))
                .unwrap();
            assert_eq!(by_tag.len(), PER_WRITER);
            for size in 0..4i64 {
                let qks = QueryKeys::single(TAG.with_obj(tag.as_str()));
                assert!(s.query_all(&k, "Item", &qks.clone().and(SIZE.with_obj(size))).unwrap().is_empty());
                let moved = s.query_all(&k, "Item", &qks.and(SIZE.with_obj(size + 10))).unwrap();
                assert_matches_keys(&moved, &tag, size + 10);
            }
            for i in 0..PER_WRITER {
                let name = format!("w{w}-{i}");
                let hit = s
                    .query_all(&k, "Item", &QueryKeys::single(NAME.with_obj(name.as_str())))
                    .unwrap();
                assert_eq!(hit.len(), 1);
                let stored = s.get_by_uid(&k, "Item", &hit[0].uid).unwrap().unwrap();
                assert_eq!(stored, hit[0]);
            }
        }
    }

    fn items_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
        prop::collection::vec(("[abc]", 0i64..4), 0..24)
    }

    proptest! {
        #[test]
        fn query_matches_exactly_the_filtered_items(
            rows in items_strategy(),
            tag in "[abc]",
            size in 0i64..4,
        ) {
            let s = store();
            let k = key();
            for (i, (t, n)) in rows.iter().enumerate() {
                s.create(&k, "Item", doc(&item(&format!("item-{i}"), t, *n))).unwrap();
            }

            let qks = QueryKeys::single(TAG.with_obj(tag.as_str())).and(SIZE.with_obj(size));
            let got: Vec<String> = s
                .query_all(&k, "Item", &qks)
                .unwrap()
                .into_iter()
                .map(|d| d.decode::<Item>().unwrap().name)
                .collect();
            let expected: Vec<String> = rows
                .iter()
                .enumerate()
                .filter(|(_, (t, n))| *t == tag && *n == size)
                .map(|(i, _)| format!("item-{i}"))
                .collect();
            prop_assert_eq!(got, expected);
        }

        #[test]
        fn empty_query_returns_all_in_insertion_order(rows in items_strategy()) {
            let s = store();
            let k = key();
            for (i, (t, n)) in rows.iter().enumerate() {
                s.create(&k, "Item", doc(&item(&format!("item-{i}"), t, *n))).unwrap();
            }
            let all = s.get_all(&k, "Item").unwrap();
            prop_assert_eq!(all.len(), rows.len());
            prop_assert!(all.windows(2).all(|w| w[0].seq < w[1].seq));
        }
    }
}
