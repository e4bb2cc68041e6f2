//! A single typed collection and its secondary indexes.
//!
//! [`Partition`] is the storage engine behind one object kind: a primary
//! `Uid -> Document` map plus one `value -> {Uid}` index per declared
//! [`PartitionKey`]. Every mutating method validates the whole change before
//! touching either map, so a failed call leaves the partition untouched.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use prov_types::Uid;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::document::{Document, DocumentUpdate};
use crate::error::{StoreError, StoreResult};
use crate::keys::{PartitionKey, QueryKeys, QueryValue};

/// Checks that a body decodes as the partition's object type.
pub type Validator = fn(&Value) -> Result<(), String>;

/// A [`Validator`] that accepts any body `T` can be deserialized from.
pub fn validate_as<T: DeserializeOwned>(body: &Value) -> Result<(), String> {
    <T as Deserialize>::deserialize(body)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Binds an object kind to its partition.
#[derive(Clone)]
pub struct PartitionSettings {
    /// Partition name (usually the object kind's canonical name).
    pub name: &'static str,
    /// Canonical name of the object kind stored here.
    pub object_type: &'static str,
    /// Declared secondary indexes.
    pub keys: &'static [PartitionKey],
    pub validator: Option<Validator>,
}

impl PartitionSettings {
    pub const fn new(
        name: &'static str,
        object_type: &'static str,
        keys: &'static [PartitionKey],
    ) -> Self {
        Self {
            name,
            object_type,
            keys,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Look up a declared key by field name.
    pub fn key(&self, name: &str) -> Option<&PartitionKey> {
        self.keys.iter().find(|k| k.key == name)
    }

    /// Returns `true` if both settings describe the same partition layout.
    /// Validators are not compared.
    pub fn same_layout(&self, other: &Self) -> bool {
        self.name == other.name && self.object_type == other.object_type && self.keys == other.keys
    }
}

impl fmt::Debug for PartitionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionSettings")
            .field("name", &self.name)
            .field("object_type", &self.object_type)
            .field("keys", &self.keys)
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

type IndexEntries = Vec<(&'static str, Vec<QueryValue>)>;

/// One partition: primary records plus secondary indexes.
pub struct Partition {
    settings: PartitionSettings,
    records: HashMap<Uid, Document>,
    indexes: HashMap<&'static str, HashMap<QueryValue, BTreeSet<Uid>>>,
    next_seq: u64,
}

impl Partition {
    pub fn new(settings: PartitionSettings) -> Self {
        let indexes = settings.keys.iter().map(|k| (k.key, HashMap::new())).collect();
        Self {
            settings,
            records: HashMap::new(),
            indexes,
            next_seq: 0,
        }
    }

    pub fn settings(&self) -> &PartitionSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, uid: &Uid) -> bool {
        self.records.contains_key(uid)
    }

    pub fn get(&self, uid: &Uid) -> Option<&Document> {
        self.records.get(uid)
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Insert a new document, assigning its insertion sequence.
    pub fn insert(&mut self, mut document: Document) -> StoreResult<Document> {
        self.check_object_type(&document.object_type)?;
        if self.records.contains_key(&document.uid) {
            return Err(self.duplicate("id", document.uid.to_string()));
        }
        let entries = self.prepare(&document.uid, &document.body)?;

        document.seq = self.next_seq;
        self.next_seq += 1;
        self.index(&document.uid, &entries);
        self.records.insert(document.uid, document.clone());
        Ok(document)
    }

    /// Merge a partial update into an existing document.
    ///
    /// UID and insertion sequence are preserved.
    pub fn apply_update(&mut self, update: &DocumentUpdate) -> StoreResult<Document> {
        self.check_object_type(&update.object_type)?;
        let current = self.records.get(&update.uid).ok_or_else(|| StoreError::NotFound {
            partition: self.settings.name.to_string(),
            uid: update.uid,
        })?;
        let merged = update.merge_into(&current.body)?;
        let old_entries = self.extract_all(&current.body)?;
        let new_entries = self.prepare(&update.uid, &merged)?;

        self.unindex(&update.uid, &old_entries);
        self.index(&update.uid, &new_entries);
        let record = self
            .records
            .get_mut(&update.uid)
            .ok_or_else(|| StoreError::Backend("record vanished during update".into()))?;
        record.body = merged;
        Ok(record.clone())
    }

    /// Remove a document and its index entries.
    pub fn remove(&mut self, uid: &Uid) -> StoreResult<Document> {
        let current = self.records.get(uid).ok_or_else(|| StoreError::NotFound {
            partition: self.settings.name.to_string(),
            uid: *uid,
        })?;
        let entries = self.extract_all(&current.body)?;
        self.unindex(uid, &entries);
        self.records
            .remove(uid)
            .ok_or_else(|| StoreError::Backend("record vanished during delete".into()))
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// All documents matching every binding in `qks`, in insertion order.
    pub fn lookup(&self, qks: &QueryKeys) -> StoreResult<Vec<&Document>> {
        if qks.is_empty() {
            return Ok(self.sorted(self.records.keys()));
        }

        let mut buckets = Vec::with_capacity(qks.len());
        for qk in qks.iter() {
            let declared = self.settings.key(qk.key.key).ok_or_else(|| {
                StoreError::UnknownPartitionKey {
                    partition: self.settings.name.to_string(),
                    key: qk.key.key.to_string(),
                }
            })?;
            if declared.kind != qk.key.kind || !qk.value.fits(declared.kind) {
                return Err(StoreError::type_mismatch(
                    format!("{} for key '{}'", declared.kind, declared.key),
                    qk.value.type_name(),
                ));
            }
            match self
                .indexes
                .get(declared.key)
                .and_then(|index| index.get(&qk.value))
            {
                Some(bucket) => buckets.push(bucket),
                // One empty bucket empties the intersection.
                None => return Ok(Vec::new()),
            }
        }

        buckets.sort_by_key(|b| b.len());
        let (smallest, rest) = buckets.split_first().ok_or_else(|| {
            StoreError::Backend("query produced no index buckets".into())
        })?;
        let matched = smallest
            .iter()
            .filter(|uid| rest.iter().all(|bucket| bucket.contains(*uid)));
        Ok(self.sorted(matched))
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn sorted<'a>(&'a self, uids: impl Iterator<Item = &'a Uid>) -> Vec<&'a Document> {
        let mut docs: Vec<&Document> = uids.filter_map(|uid| self.records.get(uid)).collect();
        docs.sort_by_key(|d| d.seq);
        docs
    }

    fn check_object_type(&self, found: &str) -> StoreResult<()> {
        if found != self.settings.object_type {
            return Err(StoreError::type_mismatch(self.settings.object_type, found));
        }
        Ok(())
    }

    /// Validate a body for `uid` and compute its index entries.
    fn prepare(&self, uid: &Uid, body: &Value) -> StoreResult<IndexEntries> {
        if let Some(validate) = self.settings.validator {
            validate(body).map_err(|reason| {
                StoreError::type_mismatch(self.settings.object_type, format!("invalid body: {reason}"))
            })?;
        }
        let entries = self.extract_all(body)?;

        for (key, values) in &entries {
            let unique = self.settings.key(key).map(|k| k.unique).unwrap_or(false);
            if !unique {
                continue;
            }
            for value in values {
                let taken = self
                    .indexes
                    .get(key)
                    .and_then(|index| index.get(value))
                    .map(|bucket| bucket.iter().any(|other| other != uid))
                    .unwrap_or(false);
                if taken {
                    return Err(self.duplicate(key, value.to_string()));
                }
            }
        }
        Ok(entries)
    }

    fn extract_all(&self, body: &Value) -> StoreResult<IndexEntries> {
        self.settings
            .keys
            .iter()
            .map(|key| Ok((key.key, key.extract(body)?)))
            .collect()
    }

    fn index(&mut self, uid: &Uid, entries: &IndexEntries) {
        for (key, values) in entries {
            let index = self.indexes.entry(*key).or_default();
            for value in values {
                index.entry(value.clone()).or_default().insert(*uid);
            }
        }
    }

    fn unindex(&mut self, uid: &Uid, entries: &IndexEntries) {
        for (key, values) in entries {
            if let Some(index) = self.indexes.get_mut(key) {
                for value in values {
                    if let Some(bucket) = index.get_mut(value) {
                        bucket.remove(uid);
                        if bucket.is_empty() {
                            index.remove(value);
                        }
                    }
                }
            }
        }
    }

    fn duplicate(&self, key: &str, value: String) -> StoreError {
        StoreError::DuplicateKey {
            partition: self.settings.name.to_string(),
            key: key.to_string(),
            value,
        }
    }
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition")
            .field("name", &self.settings.name)
            .field("records", &self.records.len())
            .field("next_seq", &self.next_seq)
            .finish()
    }
}
