use prov_types::{Uid, VerifyKey};

use crate::document::{Document, DocumentUpdate};
use crate::error::StoreResult;
use crate::keys::QueryKeys;
use crate::partition::PartitionSettings;

/// Credential-checked, partitioned document store.
///
/// All implementations must satisfy these invariants:
/// - Every call that touches documents checks the credential before doing
///   anything else. A denied call has no effect.
/// - A UID lives in at most one partition, once.
/// - A failing `create` or `update` leaves the store exactly as it was.
/// - Secondary indexes always agree with the stored bodies.
/// - Query results come back in partition insertion order.
pub trait DocumentStore: Send + Sync {
    /// Register a partition. Identical settings are a no-op; different
    /// settings under an existing name are a conflict.
    fn register_partition(&self, settings: PartitionSettings) -> StoreResult<()>;

    /// Insert a new document and return it with its insertion sequence.
    fn create(
        &self,
        credential: &VerifyKey,
        partition: &str,
        document: Document,
    ) -> StoreResult<Document>;

    /// Fetch a document by UID. Returns `Ok(None)` if it does not exist.
    fn get_by_uid(
        &self,
        credential: &VerifyKey,
        partition: &str,
        uid: &Uid,
    ) -> StoreResult<Option<Document>>;

    /// Merge a partial update into an existing document.
    fn update(
        &self,
        credential: &VerifyKey,
        partition: &str,
        update: DocumentUpdate,
    ) -> StoreResult<Document>;

    /// Remove a document. Deleting an absent UID is `NotFound`.
    fn delete_by_uid(&self, credential: &VerifyKey, partition: &str, uid: &Uid)
        -> StoreResult<()>;

    /// Every document matching `qks`, in insertion order.
    fn query_all(
        &self,
        credential: &VerifyKey,
        partition: &str,
        qks: &QueryKeys,
    ) -> StoreResult<Vec<Document>>;

    /// The earliest-inserted document matching `qks`.
    ///
    /// Default implementation takes the head of `query_all()`.
    fn query_one(
        &self,
        credential: &VerifyKey,
        partition: &str,
        qks: &QueryKeys,
    ) -> StoreResult<Option<Document>> {
        Ok(self.query_all(credential, partition, qks)?.into_iter().next())
    }

    /// Every document in the partition.
    fn get_all(&self, credential: &VerifyKey, partition: &str) -> StoreResult<Vec<Document>> {
        self.query_all(credential, partition, &QueryKeys::all())
    }

    /// Number of documents in a partition.
    fn len(&self, partition: &str) -> StoreResult<usize>;

    /// Names of all registered partitions, sorted.
    fn partitions(&self) -> StoreResult<Vec<String>>;
}
