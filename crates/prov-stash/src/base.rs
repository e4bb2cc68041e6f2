use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use prov_store::{
    Document, DocumentStore, DocumentUpdate, QueryKeys, StoreError, StoreResult,
};
use prov_types::{Uid, VerifyKey};
use tracing::debug;

use crate::traits::{StashObject, UpdateObject};

/// Typed façade over one partition of a [`DocumentStore`].
///
/// Holds nothing beyond the store handle; every call encodes or decodes
/// `T` and forwards to the store with `T`'s partition name.
pub struct BaseUidStoreStash<T: StashObject> {
    store: Arc<dyn DocumentStore>,
    _kind: PhantomData<fn() -> T>,
}

impl<T: StashObject> BaseUidStoreStash<T> {
    /// Bind to `store`, registering `T`'s partition if needed.
    pub fn new(store: Arc<dyn DocumentStore>) -> StoreResult<Self> {
        store.register_partition(T::settings())?;
        Ok(Self {
            store,
            _kind: PhantomData,
        })
    }

    pub fn partition(&self) -> &'static str {
        T::OBJECT_TYPE
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn len(&self) -> StoreResult<usize> {
        self.store.len(T::OBJECT_TYPE)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn set(&self, credential: &VerifyKey, obj: &T) -> StoreResult<T> {
        let document = Document::from_object(obj.uid(), T::OBJECT_TYPE, obj)?;
        self.store
            .create(credential, T::OBJECT_TYPE, document)?
            .decode()
    }

    pub fn get_by_uid(&self, credential: &VerifyKey, uid: &Uid) -> StoreResult<Option<T>> {
        self.store
            .get_by_uid(credential, T::OBJECT_TYPE, uid)?
            .map(|d| d.decode())
            .transpose()
    }

    pub fn delete_by_uid(&self, credential: &VerifyKey, uid: &Uid) -> StoreResult<()> {
        self.store.delete_by_uid(credential, T::OBJECT_TYPE, uid)
    }

    pub fn get_all(&self, credential: &VerifyKey) -> StoreResult<Vec<T>> {
        decode_all(self.store.get_all(credential, T::OBJECT_TYPE)?)
    }

    pub fn query_one(&self, credential: &VerifyKey, qks: &QueryKeys) -> StoreResult<Option<T>> {
        self.store
            .query_one(credential, T::OBJECT_TYPE, qks)?
            .map(|d| d.decode())
            .transpose()
    }

    pub fn query_all(&self, credential: &VerifyKey, qks: &QueryKeys) -> StoreResult<Vec<T>> {
        decode_all(self.store.query_all(credential, T::OBJECT_TYPE, qks)?)
    }

    /// Check that `U` is an update for this stash's kind.
    pub fn check_type<U: UpdateObject>(&self) -> StoreResult<()> {
        if U::TARGET != T::OBJECT_TYPE {
            debug!(
                partition = T::OBJECT_TYPE,
                found = U::TARGET,
                "rejected update of the wrong kind"
            );
            return Err(StoreError::type_mismatch(T::OBJECT_TYPE, U::TARGET));
        }
        Ok(())
    }

    /// Apply a partial update. An update of the wrong kind is rejected
    /// here without reaching the store.
    pub fn update<U: UpdateObject>(&self, credential: &VerifyKey, update: &U) -> StoreResult<T> {
        self.check_type::<U>()?;
        let doc_update = DocumentUpdate::from_update(update.uid(), U::TARGET, update)?;
        self.store
            .update(credential, T::OBJECT_TYPE, doc_update)?
            .decode()
    }
}

fn decode_all<T: StashObject>(documents: Vec<Document>) -> StoreResult<Vec<T>> {
    documents.iter().map(|d| d.decode()).collect()
}

impl<T: StashObject> Clone for BaseUidStoreStash<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _kind: PhantomData,
        }
    }
}

impl<T: StashObject> fmt::Debug for BaseUidStoreStash<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseUidStoreStash")
            .field("partition", &T::OBJECT_TYPE)
            .finish()
    }
}
