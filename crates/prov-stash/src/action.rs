use std::sync::Arc;

use prov_action::ActionObject;
use prov_store::{DocumentStore, KeyType, PartitionKey, QueryKeys, StoreResult};
use prov_types::{Uid, VerifyKey};

use crate::base::BaseUidStoreStash;
use crate::traits::{NoUpdate, StashObject};

/// Inputs an action object was derived from.
pub const PARENTS_PARTITION_KEY: PartitionKey = PartitionKey::new("parents", KeyType::UidSet);
pub const WRAPPER_PARTITION_KEY: PartitionKey = PartitionKey::new("wrapper", KeyType::Str);

impl StashObject for ActionObject {
    const OBJECT_TYPE: &'static str = "ActionObject";
    const KEYS: &'static [PartitionKey] = &[PARENTS_PARTITION_KEY, WRAPPER_PARTITION_KEY];
    type Update = NoUpdate;

    fn uid(&self) -> Uid {
        self.id()
    }
}

/// Stash for [`ActionObject`]s. Action objects are immutable, so there is
/// no update path.
#[derive(Clone, Debug)]
pub struct ActionObjectStash {
    base: BaseUidStoreStash<ActionObject>,
}

impl ActionObjectStash {
    pub fn new(store: Arc<dyn DocumentStore>) -> StoreResult<Self> {
        Ok(Self {
            base: BaseUidStoreStash::new(store)?,
        })
    }

    pub fn base(&self) -> &BaseUidStoreStash<ActionObject> {
        &self.base
    }

    pub fn set(&self, credential: &VerifyKey, obj: &ActionObject) -> StoreResult<ActionObject> {
        self.base.set(credential, obj)
    }

    pub fn get(&self, credential: &VerifyKey, uid: &Uid) -> StoreResult<Option<ActionObject>> {
        self.base.get_by_uid(credential, uid)
    }

    pub fn delete_by_uid(&self, credential: &VerifyKey, uid: &Uid) -> StoreResult<()> {
        self.base.delete_by_uid(credential, uid)
    }

    /// Objects derived (directly) from `parent`.
    pub fn search_by_parent(&self, credential: &VerifyKey, parent: Uid) -> StoreResult<Vec<ActionObject>> {
        let qks = QueryKeys::single(PARENTS_PARTITION_KEY.with_obj(parent));
        self.base.query_all(credential, &qks)
    }

    pub fn search_by_wrapper(&self, credential: &VerifyKey, wrapper: &str) -> StoreResult<Vec<ActionObject>> {
        let qks = QueryKeys::single(WRAPPER_PARTITION_KEY.with_obj(wrapper));
        self.base.query_all(credential, &qks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prov_action::{ActionDispatcher, ActionTypeRegistry, ElementwiseEngine, Payload, WrapperType};
    use prov_store::InMemoryDocumentStore;

    fn stash() -> ActionObjectStash {
        ActionObjectStash::new(Arc::new(InMemoryDocumentStore::new())).unwrap()
    }

    #[test]
    fn set_get_preserves_identity_and_parents() {
        let s = stash();
        let k = VerifyKey::ephemeral();
        let d = ActionDispatcher::new(
            Arc::new(ElementwiseEngine),
            Arc::new(ActionTypeRegistry::with_defaults()),
        );
        let a = ActionObject::new(vec![1i64, 2, 3], WrapperType::new("ArrayObject"));
        let b = d.mul(&a, 2i64).unwrap().into_objects().remove(0);
        s.set(&k, &a).unwrap();
        s.set(&k, &b).unwrap();

        let back = s.get(&k, &b.id()).unwrap().unwrap();
        assert_eq!(back.id(), b.id());
        assert_eq!(back.parents(), &[a.id()]);
        assert_eq!(back.data(), &Payload::from(vec![2i64, 4, 6]));

        let derived = s.search_by_parent(&k, a.id()).unwrap();
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].id(), b.id());
        assert_eq!(s.search_by_wrapper(&k, "ArrayObject").unwrap().len(), 2);
        assert!(s.search_by_wrapper(&k, "IntObject").unwrap().is_empty());
    }
}
