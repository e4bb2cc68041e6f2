use std::sync::Arc;

use prov_crypto::{hash_password, verify_password, PasswordError};
use prov_store::{
    Described, Descriptor, DocumentStore, FieldSpec, KeyType, PartitionKey, QueryKeys,
    StoreResult,
};
use prov_types::{Timestamp, Uid, VerifyKey};
use serde::{Deserialize, Serialize};

use crate::base::BaseUidStoreStash;
use crate::traits::{StashObject, UpdateObject};

pub const EMAIL_PARTITION_KEY: PartitionKey = PartitionKey::new("email", KeyType::Str).unique();
pub const VERIFY_KEY_PARTITION_KEY: PartitionKey =
    PartitionKey::new("verify_key", KeyType::Str).unique();

/// A registered principal.
///
/// `hashed_password` and `salt` are redacted from the plain form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uid,
    pub email: String,
    pub name: String,
    /// Name of the role granted to `verify_key`.
    pub role: String,
    pub verify_key: VerifyKey,
    pub hashed_password: String,
    pub salt: String,
    pub created_at: Timestamp,
}

impl User {
    /// Build a user, hashing `password` under a fresh salt.
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
        verify_key: VerifyKey,
        password: &str,
    ) -> Result<Self, PasswordError> {
        let digest = hash_password(password)?;
        Ok(Self {
            id: Uid::new(),
            email: email.into(),
            name: name.into(),
            role: role.into(),
            verify_key,
            hashed_password: digest.hashed_password,
            salt: digest.salt,
            created_at: Timestamp::now(),
        })
    }

    pub fn check_password(&self, password: &str) -> bool {
        verify_password(password, &self.hashed_password, &self.salt)
    }
}

/// Partial update for a [`User`].
///
/// Roles are not updatable here: the stored role mirrors the role policy
/// grant and changes through [`UserStash::set_role`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip)]
    pub id: Uid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub hashed_password: Option<String>,
    pub salt: Option<String>,
}

impl UserUpdate {
    pub fn new(id: Uid) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replace the password, hashing it under a fresh salt.
    pub fn password(mut self, password: &str) -> Result<Self, PasswordError> {
        let digest = hash_password(password)?;
        self.hashed_password = Some(digest.hashed_password);
        self.salt = Some(digest.salt);
        Ok(self)
    }
}

#[derive(Serialize)]
struct RoleUpdate {
    #[serde(skip)]
    id: Uid,
    role: String,
}

impl UpdateObject for RoleUpdate {
    const TARGET: &'static str = "User";

    fn uid(&self) -> Uid {
        self.id
    }
}

impl StashObject for User {
    const OBJECT_TYPE: &'static str = "User";
    const KEYS: &'static [PartitionKey] = &[EMAIL_PARTITION_KEY, VERIFY_KEY_PARTITION_KEY];
    type Update = UserUpdate;

    fn uid(&self) -> Uid {
        self.id
    }
}

impl UpdateObject for UserUpdate {
    const TARGET: &'static str = "User";

    fn uid(&self) -> Uid {
        self.id
    }
}

impl Described for User {
    const DESCRIPTOR: Descriptor = Descriptor {
        type_name: "User",
        fields: &[
            FieldSpec::stringify("id"),
            FieldSpec::include("email"),
            FieldSpec::include("name"),
            FieldSpec::include("role"),
            FieldSpec::include("verify_key"),
            FieldSpec::redact("hashed_password"),
            FieldSpec::redact("salt"),
            FieldSpec::stringify("created_at"),
        ],
    };
}

/// Stash for [`User`]s.
#[derive(Clone, Debug)]
pub struct UserStash {
    base: BaseUidStoreStash<User>,
}

impl UserStash {
    pub fn new(store: Arc<dyn DocumentStore>) -> StoreResult<Self> {
        Ok(Self {
            base: BaseUidStoreStash::new(store)?,
        })
    }

    pub fn base(&self) -> &BaseUidStoreStash<User> {
        &self.base
    }

    pub fn set(&self, credential: &VerifyKey, user: &User) -> StoreResult<User> {
        self.base.set(credential, user)
    }

    pub fn get_by_uid(&self, credential: &VerifyKey, uid: &Uid) -> StoreResult<Option<User>> {
        self.base.get_by_uid(credential, uid)
    }

    pub fn get_all(&self, credential: &VerifyKey) -> StoreResult<Vec<User>> {
        self.base.get_all(credential)
    }

    pub fn delete_by_uid(&self, credential: &VerifyKey, uid: &Uid) -> StoreResult<()> {
        self.base.delete_by_uid(credential, uid)
    }

    pub fn update<U: UpdateObject>(&self, credential: &VerifyKey, update: &U) -> StoreResult<User> {
        self.base.update(credential, update)
    }

    /// Rewrite the stored role name. Callers that enforce roles must move
    /// the policy grant in the same step.
    pub fn set_role(
        &self,
        credential: &VerifyKey,
        uid: &Uid,
        role: impl Into<String>,
    ) -> StoreResult<User> {
        let update = RoleUpdate {
            id: *uid,
            role: role.into(),
        };
        self.base.update(credential, &update)
    }

    pub fn get_by_email(&self, credential: &VerifyKey, email: &str) -> StoreResult<Option<User>> {
        let qks = QueryKeys::single(EMAIL_PARTITION_KEY.with_obj(email));
        self.base.query_one(credential, &qks)
    }

    pub fn get_by_verify_key(
        &self,
        credential: &VerifyKey,
        verify_key: &VerifyKey,
    ) -> StoreResult<Option<User>> {
        let qks = QueryKeys::single(VERIFY_KEY_PARTITION_KEY.with_obj(verify_key.to_hex()));
        self.base.query_one(credential, &qks)
    }
}
