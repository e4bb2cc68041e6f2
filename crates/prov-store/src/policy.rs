//! Credential checks for store operations.
//!
//! A [`PermissionPolicy`] answers one question: may this credential perform
//! this kind of access on this partition? The answer depends only on its
//! inputs and the policy's grant table; nothing in the store is consulted.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::RwLock;

use prov_types::VerifyKey;
use serde::{Deserialize, Serialize};

/// The kind of access an operation needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Access {
    Read,
    Create,
    Update,
    Delete,
}

impl Access {
    pub const ALL: [Access; 4] = [Self::Read, Self::Create, Self::Update, Self::Delete];
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Authorization seam for the document store.
pub trait PermissionPolicy: Send + Sync {
    /// Returns `true` if `credential` may perform `access` on `partition`.
    fn check(&self, credential: &VerifyKey, partition: &str, access: Access) -> bool;
}

/// Grants everything. Suitable for single-user embedding and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl PermissionPolicy for AllowAll {
    fn check(&self, _credential: &VerifyKey, _partition: &str, _access: Access) -> bool {
        true
    }
}

/// A named bundle of access grants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub grants: BTreeSet<Access>,
    /// Restricts the grants to these partitions; `None` means every
    /// partition.
    pub partitions: Option<BTreeSet<String>>,
}

impl Role {
    pub fn new(name: impl Into<String>, grants: impl IntoIterator<Item = Access>) -> Self {
        Self {
            name: name.into(),
            grants: grants.into_iter().collect(),
            partitions: None,
        }
    }

    /// Limit this role to the given partitions.
    pub fn scoped_to(mut self, partitions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.partitions = Some(partitions.into_iter().map(Into::into).collect());
        self
    }

    pub fn data_scientist() -> Self {
        Self::new("Data Scientist", [Access::Read])
    }

    pub fn compliance_officer() -> Self {
        Self::new("Compliance Officer", [Access::Read, Access::Update])
    }

    pub fn administrator() -> Self {
        Self::new("Administrator", Access::ALL)
    }

    pub fn owner() -> Self {
        Self::new("Owner", Access::ALL)
    }

    /// Returns `true` if this role grants `access` on `partition`.
    pub fn allows(&self, partition: &str, access: Access) -> bool {
        let in_scope = self
            .partitions
            .as_ref()
            .map(|scope| scope.contains(partition))
            .unwrap_or(true);
        in_scope && self.grants.contains(&access)
    }
}

/// Role-based policy: each credential maps to at most one [`Role`].
///
/// Unknown credentials are denied everything.
#[derive(Debug, Default)]
pub struct RolePolicy {
    roles: RwLock<HashMap<VerifyKey, Role>>,
}

impl RolePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `role` to `credential`, replacing any previous role.
    pub fn grant(&self, credential: VerifyKey, role: Role) {
        if let Ok(mut roles) = self.roles.write() {
            roles.insert(credential, role);
        }
    }

    /// Remove the credential's role. Returns the role it held.
    pub fn revoke(&self, credential: &VerifyKey) -> Option<Role> {
        self.roles.write().ok()?.remove(credential)
    }

    pub fn role_of(&self, credential: &VerifyKey) -> Option<Role> {
        self.roles.read().ok()?.get(credential).cloned()
    }
}

impl PermissionPolicy for RolePolicy {
    fn check(&self, credential: &VerifyKey, partition: &str, access: Access) -> bool {
        // A poisoned grant table denies.
        self.roles
            .read()
            .map(|roles| {
                roles
                    .get(credential)
                    .map(|role| role.allows(partition, access))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_allows() {
        let key = VerifyKey::ephemeral();
        for access in Access::ALL {
            assert!(AllowAll.check(&key, "Dataset", access));
        }
    }

    #[test]
    fn preset_roles() {
        let ds = Role::data_scientist();
        assert!(ds.allows("Dataset", Access::Read));
        assert!(!ds.allows("Dataset", Access::Create));

        let co = Role::compliance_officer();
        assert!(co.allows("Dataset", Access::Update));
        assert!(!co.allows("Dataset", Access::Delete));

        for role in [Role::administrator(), Role::owner()] {
            for access in Access::ALL {
                assert!(role.allows("anything", access));
            }
        }
    }

    #[test]
    fn scoped_role_only_applies_to_its_partitions() {
        let role = Role::new("uploader", [Access::Create]).scoped_to(["Dataset"]);
        assert!(role.allows("Dataset", Access::Create));
        assert!(!role.allows("User", Access::Create));
    }

    #[test]
    fn unknown_credential_is_denied() {
        let policy = RolePolicy::new();
        assert!(!policy.check(&VerifyKey::ephemeral(), "Dataset", Access::Read));
    }

    #[test]
    fn grant_and_revoke() {
        let policy = RolePolicy::new();
        let key = VerifyKey::ephemeral();
        policy.grant(key, Role::data_scientist());
        assert!(policy.check(&key, "Dataset", Access::Read));
        assert!(!policy.check(&key, "Dataset", Access::Delete));
        assert_eq!(policy.role_of(&key).unwrap().name, "Data Scientist");

        let revoked = policy.revoke(&key).unwrap();
        assert_eq!(revoked, Role::data_scientist());
        assert!(!policy.check(&key, "Dataset", Access::Read));
    }

    #[test]
    fn access_display() {
        assert_eq!(Access::Create.to_string(), "create");
    }
}
