use std::sync::{Arc, RwLock};

use prov_action::{ActionDispatcher, ActionTypeRegistry, ElementwiseEngine, LineageGraph};
use prov_crypto::SigningKey;
use prov_stash::{ActionObjectStash, DatasetStash, User, UserStash};
use prov_store::{AllowAll, DocumentStore, InMemoryDocumentStore, PermissionPolicy, Role, RolePolicy};
use prov_types::{Uid, VerifyKey};
use tracing::{debug, info};

use crate::config::{NodeConfig, PolicyKind};
use crate::error::{NodeError, NodeResult};
use crate::service::ActionService;

/// An embedded Provenant node.
///
/// Owns the document store, the typed stashes over it, the action
/// dispatcher, and the lineage graph. The root key holds the Owner role.
pub struct Node {
    config: NodeConfig,
    root: SigningKey,
    store: Arc<InMemoryDocumentStore>,
    roles: Option<Arc<RolePolicy>>,
    datasets: DatasetStash,
    actions: ActionObjectStash,
    users: UserStash,
    dispatcher: Arc<ActionDispatcher>,
    lineage: Arc<RwLock<LineageGraph>>,
}

impl Node {
    pub fn new(config: NodeConfig) -> NodeResult<Self> {
        config.validate()?;
        let root = SigningKey::generate();

        let (policy, roles): (Arc<dyn PermissionPolicy>, Option<Arc<RolePolicy>>) =
            match config.policy {
                PolicyKind::AllowAll => (Arc::new(AllowAll) as Arc<dyn PermissionPolicy>, None),
                PolicyKind::Roles => {
                    let roles = Arc::new(RolePolicy::new());
                    roles.grant(root.verify_key(), Role::owner());
                    let policy: Arc<dyn PermissionPolicy> = roles.clone();
                    (policy, Some(roles))
                }
            };
        let store = Arc::new(InMemoryDocumentStore::with_policy(policy));
        let shared: Arc<dyn DocumentStore> = store.clone();

        let registry = Arc::new(config.registry.build()?);
        let dispatcher = Arc::new(ActionDispatcher::new(Arc::new(ElementwiseEngine), registry));

        let node = Self {
            datasets: DatasetStash::new(shared.clone())?,
            actions: ActionObjectStash::new(shared.clone())?,
            users: UserStash::new(shared)?,
            config,
            root,
            store,
            roles,
            dispatcher,
            lineage: Arc::new(RwLock::new(LineageGraph::new())),
        };
        info!(
            node = %node.config.name,
            policy = ?node.config.policy,
            root = %node.root_key().short_id(),
            "node started"
        );
        Ok(node)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The Owner credential.
    pub fn root_key(&self) -> VerifyKey {
        self.root.verify_key()
    }

    pub fn root_signing_key(&self) -> &SigningKey {
        &self.root
    }

    /// Grant `role` to `key`. Only meaningful under the `roles` policy.
    pub fn grant(&self, key: VerifyKey, role: Role) -> NodeResult<()> {
        let roles = self.role_policy()?;
        debug!(key = %key.short_id(), role = %role.name, "granted role");
        roles.grant(key, role);
        Ok(())
    }

    pub fn revoke(&self, key: &VerifyKey) -> NodeResult<Option<Role>> {
        Ok(self.role_policy()?.revoke(key))
    }

    fn role_policy(&self) -> NodeResult<&Arc<RolePolicy>> {
        self.roles
            .as_ref()
            .ok_or_else(|| NodeError::Config("roles are not used under the allow_all policy".into()))
    }

    /// Create a user with a fresh key pair and grant it `role`.
    ///
    /// The user record is written first, so a denied write grants nothing.
    pub fn register_user(
        &self,
        credential: &VerifyKey,
        email: &str,
        name: &str,
        role: Role,
        password: &str,
    ) -> NodeResult<(User, SigningKey)> {
        let key = SigningKey::generate();
        let user = User::new(email, name, role.name.clone(), key.verify_key(), password)?;
        let user = self.users.set(credential, &user)?;
        if let Some(roles) = &self.roles {
            roles.grant(key.verify_key(), role);
        }
        Ok((user, key))
    }

    /// Change a user's role, in the stored record and in the role policy.
    ///
    /// The record is rewritten first, so a denied write leaves the grant
    /// alone. Under `allow_all` only the record changes.
    pub fn set_role(&self, credential: &VerifyKey, user: &Uid, role: Role) -> NodeResult<User> {
        let updated = self.users.set_role(credential, user, role.name.clone())?;
        if let Some(roles) = &self.roles {
            debug!(user = %updated.email, role = %role.name, "role changed");
            roles.grant(updated.verify_key, role);
        }
        Ok(updated)
    }

    pub fn datasets(&self) -> &DatasetStash {
        &self.datasets
    }

    pub fn actions(&self) -> &ActionObjectStash {
        &self.actions
    }

    pub fn users(&self) -> &UserStash {
        &self.users
    }

    pub fn store(&self) -> &Arc<InMemoryDocumentStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ActionTypeRegistry> {
        self.dispatcher.registry()
    }

    pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
        &self.dispatcher
    }

    /// A handle for running and persisting actions. Handles share the
    /// node's store and lineage graph.
    pub fn action_service(&self) -> ActionService {
        ActionService::new(
            self.actions.clone(),
            self.dispatcher.clone(),
            self.lineage.clone(),
        )
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.config.name)
            .field("policy", &self.config.policy)
            .field("root", &self.root_key())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prov_stash::Dataset;
    use prov_store::StoreError;

    fn node() -> Node {
        Node::new(NodeConfig::default()).unwrap()
    }

    #[test]
    fn root_key_is_owner() {
        let n = node();
        let root = n.root_key();
        n.datasets().set(&root, &Dataset::new("mnist", "digits")).unwrap();
        assert_eq!(n.datasets().get_all(&root).unwrap().len(), 1);
        assert_eq!(n.store().total_documents().unwrap(), 1);
    }

    #[test]
    fn unknown_key_is_denied() {
        let n = node();
        let stranger = VerifyKey::ephemeral();
        assert!(matches!(
            n.datasets().get_all(&stranger),
            Err(StoreError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn grant_and_revoke() {
        let n = node();
        let key = VerifyKey::ephemeral();
        n.grant(key, Role::data_scientist()).unwrap();
        assert!(n.datasets().get_all(&key).unwrap().is_empty());
        assert!(n.datasets().set(&key, &Dataset::new("x", "")).is_err());

        assert_eq!(n.revoke(&key).unwrap().map(|r| r.name), Some("Data Scientist".into()));
        assert!(n.datasets().get_all(&key).is_err());
    }

    #[test]
    fn allow_all_has_no_roles() {
        let n = Node::new(NodeConfig {
            policy: PolicyKind::AllowAll,
            ..Default::default()
        })
        .unwrap();
        let anyone = VerifyKey::ephemeral();
        n.datasets().set(&anyone, &Dataset::new("open", "")).unwrap();
        assert!(matches!(
            n.grant(anyone, Role::owner()),
            Err(NodeError::Config(_))
        ));
    }

    #[test]
    fn register_user_grants_role() {
        let n = node();
        let (user, key) = n
            .register_user(&n.root_key(), "ada@example.org", "Ada", Role::administrator(), "pw")
            .unwrap();
        assert_eq!(user.role, "Administrator");
        assert!(user.check_password("pw"));
        assert_eq!(
            n.users().get_by_verify_key(&key.verify_key(), &key.verify_key()).unwrap(),
            Some(user)
        );
    }

    #[test]
    fn denied_registration_grants_nothing() {
        let n = node();
        let stranger = VerifyKey::ephemeral();
        assert!(n
            .register_user(&stranger, "eve@example.org", "Eve", Role::owner(), "pw")
            .is_err());
        assert!(n.users().get_all(&n.root_key()).unwrap().is_empty());
    }

    #[test]
    fn set_role_moves_record_and_grant_together() {
        let n = node();
        let root = n.root_key();
        let (user, key) = n
            .register_user(&root, "bo@example.org", "Bo", Role::data_scientist(), "pw")
            .unwrap();
        let vk = key.verify_key();
        assert!(n.datasets().set(&vk, &Dataset::new("before", "")).is_err());

        let updated = n.set_role(&root, &user.id, Role::administrator()).unwrap();
        assert_eq!(updated.role, "Administrator");
        assert_eq!(
            n.users().get_by_uid(&root, &user.id).unwrap().map(|u| u.role),
            Some("Administrator".into())
        );
        n.datasets().set(&vk, &Dataset::new("after", "")).unwrap();
    }

    #[test]
    fn denied_role_change_keeps_grant() {
        let n = node();
        let (user, key) = n
            .register_user(&n.root_key(), "cy@example.org", "Cy", Role::data_scientist(), "pw")
            .unwrap();
        let vk = key.verify_key();
        assert!(n.set_role(&vk, &user.id, Role::owner()).is_err());
        assert!(n.datasets().set(&vk, &Dataset::new("x", "")).is_err());
        assert_eq!(
            n.users().get_by_uid(&n.root_key(), &user.id).unwrap().map(|u| u.role),
            Some("Data Scientist".into())
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = NodeConfig {
            name: " ".into(),
            ..Default::default()
        };
        assert!(matches!(Node::new(config), Err(NodeError::Config(_))));
    }
}
