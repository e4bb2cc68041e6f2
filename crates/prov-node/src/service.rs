use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use prov_action::{
    ActionDispatcher, ActionError, ActionObject, ActionOutput, Kwargs, LineageGraph, Operand,
    Payload, Produced,
};
use prov_stash::{ActionObjectStash, StashObject};
use prov_store::StoreError;
use prov_types::{Uid, VerifyKey};
use tracing::debug;

use crate::error::NodeResult;

/// An operand of [`ActionService::execute`].
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    /// An action object already in the store.
    Stored(Uid),
    Raw(Payload),
}

impl From<Uid> for Input {
    fn from(uid: Uid) -> Self {
        Self::Stored(uid)
    }
}

impl From<Payload> for Input {
    fn from(payload: Payload) -> Self {
        Self::Raw(payload)
    }
}

impl From<i64> for Input {
    fn from(v: i64) -> Self {
        Self::Raw(Payload::Int(v))
    }
}

impl From<f64> for Input {
    fn from(v: f64) -> Self {
        Self::Raw(Payload::Float(v))
    }
}

/// Runs operations over stored action objects and persists the results.
///
/// Every object that passes through the service ends up in the action
/// stash, and its UID and parent edges in the shared lineage graph. Objects
/// written to the stash directly are adopted into the graph the first time
/// they are used.
#[derive(Clone, Debug)]
pub struct ActionService {
    actions: ActionObjectStash,
    dispatcher: Arc<ActionDispatcher>,
    lineage: Arc<RwLock<LineageGraph>>,
}

impl ActionService {
    pub fn new(
        actions: ActionObjectStash,
        dispatcher: Arc<ActionDispatcher>,
        lineage: Arc<RwLock<LineageGraph>>,
    ) -> Self {
        Self {
            actions,
            dispatcher,
            lineage,
        }
    }

    /// Persist `obj` and record it in the lineage graph.
    pub fn save(&self, credential: &VerifyKey, obj: &ActionObject) -> NodeResult<ActionObject> {
        let mut graph = self.write_lineage()?;
        self.adopt_parents(credential, &mut graph, obj)?;
        graph.check(obj)?;
        let stored = self.actions.set(credential, obj)?;
        graph.record(&stored)?;
        Ok(stored)
    }

    pub fn get(&self, credential: &VerifyKey, uid: &Uid) -> NodeResult<Option<ActionObject>> {
        Ok(self.actions.get(credential, uid)?)
    }

    /// Apply `op` to the stored object `primary` and `inputs`.
    ///
    /// Produced action objects are persisted and recorded before this
    /// returns. Payloads with no registered wrapper come back raw and are
    /// not stored.
    pub fn execute(
        &self,
        credential: &VerifyKey,
        op: &str,
        primary: Uid,
        inputs: &[Input],
    ) -> NodeResult<ActionOutput> {
        self.execute_with(credential, op, primary, inputs, &Kwargs::new())
    }

    pub fn execute_with(
        &self,
        credential: &VerifyKey,
        op: &str,
        primary: Uid,
        inputs: &[Input],
        kwargs: &Kwargs,
    ) -> NodeResult<ActionOutput> {
        if !self.dispatcher.supports(op) {
            return Err(ActionError::UnsupportedOperation(op.to_string()).into());
        }

        let primary = self.load(credential, &primary)?;
        let resolved = inputs
            .iter()
            .map(|input| match input {
                Input::Stored(uid) => self.load(credential, uid).map(Produced::Action),
                Input::Raw(payload) => Ok(Produced::Raw(payload.clone())),
            })
            .collect::<NodeResult<Vec<_>>>()?;

        let mut graph = self.write_lineage()?;
        self.adopt(credential, &mut graph, &primary)?;
        for obj in resolved.iter().filter_map(Produced::as_action) {
            self.adopt(credential, &mut graph, obj)?;
        }

        let operands: Vec<Operand<'_>> = resolved
            .iter()
            .map(|r| match r {
                Produced::Action(obj) => Operand::Action(obj),
                Produced::Raw(payload) => Operand::Raw(payload.clone()),
            })
            .collect();
        let output = self.dispatcher.apply(op, &primary, &operands, kwargs)?;

        for obj in output.objects() {
            self.actions.set(credential, obj)?;
            graph.record(obj)?;
        }
        debug!(
            op,
            primary = %primary.id().short_id(),
            persisted = output.objects().len(),
            "executed action"
        );
        Ok(output)
    }

    /// Remove a stored object. Its lineage edges stay in the graph, so
    /// objects derived from it still name it as a parent.
    pub fn delete(&self, credential: &VerifyKey, uid: &Uid) -> NodeResult<()> {
        Ok(self.actions.delete_by_uid(credential, uid)?)
    }

    // ----------------------------------------------------------------
    // Lineage queries
    // ----------------------------------------------------------------
    //
    // The graph only knows UIDs. Every object returned here is read back
    // through the action stash under `credential`; deleted objects are
    // left out.

    /// Ancestors of `uid` up to `depth` levels, nearest first.
    pub fn lineage(&self, credential: &VerifyKey, uid: &Uid, depth: usize) -> NodeResult<Vec<ActionObject>> {
        self.load(credential, uid)?;
        let ids = self.read_lineage()?.ancestors(uid, depth)?;
        self.resolve(credential, &ids)
    }

    pub fn descendants(&self, credential: &VerifyKey, uid: &Uid, depth: usize) -> NodeResult<Vec<ActionObject>> {
        self.load(credential, uid)?;
        let ids = self.read_lineage()?.descendants(uid, depth)?;
        self.resolve(credential, &ids)
    }

    /// The derivation chain from `from` down to `to`, both included.
    pub fn lineage_path(
        &self,
        credential: &VerifyKey,
        from: &Uid,
        to: &Uid,
    ) -> NodeResult<Option<Vec<ActionObject>>> {
        self.load(credential, from)?;
        self.load(credential, to)?;
        let ids = self.read_lineage()?.lineage_path(from, to);
        ids.map(|ids| self.resolve(credential, &ids)).transpose()
    }

    fn resolve(&self, credential: &VerifyKey, ids: &[Uid]) -> NodeResult<Vec<ActionObject>> {
        let mut objects = Vec::with_capacity(ids.len());
        for uid in ids {
            if let Some(obj) = self.actions.get(credential, uid)? {
                objects.push(obj);
            }
        }
        Ok(objects)
    }

    fn load(&self, credential: &VerifyKey, uid: &Uid) -> NodeResult<ActionObject> {
        self.actions.get(credential, uid)?.ok_or_else(|| {
            StoreError::NotFound {
                partition: ActionObject::OBJECT_TYPE.to_string(),
                uid: *uid,
            }
            .into()
        })
    }

    /// Record a stored object, and any of its stored ancestors, that the
    /// graph has not seen yet.
    fn adopt(&self, credential: &VerifyKey, graph: &mut LineageGraph, obj: &ActionObject) -> NodeResult<()> {
        if graph.contains(&obj.id()) {
            return Ok(());
        }
        self.adopt_parents(credential, graph, obj)?;
        graph.record(obj)?;
        Ok(())
    }

    fn adopt_parents(&self, credential: &VerifyKey, graph: &mut LineageGraph, obj: &ActionObject) -> NodeResult<()> {
        for parent in obj.parents() {
            if !graph.contains(parent) {
                let stored = self.load(credential, parent)?;
                self.adopt(credential, graph, &stored)?;
            }
        }
        Ok(())
    }

    fn read_lineage(&self) -> NodeResult<RwLockReadGuard<'_, LineageGraph>> {
        self.lineage
            .read()
            .map_err(|_| StoreError::Backend("lineage lock poisoned".into()).into())
    }

    fn write_lineage(&self) -> NodeResult<RwLockWriteGuard<'_, LineageGraph>> {
        self.lineage
            .write()
            .map_err(|_| StoreError::Backend("lineage lock poisoned".into()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::error::NodeError;
    use crate::node::Node;
    use prov_action::{EngineError, WrapperType};
    use prov_store::Role;

    fn setup() -> (Node, ActionService, VerifyKey) {
        let node = Node::new(NodeConfig::default()).unwrap();
        let service = node.action_service();
        let root = node.root_key();
        (node, service, root)
    }

    fn int(n: i64) -> ActionObject {
        ActionObject::new(n, WrapperType::new("IntObject"))
    }

    // ----------------------------------------------------------------
    // execute
    // ----------------------------------------------------------------

    #[test]
    fn add_persists_result_with_lineage() {
        let (node, svc, root) = setup();
        let a = svc.save(&root, &int(2)).unwrap();
        let b = svc.save(&root, &int(3)).unwrap();

        let out = svc.execute(&root, "add", a.id(), &[b.id().into()]).unwrap();
        let c = out.object().unwrap();
        assert_eq!(c.data(), &Payload::Int(5));
        assert_eq!(c.parents(), &[a.id(), b.id()]);

        let stored = svc.get(&root, &c.id()).unwrap().unwrap();
        assert_eq!(&stored, c);
        assert_eq!(node.actions().search_by_parent(&root, a.id()).unwrap().len(), 1);
        assert_eq!(svc.lineage(&root, &c.id(), 1).unwrap().len(), 2);
    }

    #[test]
    fn raw_inputs_and_tuples() {
        let (_node, svc, root) = setup();
        let a = svc.save(&root, &int(7)).unwrap();
        let out = svc.execute(&root, "divmod", a.id(), &[2i64.into()]).unwrap();
        let objs = out.objects();
        assert_eq!(objs.len(), 2);
        assert_eq!(objs[0].data(), &Payload::Int(3));
        assert_eq!(objs[1].data(), &Payload::Int(1));
        for obj in objs {
            assert_eq!(obj.parents(), &[a.id()]);
            assert!(svc.get(&root, &obj.id()).unwrap().is_some());
        }
        assert_eq!(svc.descendants(&root, &a.id(), 1).unwrap().len(), 2);
    }

    #[test]
    fn unregistered_kind_is_not_persisted() {
        let (node, svc, root) = setup();
        let s = svc
            .save(&root, &ActionObject::new("ab", WrapperType::new("TextObject")))
            .unwrap();
        let out = svc.execute(&root, "add", s.id(), &[Payload::from("cd").into()]).unwrap();
        assert!(out.objects().is_empty());
        assert_eq!(out.elements()[0].payload(), &Payload::from("abcd"));
        assert_eq!(node.actions().base().len().unwrap(), 1);
    }

    #[test]
    fn missing_input_is_not_found() {
        let (_node, svc, root) = setup();
        let a = svc.save(&root, &int(1)).unwrap();
        let ghost = Uid::new();
        assert!(matches!(
            svc.execute(&root, "add", a.id(), &[ghost.into()]),
            Err(NodeError::Store(StoreError::NotFound { uid, .. })) if uid == ghost
        ));
        assert!(matches!(
            svc.execute(&root, "neg", ghost, &[]),
            Err(NodeError::Store(StoreError::NotFound { .. }))
        ));
    }

    #[test]
    fn unsupported_and_failing_ops_store_nothing() {
        let (node, svc, root) = setup();
        let a = svc.save(&root, &int(1)).unwrap();
        assert!(matches!(
            svc.execute(&root, "pow", a.id(), &[2i64.into()]),
            Err(NodeError::Action(ActionError::UnsupportedOperation(op))) if op == "pow"
        ));
        assert!(matches!(
            svc.execute(&root, "div", a.id(), &[0i64.into()]),
            Err(NodeError::Action(ActionError::ComputationFailure(EngineError::DivisionByZero)))
        ));
        assert_eq!(node.actions().base().len().unwrap(), 1);
        assert!(svc.descendants(&root, &a.id(), 5).unwrap().is_empty());
    }

    #[test]
    fn reduce_with_initial() {
        let (_node, svc, root) = setup();
        let v = svc
            .save(&root, &ActionObject::new(vec![1i64, 2, 3], WrapperType::new("ArrayObject")))
            .unwrap();
        let mut kwargs = Kwargs::new();
        kwargs.insert("initial".into(), Payload::Int(10));
        let out = svc.execute_with(&root, "sum", v.id(), &[], &kwargs).unwrap();
        assert_eq!(out.object().unwrap().data(), &Payload::Int(16));
    }

    // ----------------------------------------------------------------
    // permissions
    // ----------------------------------------------------------------

    #[test]
    fn read_only_credential_produces_no_object() {
        let (node, svc, root) = setup();
        let a = svc.save(&root, &int(2)).unwrap();
        let reader = VerifyKey::ephemeral();
        node.grant(reader, Role::data_scientist()).unwrap();

        assert!(matches!(
            svc.execute(&reader, "add", a.id(), &[3i64.into()]),
            Err(NodeError::Store(StoreError::PermissionDenied { .. }))
        ));
        assert_eq!(node.actions().base().len().unwrap(), 1);
        assert!(svc.descendants(&root, &a.id(), 1).unwrap().is_empty());
    }

    // ----------------------------------------------------------------
    // lineage
    // ----------------------------------------------------------------

    #[test]
    fn objects_stored_directly_are_adopted() {
        let (node, svc, root) = setup();
        let d = node.dispatcher();
        let a = int(4);
        let b = d.neg(&a).unwrap().into_objects().remove(0);
        node.actions().set(&root, &a).unwrap();
        node.actions().set(&root, &b).unwrap();

        let c = svc.execute(&root, "mul", b.id(), &[2i64.into()]).unwrap();
        let c = c.object().unwrap();
        assert_eq!(c.data(), &Payload::Int(-8));
        let path = svc.lineage_path(&root, &a.id(), &c.id()).unwrap().unwrap();
        let ids: Vec<Uid> = path.iter().map(|o| o.id()).collect();
        assert_eq!(ids, vec![a.id(), b.id(), c.id()]);
    }

    #[test]
    fn save_rejects_duplicates_and_unknown_parents() {
        let (node, svc, root) = setup();
        let a = svc.save(&root, &int(1)).unwrap();
        assert!(matches!(
            svc.save(&root, &a),
            Err(NodeError::Action(ActionError::DuplicateNode(id))) if id == a.id()
        ));

        let orphan = node.dispatcher().neg(&int(5)).unwrap().into_objects().remove(0);
        assert!(matches!(
            svc.save(&root, &orphan),
            Err(NodeError::Store(StoreError::NotFound { .. }))
        ));
        assert!(svc.get(&root, &orphan.id()).unwrap().is_none());
    }

    #[test]
    fn lineage_of_unknown_uid() {
        let (node, svc, root) = setup();
        assert!(matches!(
            svc.lineage(&root, &Uid::new(), 3),
            Err(NodeError::Store(StoreError::NotFound { .. }))
        ));

        // Stored, but never seen by the service.
        let loose = int(3);
        node.actions().set(&root, &loose).unwrap();
        assert!(matches!(
            svc.lineage(&root, &loose.id(), 3),
            Err(NodeError::Action(ActionError::NodeNotFound(_)))
        ));
    }

    #[test]
    fn lineage_requires_read_access() {
        let (node, svc, root) = setup();
        let x = svc.save(&root, &int(41)).unwrap();
        let z = svc.execute(&root, "add", x.id(), &[1i64.into()]).unwrap();
        let z = z.object().unwrap().id();

        let stranger = VerifyKey::ephemeral();
        let denied = |r: NodeResult<Vec<ActionObject>>| {
            matches!(r, Err(NodeError::Store(StoreError::PermissionDenied { .. })))
        };
        assert!(denied(svc.lineage(&stranger, &z, 5)));
        assert!(denied(svc.descendants(&stranger, &x.id(), 5)));
        assert!(matches!(
            svc.lineage_path(&stranger, &x.id(), &z),
            Err(NodeError::Store(StoreError::PermissionDenied { .. }))
        ));

        let reader = VerifyKey::ephemeral();
        node.grant(reader, Role::data_scientist()).unwrap();
        assert_eq!(svc.lineage(&reader, &z, 5).unwrap(), vec![x.clone()]);
        assert_eq!(svc.descendants(&reader, &x.id(), 5).unwrap()[0].data(), &Payload::Int(42));
    }

    #[test]
    fn deleted_objects_leave_lineage_results() {
        let (node, svc, root) = setup();
        let x = svc.save(&root, &int(41)).unwrap();
        let z = svc.execute(&root, "add", x.id(), &[1i64.into()]).unwrap();
        let z = z.object().unwrap().clone();

        svc.delete(&root, &x.id()).unwrap();
        assert!(svc.get(&root, &x.id()).unwrap().is_none());
        assert!(svc.lineage(&root, &z.id(), 5).unwrap().is_empty());
        assert_eq!(z.parents(), &[x.id()]);
        assert!(matches!(
            svc.descendants(&root, &x.id(), 5),
            Err(NodeError::Store(StoreError::NotFound { .. }))
        ));

        // Deleting through the stash directly has the same effect.
        let y = svc.save(&root, &int(7)).unwrap();
        let w = svc.execute(&root, "neg", y.id(), &[]).unwrap();
        let w = w.object().unwrap().id();
        node.actions().delete_by_uid(&root, &y.id()).unwrap();
        assert!(svc.lineage(&root, &w, 5).unwrap().is_empty());
    }
}
