//! The lineage graph over action objects.
//!
//! [`LineageGraph`] holds only identities and edges: for each recorded UID
//! its parents, plus a forward-edge index (`children`) so descendant queries
//! do not scan. Payloads stay with whoever stores the objects; callers
//! resolve the UIDs returned here through that store.
//!
//! # Invariants
//!
//! - Every parent reference resolves to a recorded node.
//! - UIDs are unique within the graph.
//! - The graph is acyclic: an object can only name parents recorded before it.

use std::collections::{HashMap, HashSet, VecDeque};

use prov_types::Uid;
use tracing::debug;

use crate::error::{ActionError, ActionResult};
use crate::object::ActionObject;

#[derive(Clone, Debug, Default)]
pub struct LineageGraph {
    /// node -> parents, in derivation order.
    parents: HashMap<Uid, Vec<Uid>>,
    /// parent -> children, in recording order.
    children: HashMap<Uid, Vec<Uid>>,
    roots: Vec<Uid>,
}

impl LineageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn contains(&self, id: &Uid) -> bool {
        self.parents.contains_key(id)
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Check that `obj` could be recorded, without recording it.
    pub fn check(&self, obj: &ActionObject) -> ActionResult<()> {
        let id = obj.id();
        if self.parents.contains_key(&id) {
            return Err(ActionError::DuplicateNode(id));
        }
        if let Some(parent) = obj.parents().iter().find(|p| !self.parents.contains_key(p)) {
            return Err(ActionError::DanglingParent {
                node: id,
                parent: *parent,
            });
        }
        Ok(())
    }

    /// Record an object's identity and parent edges. Its parents must
    /// already be recorded.
    pub fn record(&mut self, obj: &ActionObject) -> ActionResult<()> {
        self.check(obj)?;
        let id = obj.id();

        for parent in obj.parents() {
            self.children.entry(*parent).or_default().push(id);
        }
        if obj.is_root() {
            self.roots.push(id);
        }

        debug!(node = %id.short_id(), parents = obj.parents().len(), "recorded lineage node");
        self.parents.insert(id, obj.parents().to_vec());
        Ok(())
    }

    /// Direct parents of `id`, or `None` if it was never recorded.
    pub fn parents_of(&self, id: &Uid) -> Option<&[Uid]> {
        self.parents.get(id).map(Vec::as_slice)
    }

    /// All root nodes, in recording order.
    pub fn roots(&self) -> &[Uid] {
        &self.roots
    }

    /// Nodes directly derived from `id`, in recording order.
    pub fn children_of(&self, id: &Uid) -> &[Uid] {
        self.children.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    // ---------------------------------------------------------------
    // Ancestor / Descendant queries
    // ---------------------------------------------------------------

    /// Ancestors of `id` up to `max_depth` levels, nearest first (BFS).
    ///
    /// The node itself is not included. Unknown UIDs are `NodeNotFound`.
    pub fn ancestors(&self, id: &Uid, max_depth: usize) -> ActionResult<Vec<Uid>> {
        let seed = self.parents.get(id).ok_or(ActionError::NodeNotFound(*id))?;
        Ok(self.walk(*id, seed, max_depth, |node| self.parents_of(node).unwrap_or_default()))
    }

    /// Descendants of `id` up to `max_depth` levels, nearest first (BFS).
    pub fn descendants(&self, id: &Uid, max_depth: usize) -> ActionResult<Vec<Uid>> {
        if !self.parents.contains_key(id) {
            return Err(ActionError::NodeNotFound(*id));
        }
        Ok(self.walk(*id, self.children_of(id), max_depth, |node| self.children_of(node)))
    }

    fn walk<'a>(
        &'a self,
        start: Uid,
        seed: &[Uid],
        max_depth: usize,
        next: impl Fn(&Uid) -> &'a [Uid],
    ) -> Vec<Uid> {
        let mut visited = HashSet::from([start]);
        let mut queue: VecDeque<(Uid, usize)> = VecDeque::new();
        for id in seed {
            if visited.insert(*id) {
                queue.push_back((*id, 1));
            }
        }

        let mut result = Vec::new();
        while let Some((current, depth)) = queue.pop_front() {
            if depth > max_depth {
                continue;
            }
            result.push(current);
            if depth < max_depth {
                for id in next(&current) {
                    if visited.insert(*id) {
                        queue.push_back((*id, depth + 1));
                    }
                }
            }
        }
        result
    }

    // ---------------------------------------------------------------
    // Path queries
    // ---------------------------------------------------------------

    /// Shortest derivation chain from `from` down to `to`, both included.
    ///
    /// Follows child edges only, so `Some` means `to` was derived from
    /// `from`. Returns `None` if either is unknown or no chain exists.
    pub fn lineage_path(&self, from: &Uid, to: &Uid) -> Option<Vec<Uid>> {
        if !self.parents.contains_key(from) || !self.parents.contains_key(to) {
            return None;
        }

        let mut predecessors: HashMap<Uid, Option<Uid>> = HashMap::from([(*from, None)]);
        let mut queue = VecDeque::from([*from]);
        while let Some(current) = queue.pop_front() {
            if current == *to {
                let mut path = Vec::new();
                let mut cursor = Some(*to);
                while let Some(id) = cursor {
                    path.push(id);
                    cursor = predecessors.get(&id).copied().flatten();
                }
                path.reverse();
                return Some(path);
            }
            for child in self.children_of(&current) {
                if !predecessors.contains_key(child) {
                    predecessors.insert(*child, Some(current));
                    queue.push_back(*child);
                }
            }
        }
        None
    }
}
