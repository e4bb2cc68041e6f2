//! Operator interception over action objects.
//!
//! [`ActionDispatcher::apply`] runs one intercepted operation:
//!
//! 1. unwrap every action-object operand to its payload,
//! 2. hand the operation to the [`ComputeEngine`],
//! 3. wrap each result element in a new [`ActionObject`] using the wrapper
//!    registered for its kind (unregistered kinds come back raw),
//! 4. give every new object the UIDs of the primary and each action-object
//!    operand, in encounter order with duplicates collapsed, as parents.

use std::collections::HashMap;
use std::sync::Arc;

use prov_types::Uid;
use tracing::debug;

use crate::engine::{ComputeEngine, ElementwiseEngine, EngineOutput, Kwargs, Method};
use crate::error::{ActionError, ActionResult};
use crate::object::ActionObject;
use crate::payload::Payload;
use crate::registry::ActionTypeRegistry;

/// A non-primary argument to an intercepted operation.
#[derive(Clone, Debug)]
pub enum Operand<'a> {
    Action(&'a ActionObject),
    Raw(Payload),
}

impl<'a> From<&'a ActionObject> for Operand<'a> {
    fn from(obj: &'a ActionObject) -> Self {
        Self::Action(obj)
    }
}

impl From<Payload> for Operand<'_> {
    fn from(payload: Payload) -> Self {
        Self::Raw(payload)
    }
}

impl From<i64> for Operand<'_> {
    fn from(n: i64) -> Self {
        Self::Raw(Payload::Int(n))
    }
}

impl From<f64> for Operand<'_> {
    fn from(x: f64) -> Self {
        Self::Raw(Payload::Float(x))
    }
}

/// One element of a dispatch result.
#[derive(Clone, Debug, PartialEq)]
pub enum Produced {
    /// Wrapped in a new action object.
    Action(ActionObject),
    /// No wrapper registered for the payload kind.
    Raw(Payload),
}

impl Produced {
    pub fn as_action(&self) -> Option<&ActionObject> {
        match self {
            Self::Action(obj) => Some(obj),
            Self::Raw(_) => None,
        }
    }

    pub fn payload(&self) -> &Payload {
        match self {
            Self::Action(obj) => obj.data(),
            Self::Raw(p) => p,
        }
    }
}

/// Result of an intercepted operation, mirroring [`EngineOutput`].
#[derive(Clone, Debug, PartialEq)]
pub enum ActionOutput {
    Single(Produced),
    Tuple(Vec<Produced>),
}

impl ActionOutput {
    /// Every produced element in order.
    pub fn elements(&self) -> Vec<&Produced> {
        match self {
            Self::Single(p) => vec![p],
            Self::Tuple(ps) => ps.iter().collect(),
        }
    }

    /// The action objects among the produced elements.
    pub fn objects(&self) -> Vec<&ActionObject> {
        self.elements()
            .into_iter()
            .filter_map(Produced::as_action)
            .collect()
    }

    pub fn into_objects(self) -> Vec<ActionObject> {
        let elements = match self {
            Self::Single(p) => vec![p],
            Self::Tuple(ps) => ps,
        };
        elements
            .into_iter()
            .filter_map(|p| match p {
                Produced::Action(obj) => Some(obj),
                Produced::Raw(_) => None,
            })
            .collect()
    }

    /// The single action object of a non-tuple result.
    pub fn object(&self) -> Option<&ActionObject> {
        match self {
            Self::Single(p) => p.as_action(),
            Self::Tuple(_) => None,
        }
    }
}

/// Maps operation names to engine operations and applies them.
pub struct ActionDispatcher {
    engine: Arc<dyn ComputeEngine>,
    registry: Arc<ActionTypeRegistry>,
    table: HashMap<String, (String, Method)>,
}

impl ActionDispatcher {
    /// A dispatcher with the standard operation table.
    pub fn new(engine: Arc<dyn ComputeEngine>, registry: Arc<ActionTypeRegistry>) -> Self {
        let mut dispatcher = Self {
            engine,
            registry,
            table: HashMap::new(),
        };
        for (name, op, method) in [
            ("add", "add", Method::Call),
            ("sub", "subtract", Method::Call),
            ("mul", "multiply", Method::Call),
            ("div", "divide", Method::Call),
            ("neg", "negative", Method::Call),
            ("eq", "equal", Method::Call),
            ("divmod", "divmod", Method::Call),
            ("sum", "add", Method::Reduce),
        ] {
            dispatcher = dispatcher.with_operation(name, op, method);
        }
        dispatcher
    }

    /// The reference engine with the process-wide registry.
    pub fn reference() -> Self {
        Self::new(Arc::new(ElementwiseEngine), ActionTypeRegistry::global())
    }

    /// Add or replace a dispatch-table entry.
    pub fn with_operation(mut self, name: &str, engine_op: &str, method: Method) -> Self {
        self.table
            .insert(name.to_string(), (engine_op.to_string(), method));
        self
    }

    pub fn registry(&self) -> &Arc<ActionTypeRegistry> {
        &self.registry
    }

    pub fn supports(&self, op: &str) -> bool {
        self.table.contains_key(op)
    }

    /// Operation names in the dispatch table, sorted.
    pub fn operations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.table.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run an intercepted operation.
    pub fn apply(
        &self,
        op: &str,
        primary: &ActionObject,
        operands: &[Operand<'_>],
        kwargs: &Kwargs,
    ) -> ActionResult<ActionOutput> {
        let (engine_op, method) = self
            .table
            .get(op)
            .ok_or_else(|| ActionError::UnsupportedOperation(op.to_string()))?;

        let mut args = Vec::with_capacity(operands.len() + 1);
        args.push(primary.data().clone());
        let mut parents = vec![primary.id()];
        for operand in operands {
            match operand {
                Operand::Action(obj) => {
                    args.push(obj.data().clone());
                    if !parents.contains(&obj.id()) {
                        parents.push(obj.id());
                    }
                }
                Operand::Raw(payload) => args.push(payload.clone()),
            }
        }

        let output = self.engine.dispatch(engine_op, *method, &args, kwargs)?;
        let output = match output {
            EngineOutput::Single(p) => ActionOutput::Single(self.wrap(p, &parents)),
            EngineOutput::Tuple(ps) => ActionOutput::Tuple(
                ps.into_iter().map(|p| self.wrap(p, &parents)).collect(),
            ),
        };

        debug!(
            op,
            primary = %primary.id().short_id(),
            parents = parents.len(),
            produced = output.objects().len(),
            "applied action"
        );
        Ok(output)
    }

    fn wrap(&self, payload: Payload, parents: &[Uid]) -> Produced {
        match self.registry.resolve(payload.kind()) {
            Some(wrapper) => Produced::Action(ActionObject::derived(payload, wrapper, parents.to_vec())),
            None => Produced::Raw(payload),
        }
    }

    fn apply_binary(&self, op: &str, lhs: &ActionObject, rhs: Operand<'_>) -> ActionResult<ActionOutput> {
        self.apply(op, lhs, &[rhs], &Kwargs::new())
    }

    // ---------------------------------------------------------------
    // Convenience operators
    // ---------------------------------------------------------------

    pub fn add<'a>(&self, lhs: &ActionObject, rhs: impl Into<Operand<'a>>) -> ActionResult<ActionOutput> {
        self.apply_binary("add", lhs, rhs.into())
    }

    pub fn sub<'a>(&self, lhs: &ActionObject, rhs: impl Into<Operand<'a>>) -> ActionResult<ActionOutput> {
        self.apply_binary("sub", lhs, rhs.into())
    }

    pub fn mul<'a>(&self, lhs: &ActionObject, rhs: impl Into<Operand<'a>>) -> ActionResult<ActionOutput> {
        self.apply_binary("mul", lhs, rhs.into())
    }

    pub fn div<'a>(&self, lhs: &ActionObject, rhs: impl Into<Operand<'a>>) -> ActionResult<ActionOutput> {
        self.apply_binary("div", lhs, rhs.into())
    }

    pub fn eq<'a>(&self, lhs: &ActionObject, rhs: impl Into<Operand<'a>>) -> ActionResult<ActionOutput> {
        self.apply_binary("eq", lhs, rhs.into())
    }

    pub fn divmod<'a>(&self, lhs: &ActionObject, rhs: impl Into<Operand<'a>>) -> ActionResult<ActionOutput> {
        self.apply_binary("divmod", lhs, rhs.into())
    }

    pub fn neg(&self, value: &ActionObject) -> ActionResult<ActionOutput> {
        self.apply("neg", value, &[], &Kwargs::new())
    }

    pub fn sum(&self, value: &ActionObject) -> ActionResult<ActionOutput> {
        self.apply("sum", value, &[], &Kwargs::new())
    }
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("operations", &self.operations())
            .finish()
    }
}
