//! Error types for the action layer.

use prov_types::Uid;

use crate::payload::PayloadKind;
use crate::registry::WrapperType;

/// Errors raised by a [`ComputeEngine`](crate::engine::ComputeEngine).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine does not implement this operation.
    #[error("unknown engine operation: {0}")]
    UnknownOp(String),

    /// The operation exists but not with this method.
    #[error("operation '{op}' does not support method {method}")]
    UnsupportedMethod { op: String, method: String },

    /// Wrong number of positional arguments.
    #[error("operation '{op}' takes {expected} argument(s), got {actual}")]
    Arity {
        op: String,
        expected: usize,
        actual: usize,
    },

    /// Operand kind not accepted by the operation.
    #[error("operation '{op}' is not defined for {kind}")]
    UnsupportedType { op: String, kind: String },

    /// Array operands with different shapes.
    #[error("shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },

    #[error("division by zero")]
    DivisionByZero,

    /// Integer result out of range.
    #[error("integer overflow in '{0}'")]
    Overflow(String),

    #[error("unexpected keyword argument: {0}")]
    UnexpectedKwarg(String),

    /// Array data length disagrees with its shape.
    #[error("invalid array: {0}")]
    InvalidArray(String),
}

/// Errors from action dispatch, registry and lineage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The compute engine rejected the operation. Wraps the engine's error
    /// unchanged.
    #[error("computation failed: {0}")]
    ComputationFailure(#[from] EngineError),

    /// The operation name is not in the dispatch table.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A different wrapper is already registered for this payload kind.
    #[error("payload kind {kind} already registered as {existing}, refusing {requested}")]
    RegistryConflict {
        kind: PayloadKind,
        existing: WrapperType,
        requested: WrapperType,
    },

    /// An object with this UID is already in the lineage graph.
    #[error("duplicate lineage node: {0}")]
    DuplicateNode(Uid),

    /// A parent reference points to an object not in the lineage graph.
    #[error("dangling parent: {node} references missing parent {parent}")]
    DanglingParent { node: Uid, parent: Uid },

    #[error("lineage node not found: {0}")]
    NodeNotFound(Uid),
}

/// Result alias for action operations.
pub type ActionResult<T> = Result<T, ActionError>;
