//! Action objects and provenance for Provenant.
//!
//! An [`ActionObject`] wraps an opaque [`Payload`] with a UID and the UIDs
//! of the objects it was computed from. Operations on action objects go
//! through an [`ActionDispatcher`], which unwraps the operands, hands the
//! work to a [`ComputeEngine`], and wraps every result with fresh identity
//! and lineage. A [`LineageGraph`] indexes the identities and parent edges
//! of recorded objects for ancestry and derivation queries.
//!
//! # Key Types
//!
//! - [`ActionObject`] -- immutable payload with identity and parents
//! - [`ActionDispatcher`] -- operation table plus the interception protocol
//! - [`ActionTypeRegistry`] -- payload kind to wrapper type mapping
//! - [`ComputeEngine`] / [`ElementwiseEngine`] -- computation seam and reference engine
//! - [`LineageGraph`] -- forward and backward lineage traversal
//!
//! # Design Rules
//!
//! 1. Action objects never change after construction.
//! 2. Unknown operation names fail before the engine is called.
//! 3. Engine failures produce no objects.
//! 4. Parents are listed in encounter order, each UID once.

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod lineage;
pub mod object;
pub mod payload;
pub mod registry;

pub use dispatch::{ActionDispatcher, ActionOutput, Operand, Produced};
pub use engine::{ComputeEngine, ElementwiseEngine, EngineOutput, Kwargs, Method};
pub use error::{ActionError, ActionResult, EngineError};
pub use lineage::LineageGraph;
pub use object::ActionObject;
pub use payload::{ArrayData, DType, NdArray, Payload, PayloadKind, Scalar};
pub use registry::{ActionTypeRegistry, WrapperType};
