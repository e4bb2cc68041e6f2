//! Credential-checked document storage for Provenant.
//!
//! Documents are typed objects persisted in their canonical JSON form and
//! grouped into partitions, one partition per object kind. Each partition
//! declares a set of [`PartitionKey`]s; the store keeps a secondary index per
//! key so that [`QueryKeys`] requests resolve by set intersection instead of
//! scanning.
//!
//! # Storage Backends
//!
//! All backends implement the [`DocumentStore`] trait:
//!
//! - [`InMemoryDocumentStore`] -- `RwLock`-guarded partitions for tests and embedding
//!
//! # Design Rules
//!
//! 1. Every operation carries a [`VerifyKey`](prov_types::VerifyKey) and is
//!    checked against the store's [`PermissionPolicy`] before anything else.
//! 2. A UID is unique across the whole store, not just its partition.
//! 3. Validation happens before mutation: a failing `create` or `update`
//!    leaves the store exactly as it was.
//! 4. Index maintenance and the primary write happen under the same partition
//!    lock, so readers never see one without the other.
//! 5. Query results come back in partition insertion order.

pub mod descriptor;
pub mod document;
pub mod error;
pub mod keys;
pub mod memory;
pub mod partition;
pub mod policy;
pub mod traits;

pub use descriptor::{Described, Descriptor, FieldPolicy, FieldSpec};
pub use document::{Document, DocumentUpdate};
pub use error::{StoreError, StoreResult};
pub use keys::{KeyType, PartitionKey, QueryKey, QueryKeys, QueryValue};
pub use memory::InMemoryDocumentStore;
pub use partition::{Partition, PartitionSettings, Validator, validate_as};
pub use policy::{Access, AllowAll, PermissionPolicy, Role, RolePolicy};
pub use traits::DocumentStore;
