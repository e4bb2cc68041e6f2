//! Embeddable Provenant node.
//!
//! A [`Node`] wires the document store, its permission policy, the typed
//! stashes, and the action dispatcher into one value built from a
//! [`NodeConfig`]. [`ActionService`] runs operations over stored action
//! objects, persists what they produce, and answers lineage queries.
//!
//! # Key Types
//!
//! - [`Node`] -- owner of the store, stashes, dispatcher and lineage graph
//! - [`NodeConfig`] -- TOML-loadable configuration, every field defaulted
//! - [`ActionService`] -- execute, save and lineage over the action stash
//!
//! # Logging
//!
//! The library crates only emit `tracing` events. Call [`telemetry::init`]
//! once to print them; `PROV_LOG` overrides the configured level.

pub mod config;
pub mod error;
pub mod node;
pub mod service;
pub mod telemetry;

pub use config::{LogConfig, NodeConfig, PolicyKind, RegistryConfig};
pub use error::{NodeError, NodeResult};
pub use node::Node;
pub use service::{ActionService, Input};
