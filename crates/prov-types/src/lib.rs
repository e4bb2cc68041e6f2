//! Foundation types for Provenant.
//!
//! This crate provides the identity and credential primitives shared by the
//! document store and the action-provenance layer. Every other Provenant
//! crate depends on `prov-types`.
//!
//! # Key Types
//!
//! - [`Uid`] -- Globally unique object identifier (UUID v7, time ordered)
//! - [`VerifyKey`] -- Opaque principal credential presented on store calls
//! - [`Timestamp`] -- Wall-clock milliseconds used for `created_at` fields

pub mod credential;
pub mod error;
pub mod temporal;
pub mod uid;

pub use credential::VerifyKey;
pub use error::TypeError;
pub use temporal::Timestamp;
pub use uid::Uid;
