//! Typed stashes over the Provenant document store.
//!
//! A stash binds one object kind to its partition and turns typed calls
//! into [`QueryKeys`](prov_store::QueryKeys) requests and document
//! encode/decode. Stashes hold nothing but a store handle.
//!
//! # Key Types
//!
//! - [`BaseUidStoreStash`] -- generic CRUD and query for any [`StashObject`]
//! - [`DatasetStash`] -- datasets by name and by referenced action object
//! - [`ActionObjectStash`] -- action objects by parent and by wrapper
//! - [`UserStash`] -- users by email and by verify key

pub mod action;
pub mod base;
pub mod dataset;
pub mod traits;
pub mod user;

pub use action::ActionObjectStash;
pub use base::BaseUidStoreStash;
pub use dataset::{Dataset, DatasetStash, DatasetUpdate};
pub use traits::{NoUpdate, StashObject, UpdateObject};
pub use user::{User, UserStash, UserUpdate};
