//! mobsync-core - Core library for mobsync
//!
//! This crate contains the collection registry, change fingerprints, manifest
//! builder and snapshot/delta resolver that let mobile field clients keep a
//! local copy of contract-scoped reference data in sync with the server.

pub mod catalog;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{CollectionResponse, Manifest, SyncInstant, SyncMode, SyncScope};
pub use sync::{Registry, SyncEngine};
