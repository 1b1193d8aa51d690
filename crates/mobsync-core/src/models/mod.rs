//! Data models for mobsync

mod collection;
mod instant;
mod scope;

pub use collection::{
    CollectionResponse, DeltaResponse, DeltaWindow, Manifest, ManifestEntry, Record,
    SnapshotResponse, SyncMode,
};
pub use instant::{InstantParseError, SyncInstant};
pub use scope::SyncScope;
