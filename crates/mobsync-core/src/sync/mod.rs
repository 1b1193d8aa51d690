//! Sync engine: collection registry, fingerprints, manifests and resolution

mod custom;
mod engine;
mod filter;
mod fingerprint;
mod manifest;
mod registry;
mod resolver;
mod scope;
mod table;

#[cfg(test)]
pub(crate) mod testing;

pub use custom::{CustomBatch, CustomCollection, CustomSpec};
pub use engine::SyncEngine;
pub use filter::ContractFilter;
pub use fingerprint::Fingerprint;
pub use manifest::{build_manifest, conditional_manifest, manifest_etag, ManifestOutcome};
pub use registry::{CollectionDefinition, CollectionSpec, Registry};
pub use resolver::{resolve, ResolveParams};
pub use scope::{ContractGrantResolver, ScopeResolver};
pub use table::{
    decode_row, window_params, Column, ColumnKind, TableSpec, DELETED_AT_COLUMN, ID_COLUMN,
    UPDATED_AT_COLUMN,
};
