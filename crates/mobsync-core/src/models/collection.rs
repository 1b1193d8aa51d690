//! Manifest and collection payload models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::SyncInstant;

/// One synced row, keyed by column name
pub type Record = serde_json::Map<String, serde_json::Value>;

/// How a collection is pulled by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Whole live dataset on every pull
    Snapshot,
    /// Changes and deletions inside a `(since, until]` window
    Delta,
}

impl SyncMode {
    /// Lowercase wire name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Delta => "delta",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A manifest line for one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub etag: String,
    pub mode: SyncMode,
}

/// Point-in-time index of every collection visible to a scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub server_time: SyncInstant,
    pub scope_hash: String,
    pub collections: BTreeMap<String, ManifestEntry>,
}

/// Half-open delta window `(since, until]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaWindow {
    pub since: SyncInstant,
    pub until: SyncInstant,
}

/// Full live state of a snapshot collection
///
/// `nextSince` is always `null` and `deletedIds` always empty: there is no
/// incremental protocol for snapshot collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub server_time: SyncInstant,
    next_since: Option<SyncInstant>,
    pub items: Vec<Record>,
    deleted_ids: Vec<i64>,
}

impl SnapshotResponse {
    pub const fn new(server_time: SyncInstant, items: Vec<Record>) -> Self {
        Self {
            server_time,
            next_since: None,
            items,
            deleted_ids: Vec::new(),
        }
    }
}

/// Upserts and deletions of a delta collection within one window
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaResponse {
    pub server_time: SyncInstant,
    /// Window end, to be sent back verbatim as the next `since`
    pub next_since: SyncInstant,
    pub items: Vec<Record>,
    pub deleted_ids: Vec<i64>,
}

/// Body of `GET /sync/collections/{name}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CollectionResponse {
    Snapshot(SnapshotResponse),
    Delta(DeltaResponse),
}

impl CollectionResponse {
    pub const fn mode(&self) -> SyncMode {
        match self {
            Self::Snapshot(_) => SyncMode::Snapshot,
            Self::Delta(_) => SyncMode::Delta,
        }
    }

    pub fn items(&self) -> &[Record] {
        match self {
            Self::Snapshot(snapshot) => &snapshot.items,
            Self::Delta(delta) => &delta.items,
        }
    }

    pub fn deleted_ids(&self) -> &[i64] {
        match self {
            Self::Snapshot(snapshot) => &snapshot.deleted_ids,
            Self::Delta(delta) => &delta.deleted_ids,
        }
    }

    pub const fn next_since(&self) -> Option<SyncInstant> {
        match self {
            Self::Snapshot(snapshot) => snapshot.next_since,
            Self::Delta(delta) => Some(delta.next_since),
        }
    }
}
