//! Manifest construction and conditional requests

use futures::future::try_join_all;
use libsql::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::registry::Registry;
use crate::error::Result;
use crate::models::{Manifest, ManifestEntry, SyncInstant, SyncScope};

/// Result of a conditional manifest request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestOutcome {
    /// The client's copy is stale (or it had none)
    Modified { manifest: Manifest, etag: String },
    /// `If-None-Match` matched; no body is sent
    NotModified { etag: String },
}

impl ManifestOutcome {
    /// Etag of the fresh manifest, for the `ETag` response header
    pub fn etag(&self) -> &str {
        match self {
            Self::Modified { etag, .. } | Self::NotModified { etag } => etag,
        }
    }
}

/// The parts of a manifest that identify its content
///
/// `serverTime` is left out; it changes on every call and would make every
/// manifest distinct.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestIdentity<'a> {
    scope_hash: &'a str,
    collections: &'a BTreeMap<String, ManifestEntry>,
}

/// Quoted ETag over the manifest's scope hash and collection etags
pub fn manifest_etag(manifest: &Manifest) -> Result<String> {
    let identity = ManifestIdentity {
        scope_hash: &manifest.scope_hash,
        collections: &manifest.collections,
    };
    let digest = Sha256::digest(serde_json::to_vec(&identity)?);
    Ok(format!("\"{}\"", hex::encode(&digest[..16])))
}

/// Compute every collection etag for `scope`, concurrently
pub async fn build_manifest(
    registry: &Registry,
    conn: &Connection,
    scope: &SyncScope,
) -> Result<(Manifest, String)> {
    let etags = try_join_all(registry.iter().map(|definition| async move {
        let etag = definition.compute_etag(conn, scope).await?;
        Ok::<_, crate::error::Error>(ManifestEntry {
            name: definition.name().to_string(),
            etag,
            mode: definition.mode(),
        })
    }))
    .await?;

    let manifest = Manifest {
        server_time: SyncInstant::now(),
        scope_hash: scope.scope_hash(),
        collections: etags
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect(),
    };
    let etag = manifest_etag(&manifest)?;
    Ok((manifest, etag))
}

/// Build the manifest and compare it against the client's `If-None-Match`
///
/// Only an exact match short-circuits; weak validators and `*` are not
/// recognized.
pub async fn conditional_manifest(
    registry: &Registry,
    conn: &Connection,
    scope: &SyncScope,
    if_none_match: Option<&str>,
) -> Result<ManifestOutcome> {
    let (manifest, etag) = build_manifest(registry, conn, scope).await?;

    if if_none_match.is_some_and(|candidate| candidate.trim() == etag) {
        return Ok(ManifestOutcome::NotModified { etag });
    }
    Ok(ManifestOutcome::Modified { manifest, etag })
}
