//! Request-scoped entry points over a shared registry and database

use std::sync::Arc;

use super::manifest::{conditional_manifest, ManifestOutcome};
use super::registry::Registry;
use super::resolver::{resolve, ResolveParams};
use crate::db::Database;
use crate::error::Result;
use crate::models::{CollectionResponse, SyncScope};
use crate::util::user_fingerprint;

/// Stateless sync engine
///
/// Cloning is cheap; every clone shares the same registry and connection.
#[derive(Clone)]
pub struct SyncEngine {
    db: Arc<Database>,
    registry: Arc<Registry>,
}

impl SyncEngine {
    pub const fn new(db: Arc<Database>, registry: Arc<Registry>) -> Self {
        Self { db, registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Manifest for `scope`, or `NotModified` when `if_none_match` is current
    pub async fn manifest(
        &self,
        scope: &SyncScope,
        if_none_match: Option<&str>,
    ) -> Result<ManifestOutcome> {
        let outcome =
            conditional_manifest(&self.registry, self.db.connection(), scope, if_none_match)
                .await?;

        tracing::debug!(
            user = user_fingerprint(&scope.user_id),
            contracts = scope.contract_ids.len(),
            not_modified = matches!(outcome, ManifestOutcome::NotModified { .. }),
            "Built manifest"
        );
        Ok(outcome)
    }

    /// Snapshot or delta for one named collection
    pub async fn collection(
        &self,
        scope: &SyncScope,
        name: &str,
        params: &ResolveParams,
    ) -> Result<CollectionResponse> {
        let response = resolve(&self.registry, self.db.connection(), scope, name, params).await?;

        tracing::debug!(
            user = user_fingerprint(&scope.user_id),
            collection = name,
            mode = %response.mode(),
            items = response.items().len(),
            deleted = response.deleted_ids().len(),
            "Resolved collection"
        );
        Ok(response)
    }
}
