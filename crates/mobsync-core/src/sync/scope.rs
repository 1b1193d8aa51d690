//! Mapping an authenticated user to a sync scope

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::db::{ContractGrantRepository, Database, LibSqlContractGrantRepository};
use crate::error::Result;
use crate::models::SyncScope;
use crate::util::user_fingerprint;

/// Resolves which contracts an authenticated user may see
#[async_trait]
pub trait ScopeResolver: Send + Sync {
    async fn resolve(&self, user_id: &str) -> Result<SyncScope>;
}

/// Scope resolver backed by the `user_contracts` table
///
/// Grants are cached per user for `ttl`. A grant or revocation is therefore
/// visible after at most `ttl`; a zero `ttl` reads through on every call.
#[derive(Clone)]
pub struct ContractGrantResolver {
    db: Arc<Database>,
    ttl: Duration,
    cache: Arc<RwLock<HashMap<String, CachedGrants>>>,
}

#[derive(Debug, Clone)]
struct CachedGrants {
    contract_ids: Vec<i64>,
    fetched_at: Instant,
}

impl CachedGrants {
    fn is_stale(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }
}

impl ContractGrantResolver {
    pub fn new(db: Arc<Database>, ttl: Duration) -> Self {
        Self {
            db,
            ttl,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn cached(&self, user_id: &str) -> Option<Vec<i64>> {
        let cache = self.cache.read().await;
        cache
            .get(user_id)
            .filter(|entry| !entry.is_stale(self.ttl))
            .map(|entry| entry.contract_ids.clone())
    }
}

#[async_trait]
impl ScopeResolver for ContractGrantResolver {
    async fn resolve(&self, user_id: &str) -> Result<SyncScope> {
        if let Some(contract_ids) = self.cached(user_id).await {
            return Ok(SyncScope::new(user_id, contract_ids));
        }

        let contract_ids = LibSqlContractGrantRepository::new(self.db.connection())
            .contract_ids(user_id)
            .await?;
        tracing::debug!(
            user = user_fingerprint(user_id),
            contracts = contract_ids.len(),
            "Loaded contract grants"
        );

        if !self.ttl.is_zero() {
            let mut cache = self.cache.write().await;
            cache.retain(|_, entry| !entry.is_stale(self.ttl));
            cache.insert(
                user_id.to_string(),
                CachedGrants {
                    contract_ids: contract_ids.clone(),
                    fetched_at: Instant::now(),
                },
            );
        }

        Ok(SyncScope::new(user_id, contract_ids))
    }
}
