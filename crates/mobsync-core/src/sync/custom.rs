//! Custom collections backed by arbitrary joins or aggregates

use async_trait::async_trait;
use libsql::Connection;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{DeltaWindow, Record, SyncInstant, SyncMode, SyncScope};

/// Result of a custom resolver
///
/// Delta collections must fill both `deleted_ids` and `next_since`. Leaving
/// either as `None` is reported as a contract violation, never read as "nothing
/// was deleted".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomBatch {
    pub items: Vec<Record>,
    pub deleted_ids: Option<Vec<i64>>,
    pub next_since: Option<SyncInstant>,
}

impl CustomBatch {
    /// A snapshot result
    pub const fn snapshot(items: Vec<Record>) -> Self {
        Self {
            items,
            deleted_ids: None,
            next_since: None,
        }
    }

    /// A complete delta result
    pub const fn delta(items: Vec<Record>, deleted_ids: Vec<i64>, next_since: SyncInstant) -> Self {
        Self {
            items,
            deleted_ids: Some(deleted_ids),
            next_since: Some(next_since),
        }
    }
}

/// Etag and resolver logic for a collection that is not a single table
#[async_trait]
pub trait CustomCollection: Send + Sync {
    /// Fingerprint of the collection as seen by `scope`
    async fn compute_etag(&self, conn: &Connection, scope: &SyncScope) -> Result<String>;

    /// Items for `scope`; `window` is `None` for snapshot collections
    async fn resolve(
        &self,
        conn: &Connection,
        scope: &SyncScope,
        window: Option<DeltaWindow>,
    ) -> Result<CustomBatch>;
}

/// Registration entry for a custom collection
#[derive(Clone)]
pub struct CustomSpec {
    pub name: &'static str,
    pub mode: SyncMode,
    pub handler: Arc<dyn CustomCollection>,
}

impl CustomSpec {
    pub fn new(name: &'static str, mode: SyncMode, handler: impl CustomCollection + 'static) -> Self {
        Self {
            name,
            mode,
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for CustomSpec {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CustomSpec")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
