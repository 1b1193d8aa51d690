//! Cheap change fingerprints for collections
//!
//! A fingerprint is built from aggregates only: the number of live rows, the
//! latest `updated_at` and, for delta collections, the latest `deleted_at`. An
//! insert moves the count and `updated_at`, an update moves `updated_at`, and a
//! soft delete moves the count and `deleted_at`. Full rows are never read.
//!
//! In both modes `updated_at` is taken over every row in scope, soft-deleted
//! ones included, while the count covers live rows only. A soft delete stamps
//! `updated_at` too, so retiring a row advances `u=` even for snapshot
//! collections, which carry no `d=` part.
//!
//! This is best-effort. A write that changes a row without advancing
//! `updated_at` (a raw SQL update bypassing the application's timestamp
//! handling) is invisible here and clients will keep their cached copy until
//! the next real change. The only failure mode is a false "unchanged".

use libsql::{Connection, Value};

use crate::error::{Error, Result};
use crate::models::{SyncInstant, SyncMode};

/// Aggregates standing in for the content of one collection under one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fingerprint {
    /// Live (not soft-deleted) rows
    pub count: i64,
    /// Latest `updated_at`, deleted rows included
    pub max_updated_at: Option<SyncInstant>,
    /// Latest `deleted_at`
    pub max_deleted_at: Option<SyncInstant>,
}

impl Fingerprint {
    /// Run an aggregate query returning `(count, max_updated_at[, max_deleted_at])`
    pub async fn query(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<Self> {
        let mut rows = conn.query(sql, params).await?;
        let Some(row) = rows.next().await? else {
            return Ok(Self::default());
        };

        let count = match row.get_value(0)? {
            Value::Integer(count) => count,
            Value::Null => 0,
            other => {
                return Err(Error::Database(format!(
                    "fingerprint count has unexpected type: {other:?}"
                )))
            }
        };
        let max_updated_at = optional_instant(row.get_value(1)?)?;
        let max_deleted_at = if row.column_count() > 2 {
            optional_instant(row.get_value(2)?)?
        } else {
            None
        };

        Ok(Self {
            count,
            max_updated_at,
            max_deleted_at,
        })
    }

    /// Fold in another source's timestamps, keeping this count
    ///
    /// Used by joined collections whose items change when either side changes.
    #[must_use]
    pub fn with_timestamps_of(self, other: Self) -> Self {
        Self {
            count: self.count,
            max_updated_at: self.max_updated_at.max(other.max_updated_at),
            max_deleted_at: self.max_deleted_at.max(other.max_deleted_at),
        }
    }

    /// `c={count}|u={maxUpdatedAt}`
    pub fn snapshot_etag(&self) -> String {
        format!("c={}|u={}", self.count, format_optional(self.max_updated_at))
    }

    /// `c={count}|u={maxUpdatedAt}|d={maxDeletedAt}`
    pub fn delta_etag(&self) -> String {
        format!(
            "c={}|u={}|d={}",
            self.count,
            format_optional(self.max_updated_at),
            format_optional(self.max_deleted_at)
        )
    }

    /// Etag in the shape used by the given mode
    pub fn etag(&self, mode: SyncMode) -> String {
        match mode {
            SyncMode::Snapshot => self.snapshot_etag(),
            SyncMode::Delta => self.delta_etag(),
        }
    }
}

fn optional_instant(value: Value) -> Result<Option<SyncInstant>> {
    match value {
        Value::Null => Ok(None),
        Value::Integer(millis) => Ok(Some(SyncInstant::from_millis(millis))),
        other => Err(Error::Database(format!(
            "fingerprint timestamp has unexpected type: {other:?}"
        ))),
    }
}

fn format_optional(instant: Option<SyncInstant>) -> String {
    instant.map(SyncInstant::to_rfc3339).unwrap_or_default()
}
