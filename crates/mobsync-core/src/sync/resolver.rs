//! Snapshot/delta resolution for a single collection

use libsql::Connection;
use serde::Deserialize;

use super::registry::Registry;
use crate::error::{Error, Result};
use crate::models::{CollectionResponse, DeltaWindow, SyncInstant, SyncMode, SyncScope};

/// Raw `since`/`until` query parameters
///
/// Kept as strings so that a malformed value surfaces as a validation error
/// naming the parameter instead of a generic deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveParams {
    pub since: Option<String>,
    pub until: Option<String>,
}

impl ResolveParams {
    pub fn new(since: Option<&str>, until: Option<&str>) -> Self {
        Self {
            since: since.map(str::to_string),
            until: until.map(str::to_string),
        }
    }

    /// Turn the parameters into a window ending no later than `now`
    ///
    /// Missing or blank `since` is the epoch; missing or blank `until` is `now`.
    /// An `until` in the future is clamped to `now` so the returned cursor never
    /// runs ahead of rows that have yet to be written.
    pub fn window(&self, now: SyncInstant) -> Result<DeltaWindow> {
        let since = parse_param("since", self.since.as_deref())?.unwrap_or(SyncInstant::EPOCH);
        let until = parse_param("until", self.until.as_deref())?
            .map_or(now, |until| until.min(now));

        if since > until {
            return Err(Error::InvalidInput(format!(
                "`since` ({since}) is later than `until` ({until})"
            )));
        }
        Ok(DeltaWindow { since, until })
    }
}

fn parse_param(name: &str, raw: Option<&str>) -> Result<Option<SyncInstant>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|err| Error::InvalidInput(format!("invalid `{name}` parameter: {err}"))),
    }
}

/// Resolve one collection for `scope`
///
/// Snapshot collections ignore `params`; delta collections answer for the
/// `(since, until]` window and hand back `until` as the next cursor.
pub async fn resolve(
    registry: &Registry,
    conn: &Connection,
    scope: &SyncScope,
    name: &str,
    params: &ResolveParams,
) -> Result<CollectionResponse> {
    let definition = registry
        .get(name)
        .ok_or_else(|| Error::NotFound(name.to_string()))?;
    let server_time = SyncInstant::now();

    match definition.mode() {
        SyncMode::Snapshot => definition
            .snapshot(conn, scope, server_time)
            .await
            .map(CollectionResponse::Snapshot),
        SyncMode::Delta => {
            let window = params.window(server_time)?;
            definition
                .delta(conn, scope, window, server_time)
                .await
                .map(CollectionResponse::Delta)
        }
    }
}
