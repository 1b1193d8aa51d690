//! Collection registry
//!
//! Built once at startup from a fixed list of specs and shared read-only by
//! every request. Misconfiguration (duplicate names, unsafe identifiers,
//! missing tables) fails here rather than on the first client pull.

use libsql::Connection;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::custom::{CustomCollection, CustomSpec};
use super::table::{TableCollection, TableSpec};
use crate::error::{Error, Result};
use crate::models::{DeltaResponse, DeltaWindow, SnapshotResponse, SyncInstant, SyncMode, SyncScope};

/// One entry of the static collection catalog
#[derive(Debug, Clone)]
pub enum CollectionSpec {
    Table(TableSpec),
    Custom(CustomSpec),
}

impl CollectionSpec {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Table(spec) => spec.name,
            Self::Custom(spec) => spec.name,
        }
    }
}

impl From<TableSpec> for CollectionSpec {
    fn from(spec: TableSpec) -> Self {
        Self::Table(spec)
    }
}

impl From<CustomSpec> for CollectionSpec {
    fn from(spec: CustomSpec) -> Self {
        Self::Custom(spec)
    }
}

enum Source {
    Table(TableCollection),
    Custom(Arc<dyn CustomCollection>),
}

/// A registered collection with a uniform etag/snapshot/delta surface
pub struct CollectionDefinition {
    name: &'static str,
    mode: SyncMode,
    source: Source,
}

impl std::fmt::Debug for CollectionDefinition {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.source {
            Source::Table(_) => "table",
            Source::Custom(_) => "custom",
        };
        formatter
            .debug_struct("CollectionDefinition")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("kind", &kind)
            .finish()
    }
}

impl CollectionDefinition {
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Fingerprint of this collection as seen by `scope`
    pub async fn compute_etag(&self, conn: &Connection, scope: &SyncScope) -> Result<String> {
        match &self.source {
            Source::Table(table) => Ok(table.fingerprint(conn, scope).await?.etag(self.mode)),
            Source::Custom(handler) => handler.compute_etag(conn, scope).await,
        }
    }

    /// Full live dataset; only snapshot collections expose this
    pub async fn snapshot(
        &self,
        conn: &Connection,
        scope: &SyncScope,
        server_time: SyncInstant,
    ) -> Result<SnapshotResponse> {
        self.expect_mode(SyncMode::Snapshot)?;

        let items = match &self.source {
            Source::Table(table) => table.live_rows(conn, scope).await?,
            Source::Custom(handler) => {
                let batch = handler.resolve(conn, scope, None).await?;
                if batch.deleted_ids.is_some() || batch.next_since.is_some() {
                    tracing::debug!(
                        collection = self.name,
                        "Ignoring delta fields returned by snapshot collection"
                    );
                }
                batch.items
            }
        };

        Ok(SnapshotResponse::new(server_time, items))
    }

    /// Changes within `window`; only delta collections expose this
    pub async fn delta(
        &self,
        conn: &Connection,
        scope: &SyncScope,
        window: DeltaWindow,
        server_time: SyncInstant,
    ) -> Result<DeltaResponse> {
        self.expect_mode(SyncMode::Delta)?;

        match &self.source {
            Source::Table(table) => {
                let items = table.changed_rows(conn, scope, window).await?;
                let deleted_ids = table.deleted_ids(conn, scope, window).await?;
                Ok(DeltaResponse {
                    server_time,
                    next_since: window.until,
                    items,
                    deleted_ids,
                })
            }
            Source::Custom(handler) => {
                let batch = handler.resolve(conn, scope, Some(window)).await?;
                let deleted_ids = batch.deleted_ids.ok_or(Error::ContractViolation {
                    collection: self.name.to_string(),
                    reason: "delta result is missing deletedIds",
                })?;
                let next_since = batch.next_since.ok_or(Error::ContractViolation {
                    collection: self.name.to_string(),
                    reason: "delta result is missing nextSince",
                })?;
                Ok(DeltaResponse {
                    server_time,
                    next_since,
                    items: batch.items,
                    deleted_ids,
                })
            }
        }
    }

    fn expect_mode(&self, requested: SyncMode) -> Result<()> {
        if self.mode == requested {
            Ok(())
        } else {
            Err(Error::ModeMismatch {
                collection: self.name.to_string(),
                mode: self.mode,
                requested,
            })
        }
    }
}

/// Immutable catalog of every sync-able collection
#[derive(Debug)]
pub struct Registry {
    definitions: Vec<CollectionDefinition>,
    by_name: HashMap<&'static str, usize>,
}

impl Registry {
    /// Validate specs and compile them into definitions
    ///
    /// Fails on the first duplicate name, naming it.
    pub fn build(specs: impl IntoIterator<Item = CollectionSpec>) -> Result<Self> {
        let mut definitions = Vec::new();
        let mut by_name = HashMap::new();

        for spec in specs {
            let name = spec.name();
            if !is_collection_name(name) {
                return Err(Error::Registry(format!(
                    "collection name `{name}` must be non-empty and use only letters, digits, `_` or `-`"
                )));
            }
            if by_name.contains_key(name) {
                return Err(Error::Registry(format!(
                    "duplicate collection name `{name}`"
                )));
            }

            let definition = match spec {
                CollectionSpec::Table(table) => {
                    table.validate()?;
                    CollectionDefinition {
                        name,
                        mode: table.mode,
                        source: Source::Table(TableCollection::new(table)),
                    }
                }
                CollectionSpec::Custom(custom) => CollectionDefinition {
                    name,
                    mode: custom.mode,
                    source: Source::Custom(custom.handler),
                },
            };

            by_name.insert(name, definitions.len());
            definitions.push(definition);
        }

        tracing::debug!(collections = definitions.len(), "Built collection registry");
        Ok(Self {
            definitions,
            by_name,
        })
    }

    /// Look up a collection by name
    pub fn get(&self, name: &str) -> Option<&CollectionDefinition> {
        self.by_name.get(name).map(|&idx| &self.definitions[idx])
    }

    /// Definitions in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CollectionDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Check every table collection against the live schema
    ///
    /// Run once at startup so a misspelled table or column stops the process
    /// instead of failing the first pull of that collection.
    pub async fn verify_schema(&self, conn: &Connection) -> Result<()> {
        for definition in &self.definitions {
            let Source::Table(table) = &definition.source else {
                continue;
            };
            let spec = table.spec();

            let mut rows = conn
                .query(&format!("PRAGMA table_info({})", spec.table), ())
                .await?;
            let mut present = HashSet::new();
            while let Some(row) = rows.next().await? {
                present.insert(row.get::<String>(1)?);
            }

            if present.is_empty() {
                return Err(Error::Registry(format!(
                    "collection `{}` refers to missing table `{}`",
                    spec.name, spec.table
                )));
            }
            if let Some(missing) = spec
                .required_columns()
                .into_iter()
                .find(|column| !present.contains(*column))
            {
                return Err(Error::Registry(format!(
                    "collection `{}` refers to missing column `{}.{missing}`",
                    spec.name, spec.table
                )));
            }
        }
        Ok(())
    }
}

fn is_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Record, SyncScope};
    use crate::sync::custom::CustomBatch;
    use crate::sync::table::Column;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    fn vehicles(name: &'static str, mode: SyncMode) -> CollectionSpec {
        TableSpec::new(name, "vehicles", mode)
            .columns([Column::integer("id"), Column::text("plate")])
            .into()
    }

    /// Custom collection returning a fixed, possibly incomplete, batch
    struct Fixed(CustomBatch);

    #[async_trait]
    impl CustomCollection for Fixed {
        async fn compute_etag(&self, _conn: &Connection, scope: &SyncScope) -> Result<String> {
            Ok(format!("fixed:{}", scope.contract_ids.len()))
        }

        async fn resolve(
            &self,
            _conn: &Connection,
            _scope: &SyncScope,
            _window: Option<DeltaWindow>,
        ) -> Result<CustomBatch> {
            Ok(self.0.clone())
        }
    }

    fn window() -> DeltaWindow {
        DeltaWindow {
            since: SyncInstant::EPOCH,
            until: SyncInstant::from_millis(1_000),
        }
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let err = Registry::build([
            vehicles("vehicles", SyncMode::Snapshot),
            vehicles("fleet", SyncMode::Snapshot),
            vehicles("vehicles", SyncMode::Delta),
        ])
        .unwrap_err();

        assert!(matches!(err, Error::Registry(_)));
        assert!(err.to_string().contains("duplicate collection name `vehicles`"));
    }

    #[test]
    fn test_duplicate_across_kinds_is_rejected() {
        let err = Registry::build([
            vehicles("vehicles", SyncMode::Snapshot),
            CustomSpec::new(
                "vehicles",
                SyncMode::Snapshot,
                Fixed(CustomBatch::default()),
            )
            .into(),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("`vehicles`"));
    }

    #[test]
    fn test_names_must_be_path_safe() {
        assert!(Registry::build([vehicles("", SyncMode::Snapshot)]).is_err());
        assert!(Registry::build([vehicles("a/b", SyncMode::Snapshot)]).is_err());
        assert!(Registry::build([vehicles("risk-templates", SyncMode::Snapshot)]).is_ok());
    }

    #[test]
    fn test_lookup_and_order() {
        let registry = Registry::build([
            vehicles("b", SyncMode::Snapshot),
            vehicles("a", SyncMode::Delta),
        ])
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
        assert_eq!(registry.get("a").unwrap().mode(), SyncMode::Delta);
        assert!(registry.get("c").is_none());
        let names: Vec<_> = registry.iter().map(CollectionDefinition::name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wrong_operation_is_a_mode_mismatch() {
        let db = Database::open_in_memory().await.unwrap();
        let registry = Registry::build([
            vehicles("snap", SyncMode::Snapshot),
            vehicles("delta", SyncMode::Delta),
        ])
        .unwrap();
        let scope = SyncScope::new("u", [1]);
        let now = SyncInstant::now();

        let err = registry
            .get("snap")
            .unwrap()
            .delta(db.connection(), &scope, window(), now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ModeMismatch {
                mode: SyncMode::Snapshot,
                requested: SyncMode::Delta,
                ..
            }
        ));

        let err = registry
            .get("delta")
            .unwrap()
            .snapshot(db.connection(), &scope, now)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ModeMismatch { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_custom_delta_missing_deleted_ids_is_fatal() {
        let db = Database::open_in_memory().await.unwrap();
        let registry = Registry::build([CollectionSpec::Custom(CustomSpec::new(
            "partial",
            SyncMode::Delta,
            Fixed(CustomBatch {
                items: vec![Record::new()],
                deleted_ids: None,
                next_since: Some(SyncInstant::from_millis(1_000)),
            }),
        ))])
        .unwrap();

        let err = registry
            .get("partial")
            .unwrap()
            .delta(db.connection(), &SyncScope::new("u", [1]), window(), SyncInstant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ContractViolation { .. }));
        assert!(err.to_string().contains("deletedIds"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_custom_delta_missing_next_since_is_fatal() {
        let db = Database::open_in_memory().await.unwrap();
        let registry = Registry::build([CollectionSpec::Custom(CustomSpec::new(
            "partial",
            SyncMode::Delta,
            Fixed(CustomBatch {
                items: Vec::new(),
                deleted_ids: Some(Vec::new()),
                next_since: None,
            }),
        ))])
        .unwrap();

        let err = registry
            .get("partial")
            .unwrap()
            .delta(db.connection(), &SyncScope::new("u", [1]), window(), SyncInstant::now())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nextSince"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_custom_complete_delta_passes_through() {
        let db = Database::open_in_memory().await.unwrap();
        let registry = Registry::build([CollectionSpec::Custom(CustomSpec::new(
            "complete",
            SyncMode::Delta,
            Fixed(CustomBatch::delta(
                Vec::new(),
                vec![7],
                SyncInstant::from_millis(1_000),
            )),
        ))])
        .unwrap();
        let definition = registry.get("complete").unwrap();
        let scope = SyncScope::new("u", [1, 2]);

        let delta = definition
            .delta(db.connection(), &scope, window(), SyncInstant::from_millis(5))
            .await
            .unwrap();
        assert_eq!(delta.deleted_ids, vec![7]);
        assert_eq!(delta.next_since, SyncInstant::from_millis(1_000));
        assert_eq!(
            definition.compute_etag(db.connection(), &scope).await.unwrap(),
            "fixed:2"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_verify_schema_accepts_migrated_tables() {
        let db = Database::open_in_memory().await.unwrap();
        let registry = Registry::build([vehicles("vehicles", SyncMode::Snapshot)]).unwrap();
        registry.verify_schema(db.connection()).await.unwrap();
    }

    async fn verify(spec: TableSpec) -> Result<()> {
        let db = Database::open_in_memory().await.unwrap();
        Registry::build([CollectionSpec::Table(spec)])
            .unwrap()
            .verify_schema(db.connection())
            .await
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_verify_schema_reports_missing_table_and_column() {
        let err = verify(
            TableSpec::new("x", "no_such_table", SyncMode::Snapshot).columns([Column::integer("id")]),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("missing table `no_such_table`"));

        let err = verify(
            TableSpec::new("x", "vehicles", SyncMode::Snapshot)
                .columns([Column::integer("id"), Column::text("colour")]),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("vehicles.colour"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_verify_schema_checks_global_opt_out() {
        // materials has no contract_id column; only valid when declared global
        let materials = TableSpec::new("materials", "materials", SyncMode::Snapshot)
            .columns([Column::integer("id")]);

        assert!(verify(materials.clone()).await.is_err());
        verify(materials.global()).await.unwrap();
    }
}
