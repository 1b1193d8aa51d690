//! Table collections: one table, soft-deleted rows, filtered by contract

use libsql::{Connection, Row, Value};
use serde_json::Value as Json;

use super::filter::ContractFilter;
use super::fingerprint::Fingerprint;
use crate::error::{Error, Result};
use crate::models::{DeltaWindow, Record, SyncInstant, SyncMode, SyncScope};
use crate::util::is_sql_identifier;

/// Primary key column every table collection must have
pub const ID_COLUMN: &str = "id";
/// Last-modified column (unix ms)
pub const UPDATED_AT_COLUMN: &str = "updated_at";
/// Soft-delete column (unix ms, NULL when live)
pub const DELETED_AT_COLUMN: &str = "deleted_at";

/// How a stored column is rendered in synced items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    /// INTEGER 0/1 rendered as a JSON boolean
    Boolean,
    /// INTEGER unix ms rendered as an RFC 3339 string
    Timestamp,
    /// TEXT holding a JSON document, embedded as-is
    Json,
}

/// A column exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Integer,
        }
    }

    pub const fn real(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Real,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
        }
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Boolean,
        }
    }

    pub const fn timestamp(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Timestamp,
        }
    }

    pub const fn json(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Json,
        }
    }

    /// Render one stored value
    pub fn decode(&self, value: Value) -> Result<Json> {
        let mismatch = |value: &Value| {
            Error::Database(format!(
                "column `{}` holds {value:?}, expected {:?}",
                self.name, self.kind
            ))
        };

        match (self.kind, value) {
            (_, Value::Null) => Ok(Json::Null),
            (ColumnKind::Integer, Value::Integer(n)) => Ok(Json::from(n)),
            (ColumnKind::Real, Value::Real(f)) => {
                Ok(serde_json::Number::from_f64(f).map_or(Json::Null, Json::Number))
            }
            #[allow(clippy::cast_precision_loss)]
            (ColumnKind::Real, Value::Integer(n)) => Ok(Json::from(n as f64)),
            (ColumnKind::Text, Value::Text(s)) => Ok(Json::String(s)),
            (ColumnKind::Boolean, Value::Integer(n)) => Ok(Json::Bool(n != 0)),
            (ColumnKind::Timestamp, Value::Integer(ms)) => {
                Ok(Json::String(SyncInstant::from_millis(ms).to_rfc3339()))
            }
            (ColumnKind::Json, Value::Text(s)) => Ok(serde_json::from_str(&s)?),
            (_, other) => Err(mismatch(&other)),
        }
    }
}

/// Declarative description of a table collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub table: &'static str,
    pub mode: SyncMode,
    /// Contract column to filter on; `None` for global reference data
    pub contract_column: Option<&'static str>,
    pub columns: Vec<Column>,
}

impl TableSpec {
    /// A contract-scoped collection over `table`, filtered on `contract_id`
    pub const fn new(name: &'static str, table: &'static str, mode: SyncMode) -> Self {
        Self {
            name,
            table,
            mode,
            contract_column: Some("contract_id"),
            columns: Vec::new(),
        }
    }

    /// Opt out of contract filtering (every caller sees every row)
    #[must_use]
    pub fn global(mut self) -> Self {
        self.contract_column = None;
        self
    }

    /// Filter on a differently named contract column
    #[must_use]
    pub fn contract_column(mut self, column: &'static str) -> Self {
        self.contract_column = Some(column);
        self
    }

    /// Expose these columns, in this order
    #[must_use]
    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Columns that must exist in the table
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut required = vec![ID_COLUMN, UPDATED_AT_COLUMN, DELETED_AT_COLUMN];
        required.extend(self.contract_column);
        for column in &self.columns {
            if !required.contains(&column.name) {
                required.push(column.name);
            }
        }
        required
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let invalid = |what: &str, value: &str| {
            Error::Registry(format!(
                "collection `{}` has invalid {what} `{value}`",
                self.name
            ))
        };

        if !is_sql_identifier(self.table) {
            return Err(invalid("table name", self.table));
        }
        if let Some(column) = self.contract_column {
            if !is_sql_identifier(column) {
                return Err(invalid("contract column", column));
            }
        }
        if self.columns.is_empty() {
            return Err(Error::Registry(format!(
                "collection `{}` declares no columns",
                self.name
            )));
        }
        for column in &self.columns {
            if !is_sql_identifier(column.name) {
                return Err(invalid("column", column.name));
            }
        }
        if !self.columns.iter().any(|column| column.name == ID_COLUMN) {
            return Err(Error::Registry(format!(
                "collection `{}` must expose its `{ID_COLUMN}` column",
                self.name
            )));
        }
        Ok(())
    }
}

/// Compiled query set for one table spec
#[derive(Debug, Clone)]
pub(crate) struct TableCollection {
    spec: TableSpec,
    select_list: String,
}

impl TableCollection {
    pub(crate) fn new(spec: TableSpec) -> Self {
        let select_list = spec
            .columns
            .iter()
            .map(|column| column.name)
            .collect::<Vec<_>>()
            .join(", ");
        Self { spec, select_list }
    }

    pub(crate) const fn spec(&self) -> &TableSpec {
        &self.spec
    }

    fn filter(&self, scope: &SyncScope) -> ContractFilter {
        self.spec
            .contract_column
            .map_or_else(ContractFilter::unrestricted, |column| {
                ContractFilter::for_scope(column, scope)
            })
    }

    /// One aggregate query over the rows visible to `scope`
    pub(crate) async fn fingerprint(
        &self,
        conn: &Connection,
        scope: &SyncScope,
    ) -> Result<Fingerprint> {
        let filter = self.filter(scope);
        let table = self.spec.table;
        let sql = match self.spec.mode {
            SyncMode::Snapshot => format!(
                "SELECT COUNT(CASE WHEN {DELETED_AT_COLUMN} IS NULL THEN 1 END),
                        MAX({UPDATED_AT_COLUMN})
                 FROM {table} WHERE {}",
                filter.clause()
            ),
            SyncMode::Delta => format!(
                "SELECT COUNT(CASE WHEN {DELETED_AT_COLUMN} IS NULL THEN 1 END),
                        MAX({UPDATED_AT_COLUMN}), MAX({DELETED_AT_COLUMN})
                 FROM {table} WHERE {}",
                filter.clause()
            ),
        };
        Fingerprint::query(conn, &sql, filter.params().to_vec()).await
    }

    /// Every live row visible to `scope`, by id
    pub(crate) async fn live_rows(&self, conn: &Connection, scope: &SyncScope) -> Result<Vec<Record>> {
        let filter = self.filter(scope);
        let sql = format!(
            "SELECT {} FROM {} WHERE {DELETED_AT_COLUMN} IS NULL AND {} ORDER BY {ID_COLUMN}",
            self.select_list,
            self.spec.table,
            filter.clause()
        );
        self.fetch_records(conn, &sql, filter.params().to_vec())
            .await
    }

    /// Live rows whose `updated_at` falls in the window
    pub(crate) async fn changed_rows(
        &self,
        conn: &Connection,
        scope: &SyncScope,
        window: DeltaWindow,
    ) -> Result<Vec<Record>> {
        let filter = self.filter(scope);
        let sql = format!(
            "SELECT {} FROM {} WHERE {DELETED_AT_COLUMN} IS NULL
               AND {UPDATED_AT_COLUMN} > ? AND {UPDATED_AT_COLUMN} <= ? AND {}
             ORDER BY {ID_COLUMN}",
            self.select_list,
            self.spec.table,
            filter.clause()
        );
        self.fetch_records(conn, &sql, window_params(window, &filter))
            .await
    }

    /// Ids of rows whose `deleted_at` falls in the window
    pub(crate) async fn deleted_ids(
        &self,
        conn: &Connection,
        scope: &SyncScope,
        window: DeltaWindow,
    ) -> Result<Vec<i64>> {
        let filter = self.filter(scope);
        let sql = format!(
            "SELECT {ID_COLUMN} FROM {} WHERE {DELETED_AT_COLUMN} > ? AND {DELETED_AT_COLUMN} <= ? AND {}
             ORDER BY {ID_COLUMN}",
            self.spec.table,
            filter.clause()
        );
        let mut rows = conn.query(&sql, window_params(window, &filter)).await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<i64>(0)?);
        }
        Ok(ids)
    }

    async fn fetch_records(
        &self,
        conn: &Connection,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<Record>> {
        let mut rows = conn.query(sql, params).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(decode_row(&self.spec.columns, &row)?);
        }
        Ok(records)
    }
}

/// Decode a row whose select list matches `columns`
pub fn decode_row(columns: &[Column], row: &Row) -> Result<Record> {
    let mut record = Record::new();
    for (idx, column) in (0_i32..).zip(columns) {
        record.insert(column.name.to_string(), column.decode(row.get_value(idx)?)?);
    }
    Ok(record)
}

/// `[since, until, ..filter]` for queries shaped `x > ? AND x <= ? AND filter`
pub fn window_params(window: DeltaWindow, filter: &ContractFilter) -> Vec<Value> {
    let mut params = vec![
        Value::Integer(window.since.as_millis()),
        Value::Integer(window.until.as_millis()),
    ];
    params.extend_from_slice(filter.params());
    params
}
