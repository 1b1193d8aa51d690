//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Run a list of statements in one transaction
async fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    Ok(())
}

/// Migration to version 1: reference datasets and contract grants
///
/// Every synced table carries `updated_at` and a nullable `deleted_at` (unix
/// ms). Rows are soft-deleted so delta collections can report the deletion.
async fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS vehicles (
                id INTEGER PRIMARY KEY,
                contract_id INTEGER NOT NULL,
                plate TEXT NOT NULL,
                model TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_vehicles_contract_updated ON vehicles(contract_id, updated_at)",
            "CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY,
                contract_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                shift TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_teams_contract_updated ON teams(contract_id, updated_at)",
            "CREATE TABLE IF NOT EXISTS team_members (
                id INTEGER PRIMARY KEY,
                team_id INTEGER NOT NULL REFERENCES teams(id),
                name TEXT NOT NULL,
                role TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_team_members_team ON team_members(team_id)",
            "CREATE TABLE IF NOT EXISTS checklists (
                id INTEGER PRIMARY KEY,
                contract_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                category TEXT,
                questions TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_checklists_contract_updated ON checklists(contract_id, updated_at)",
            "CREATE TABLE IF NOT EXISTS risk_templates (
                id INTEGER PRIMARY KEY,
                contract_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                hazards TEXT NOT NULL DEFAULT '[]',
                revision INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_risk_templates_contract_updated ON risk_templates(contract_id, updated_at)",
            "CREATE TABLE IF NOT EXISTS materials (
                id INTEGER PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                unit TEXT NOT NULL,
                unit_price REAL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_materials_updated ON materials(updated_at)",
            "CREATE TABLE IF NOT EXISTS user_contracts (
                user_id TEXT NOT NULL,
                contract_id INTEGER NOT NULL,
                granted_at INTEGER NOT NULL,
                revoked_at INTEGER,
                PRIMARY KEY (user_id, contract_id)
            )",
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )
    .await?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: per-contract material enablement and deletion indexes
async fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS contract_materials (
                id INTEGER PRIMARY KEY,
                contract_id INTEGER NOT NULL,
                material_id INTEGER NOT NULL REFERENCES materials(id),
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_contract_materials_contract ON contract_materials(contract_id, material_id)",
            "CREATE INDEX IF NOT EXISTS idx_checklists_deleted ON checklists(contract_id, deleted_at)",
            "CREATE INDEX IF NOT EXISTS idx_risk_templates_deleted ON risk_templates(contract_id, deleted_at)",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )
    .await?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
