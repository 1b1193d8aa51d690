//! Team members, scoped through their team's contract

use async_trait::async_trait;
use libsql::Connection;

use crate::error::Result;
use crate::models::{DeltaWindow, SyncMode, SyncScope};
use crate::sync::{decode_row, Column, ContractFilter, CustomBatch, CustomCollection, Fingerprint};

const COLUMNS: [Column; 6] = [
    Column::integer("id"),
    Column::integer("team_id"),
    Column::integer("contract_id"),
    Column::text("name"),
    Column::text("role"),
    Column::timestamp("updated_at"),
];

/// Live members of live teams on the caller's contracts
///
/// Members have no contract column of their own. A member disappears when
/// the member or the team is deleted, so the etag folds in the team side.
#[derive(Debug, Default)]
pub struct TeamMembers;

impl TeamMembers {
    pub const MODE: SyncMode = SyncMode::Snapshot;
}

#[async_trait]
impl CustomCollection for TeamMembers {
    async fn compute_etag(&self, conn: &Connection, scope: &SyncScope) -> Result<String> {
        let filter = ContractFilter::for_scope("t.contract_id", scope);

        let members = Fingerprint::query(
            conn,
            &format!(
                "SELECT COUNT(CASE WHEN tm.deleted_at IS NULL AND t.deleted_at IS NULL THEN 1 END),
                        MAX(tm.updated_at)
                 FROM team_members tm JOIN teams t ON t.id = tm.team_id
                 WHERE {}",
                filter.clause()
            ),
            filter.params().to_vec(),
        )
        .await?;
        let teams = Fingerprint::query(
            conn,
            &format!(
                "SELECT COUNT(*), MAX(t.updated_at) FROM teams t WHERE {}",
                filter.clause()
            ),
            filter.params().to_vec(),
        )
        .await?;

        Ok(members.with_timestamps_of(teams).snapshot_etag())
    }

    async fn resolve(
        &self,
        conn: &Connection,
        scope: &SyncScope,
        _window: Option<DeltaWindow>,
    ) -> Result<CustomBatch> {
        let filter = ContractFilter::for_scope("t.contract_id", scope);
        let sql = format!(
            "SELECT tm.id, tm.team_id, t.contract_id, tm.name, tm.role, tm.updated_at
             FROM team_members tm JOIN teams t ON t.id = tm.team_id
             WHERE tm.deleted_at IS NULL AND t.deleted_at IS NULL AND {}
             ORDER BY tm.id",
            filter.clause()
        );

        let mut rows = conn.query(&sql, filter.params().to_vec()).await?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(decode_row(&COLUMNS, &row)?);
        }
        Ok(CustomBatch::snapshot(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::sync::testing::{insert_member, insert_team, soft_delete, touch};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn seeded() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        let conn = db.connection();
        insert_team(conn, 1, 10, "Linemen", 100).await;
        insert_team(conn, 2, 20, "Foreign", 100).await;
        insert_member(conn, 1, 1, "Ana", 100).await;
        insert_member(conn, 2, 1, "Bruno", 100).await;
        insert_member(conn, 3, 2, "Carla", 100).await;
        db
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_members_follow_team_contract() {
        let db = seeded().await;
        let batch = TeamMembers
            .resolve(db.connection(), &SyncScope::new("u", [10]), None)
            .await
            .unwrap();

        let names: Vec<_> = batch.items.iter().map(|item| item["name"].clone()).collect();
        assert_eq!(names, vec![json!("Ana"), json!("Bruno")]);
        assert_eq!(batch.items[0]["contract_id"], json!(10));
        assert_eq!(batch.deleted_ids, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deleted_team_hides_its_members() {
        let db = seeded().await;
        let conn = db.connection();
        let scope = SyncScope::new("u", [10]);
        let before = TeamMembers.compute_etag(conn, &scope).await.unwrap();

        soft_delete(conn, "teams", 1, 200).await;

        let batch = TeamMembers.resolve(conn, &scope, None).await.unwrap();
        assert!(batch.items.is_empty());
        assert_ne!(TeamMembers.compute_etag(conn, &scope).await.unwrap(), before);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_etag_tracks_member_and_team_edits() {
        let db = seeded().await;
        let conn = db.connection();
        let scope = SyncScope::new("u", [10]);

        let initial = TeamMembers.compute_etag(conn, &scope).await.unwrap();
        assert_eq!(initial, "c=2|u=1970-01-01T00:00:00.100Z");

        touch(conn, "teams", 1, 150).await;
        let team_edit = TeamMembers.compute_etag(conn, &scope).await.unwrap();
        assert_eq!(team_edit, "c=2|u=1970-01-01T00:00:00.150Z");

        soft_delete(conn, "team_members", 2, 300).await;
        let member_removed = TeamMembers.compute_etag(conn, &scope).await.unwrap();
        assert_eq!(member_removed, "c=1|u=1970-01-01T00:00:00.300Z");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_scope_sees_no_members() {
        let db = seeded().await;
        let conn = db.connection();
        let scope = SyncScope::new("u", []);

        assert!(TeamMembers.resolve(conn, &scope, None).await.unwrap().items.is_empty());
        assert_eq!(TeamMembers.compute_etag(conn, &scope).await.unwrap(), "c=0|u=");
    }
}
