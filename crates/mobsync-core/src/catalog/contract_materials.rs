//! Materials enabled on the caller's contracts

use async_trait::async_trait;
use libsql::{Connection, Value};

use crate::error::Result;
use crate::models::{DeltaWindow, SyncInstant, SyncMode, SyncScope};
use crate::sync::{decode_row, Column, ContractFilter, CustomBatch, CustomCollection, Fingerprint};

const COLUMNS: [Column; 6] = [
    Column::integer("id"),
    Column::text("code"),
    Column::text("description"),
    Column::text("unit"),
    Column::real("unit_price"),
    Column::timestamp("updated_at"),
];

/// Catalog materials joined through `contract_materials`
///
/// Items are material rows, one per material even when several of the
/// caller's contracts enable it. A material enters the delta when the
/// material itself changes or a link to it is created in the window. It is
/// reported deleted when a link or the material is deleted in the window and
/// no live link on the caller's contracts remains.
///
/// The "no live link remains" check reads current state, not state as of
/// `until`. Replaying an older window after a later unlink can therefore
/// repeat an id in `deletedIds`; clients apply deletions idempotently.
#[derive(Debug, Default)]
pub struct ContractMaterials;

impl ContractMaterials {
    pub const MODE: SyncMode = SyncMode::Delta;
}

fn window_values(window: DeltaWindow) -> [Value; 2] {
    [
        Value::Integer(window.since.as_millis()),
        Value::Integer(window.until.as_millis()),
    ]
}

#[async_trait]
impl CustomCollection for ContractMaterials {
    async fn compute_etag(&self, conn: &Connection, scope: &SyncScope) -> Result<String> {
        let filter = ContractFilter::for_scope("cm.contract_id", scope);

        let links = Fingerprint::query(
            conn,
            &format!(
                "SELECT COUNT(DISTINCT CASE WHEN cm.deleted_at IS NULL AND m.deleted_at IS NULL
                                            THEN m.id END),
                        MAX(cm.updated_at), MAX(cm.deleted_at)
                 FROM contract_materials cm JOIN materials m ON m.id = cm.material_id
                 WHERE {}",
                filter.clause()
            ),
            filter.params().to_vec(),
        )
        .await?;
        let materials = Fingerprint::query(
            conn,
            &format!(
                "SELECT COUNT(*), MAX(m.updated_at), MAX(m.deleted_at)
                 FROM materials m
                 WHERE EXISTS (SELECT 1 FROM contract_materials cm
                               WHERE cm.material_id = m.id AND {})",
                filter.clause()
            ),
            filter.params().to_vec(),
        )
        .await?;

        Ok(links.with_timestamps_of(materials).delta_etag())
    }

    async fn resolve(
        &self,
        conn: &Connection,
        scope: &SyncScope,
        window: Option<DeltaWindow>,
    ) -> Result<CustomBatch> {
        let window = window.unwrap_or(DeltaWindow {
            since: SyncInstant::EPOCH,
            until: SyncInstant::now(),
        });
        let filter = ContractFilter::for_scope("cm.contract_id", scope);
        let live_filter = ContractFilter::for_scope("live.contract_id", scope);

        let upsert_sql = format!(
            "SELECT DISTINCT m.id, m.code, m.description, m.unit, m.unit_price, m.updated_at
             FROM materials m JOIN contract_materials cm ON cm.material_id = m.id
             WHERE m.deleted_at IS NULL AND cm.deleted_at IS NULL AND {}
               AND ((m.updated_at > ? AND m.updated_at <= ?)
                 OR (cm.updated_at > ? AND cm.updated_at <= ?))
             ORDER BY m.id",
            filter.clause()
        );
        let mut params = filter.params().to_vec();
        params.extend(window_values(window));
        params.extend(window_values(window));

        let mut rows = conn.query(&upsert_sql, params).await?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(decode_row(&COLUMNS, &row)?);
        }

        let deleted_sql = format!(
            "SELECT DISTINCT cm.material_id
             FROM contract_materials cm JOIN materials m ON m.id = cm.material_id
             WHERE {}
               AND ((cm.deleted_at > ? AND cm.deleted_at <= ?)
                 OR (m.deleted_at > ? AND m.deleted_at <= ?))
               AND NOT EXISTS (
                   SELECT 1 FROM contract_materials live
                   JOIN materials lm ON lm.id = live.material_id
                   WHERE live.material_id = cm.material_id
                     AND live.deleted_at IS NULL AND lm.deleted_at IS NULL AND {})
             ORDER BY cm.material_id",
            filter.clause(),
            live_filter.clause()
        );
        let mut params = filter.params().to_vec();
        params.extend(window_values(window));
        params.extend(window_values(window));
        params.extend_from_slice(live_filter.params());

        let mut rows = conn.query(&deleted_sql, params).await?;
        let mut deleted_ids = Vec::new();
        while let Some(row) = rows.next().await? {
            deleted_ids.push(row.get::<i64>(0)?);
        }

        Ok(CustomBatch::delta(items, deleted_ids, window.until))
    }
}
