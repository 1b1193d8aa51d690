//! The reference datasets synced to field clients

mod contract_materials;
mod team_members;

pub use contract_materials::ContractMaterials;
pub use team_members::TeamMembers;

use crate::error::Result;
use crate::models::SyncMode;
use crate::sync::{CollectionSpec, Column, CustomSpec, Registry, TableSpec};

/// Every collection served by the API, in manifest order
pub fn default_specs() -> Vec<CollectionSpec> {
    vec![
        TableSpec::new("vehicles", "vehicles", SyncMode::Snapshot)
            .columns([
                Column::integer("id"),
                Column::integer("contract_id"),
                Column::text("plate"),
                Column::text("model"),
                Column::boolean("active"),
                Column::timestamp("updated_at"),
            ])
            .into(),
        TableSpec::new("teams", "teams", SyncMode::Snapshot)
            .columns([
                Column::integer("id"),
                Column::integer("contract_id"),
                Column::text("name"),
                Column::text("shift"),
                Column::timestamp("updated_at"),
            ])
            .into(),
        CustomSpec::new("team_members", TeamMembers::MODE, TeamMembers).into(),
        TableSpec::new("checklists", "checklists", SyncMode::Delta)
            .columns([
                Column::integer("id"),
                Column::integer("contract_id"),
                Column::text("title"),
                Column::text("category"),
                Column::json("questions"),
                Column::timestamp("updated_at"),
            ])
            .into(),
        TableSpec::new("risk_templates", "risk_templates", SyncMode::Delta)
            .columns([
                Column::integer("id"),
                Column::integer("contract_id"),
                Column::text("title"),
                Column::json("hazards"),
                Column::integer("revision"),
                Column::timestamp("updated_at"),
            ])
            .into(),
        TableSpec::new("materials", "materials", SyncMode::Snapshot)
            .global()
            .columns([
                Column::integer("id"),
                Column::text("code"),
                Column::text("description"),
                Column::text("unit"),
                Column::real("unit_price"),
                Column::timestamp("updated_at"),
            ])
            .into(),
        CustomSpec::new(
            "contract_materials",
            ContractMaterials::MODE,
            ContractMaterials,
        )
        .into(),
    ]
}

/// Registry over [`default_specs`]
pub fn default_registry() -> Result<Registry> {
    Registry::build(default_specs())
}
