//! Contract grant repository implementation

use crate::error::Result;
use libsql::Connection;

/// Trait for contract grant lookups (async)
#[allow(async_fn_in_trait)]
pub trait ContractGrantRepository {
    /// Contract ids currently granted to a user, ascending
    async fn contract_ids(&self, user_id: &str) -> Result<Vec<i64>>;
}

/// libSQL implementation of `ContractGrantRepository`
pub struct LibSqlContractGrantRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlContractGrantRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ContractGrantRepository for LibSqlContractGrantRepository<'_> {
    async fn contract_ids(&self, user_id: &str) -> Result<Vec<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT contract_id FROM user_contracts
                 WHERE user_id = ? AND revoked_at IS NULL
                 ORDER BY contract_id",
                [user_id],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<i64>(0)?);
        }
        Ok(ids)
    }
}
