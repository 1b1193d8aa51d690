//! Contract scoping for collection queries

use libsql::Value;

use crate::models::SyncScope;

/// SQL predicate restricting rows to the contracts in a scope
///
/// An empty contract set yields `1 = 0`, never an omitted filter: a caller
/// whose grants came back empty sees nothing rather than everything.
#[derive(Debug, Clone)]
pub struct ContractFilter {
    clause: String,
    params: Vec<Value>,
}

impl ContractFilter {
    /// Restrict `column` to the scope's contract ids
    ///
    /// `column` is interpolated verbatim and must be a trusted identifier
    /// (optionally table-qualified, e.g. `cm.contract_id`).
    pub fn for_scope(column: &str, scope: &SyncScope) -> Self {
        if scope.has_no_contracts() {
            return Self::none();
        }

        let placeholders = vec!["?"; scope.contract_ids.len()].join(", ");
        Self {
            clause: format!("{column} IN ({placeholders})"),
            params: scope
                .contract_ids
                .iter()
                .map(|id| Value::Integer(*id))
                .collect(),
        }
    }

    /// No restriction, for global reference data
    pub fn unrestricted() -> Self {
        Self {
            clause: "1 = 1".to_string(),
            params: Vec::new(),
        }
    }

    /// Matches no rows
    pub fn none() -> Self {
        Self {
            clause: "1 = 0".to_string(),
            params: Vec::new(),
        }
    }

    /// Predicate text with positional `?` placeholders
    pub fn clause(&self) -> &str {
        &self.clause
    }

    /// Values for the placeholders in [`clause`](Self::clause), in order
    pub fn params(&self) -> &[Value] {
        &self.params
    }
}
