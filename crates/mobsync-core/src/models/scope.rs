//! Caller identity and authorization boundary

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Who is syncing and which contracts they may see
///
/// Built per request by a [`ScopeResolver`](crate::sync::ScopeResolver). The
/// contract set is ordered so that anything derived from it (queries, hashes)
/// is independent of the order grants were listed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncScope {
    /// Authenticated user identifier
    pub user_id: String,
    /// Contracts the user is authorized to see
    pub contract_ids: BTreeSet<i64>,
}

impl SyncScope {
    /// Create a scope for the given user and contract grants
    pub fn new(user_id: impl Into<String>, contract_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            user_id: user_id.into(),
            contract_ids: contract_ids.into_iter().collect(),
        }
    }

    /// True when the user holds no contract grants at all
    pub fn has_no_contracts(&self) -> bool {
        self.contract_ids.is_empty()
    }

    /// Fingerprint of the effective permission set
    ///
    /// Changes whenever the user's contract grants change, so clients revisit
    /// every collection after a permission change even if no collection etag
    /// moved.
    #[must_use]
    pub fn scope_hash(&self) -> String {
        let contracts = self
            .contract_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let mut hasher = Sha256::new();
        hasher.update(self.user_id.as_bytes());
        hasher.update(b"\n");
        hasher.update(contracts.as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_hash_is_order_independent() {
        let a = SyncScope::new("7", [30, 10, 20]);
        let b = SyncScope::new("7", [10, 20, 30]);
        assert_eq!(a.scope_hash(), b.scope_hash());
    }

    #[test]
    fn test_scope_hash_tracks_contract_changes() {
        let a = SyncScope::new("7", [10]);
        let b = SyncScope::new("7", [10, 11]);
        let none = SyncScope::new("7", []);
        assert_ne!(a.scope_hash(), b.scope_hash());
        assert_ne!(a.scope_hash(), none.scope_hash());
    }

    #[test]
    fn test_scope_hash_tracks_user() {
        let a = SyncScope::new("7", [10]);
        let b = SyncScope::new("8", [10]);
        assert_ne!(a.scope_hash(), b.scope_hash());
    }

    #[test]
    fn test_scope_hash_has_no_ambiguous_concatenation() {
        let a = SyncScope::new("1", [23]);
        let b = SyncScope::new("12", [3]);
        assert_ne!(a.scope_hash(), b.scope_hash());
    }

    #[test]
    fn test_scope_hash_is_truncated_lowercase_sha256() {
        let hash = SyncScope::new("user", [1]).scope_hash();
        assert_eq!(hash, "acfc9b9adecb5bb62fc1c8ef69c03ccc");
    }

    #[test]
    fn test_duplicate_grants_collapse() {
        let scope = SyncScope::new("user", [5, 5, 5]);
        assert_eq!(scope.contract_ids.len(), 1);
        assert!(!scope.has_no_contracts());
    }
}
