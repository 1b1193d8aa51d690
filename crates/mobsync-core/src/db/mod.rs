//! Database layer for mobsync

mod connection;
mod grants;
mod migrations;

pub use connection::{Database, ReplicaConfig};
pub use grants::{ContractGrantRepository, LibSqlContractGrantRepository};
