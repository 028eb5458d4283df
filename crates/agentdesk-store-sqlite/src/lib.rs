//! SQLite backend for the agentdesk agent/credential store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on dedicated threads
//! without blocking the async runtime. Ordinary calls share one connection;
//! every unit of work gets its own connection holding an immediate
//! transaction.

mod agents;
mod config;
mod credentials;
mod encode;
mod schema;
mod store;
mod suppliers;
mod tx;
mod users;

pub mod error;

pub use config::StoreConfig;
pub use error::{Error, ErrorKind, Result};
pub use store::SqliteStore;
pub use tx::Transaction;

/// The context type accepted by every [`SqliteStore`] operation.
pub type Ctx = agentdesk_core::Context<Transaction>;

#[cfg(test)]
mod tests;
