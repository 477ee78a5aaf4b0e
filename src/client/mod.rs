//! Ledger service client collaborator
//!
//! The repository never talks to the network itself; it hands compiled
//! statement text and binary-encoded parameters to a `LedgerClient`
//! implementation. Session and transaction lifecycle, retry, and timeouts
//! are the client's concern — every `execute` call runs inside one
//! short-lived session/transaction scoped by the implementation.
//!
//! # Design Principles
//!
//! - Object-safe async trait, injectable and mockable
//! - Rows travel as binary-encoded value trees, both directions
//! - The table-name catalog is cached per connection, explicitly refreshable
//! - No retry layer here beyond whatever the client performs

mod connection;
mod errors;
mod stub;

pub use connection::Connection;
pub use errors::{ClientError, ClientResult};
pub use stub::{ExecutedStatement, StubLedger};

use async_trait::async_trait;

/// Contract required from the ledger service driver.
///
/// `execute` runs one statement in one session-scoped transaction and
/// returns the ordered result rows, each a binary-encoded value tree.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Executes a statement with positional binary-encoded parameters
    async fn execute(&self, statement: &str, params: &[Vec<u8>]) -> ClientResult<Vec<Vec<u8>>>;

    /// Lists the tables known to the ledger
    async fn table_names(&self) -> ClientResult<Vec<String>>;

    /// Creates a table
    async fn create_table(&self, name: &str) -> ClientResult<()>;

    /// Ensures a secondary index exists for the field
    async fn create_index(&self, table: &str, field: &str) -> ClientResult<()>;
}
