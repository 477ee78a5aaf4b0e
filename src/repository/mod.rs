//! Ledger document repository
//!
//! One repository per logical table. It orchestrates the mapper, the query
//! compiler, the value codec, and the ledger client for CRUD, committed-data
//! lookups, and audit-history queries.
//!
//! # Design Principles
//!
//! - Each compiled statement runs in its own short-lived transaction
//! - Multi-statement calls (cascades, reference inserts) are independent
//!   transactions: no cross-statement atomicity, by design
//! - Ordering and pagination are client-side emulations over the full
//!   materialized result set, unsuitable for large tables
//! - Repository methods share no mutable state beyond the connection's
//!   table catalog

mod errors;
mod record;
mod repository;
mod shaping;

pub use errors::{RepositoryError, RepositoryResult};
pub use record::{DocumentRecord, RevisionMetadata};
pub use repository::{Repository, RepositoryOptions};
pub use shaping::shape_results;
