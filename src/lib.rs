//! ledgermap - schema-driven document mapper and query compiler for
//! append-only ledger document stores
//!
//! Given a declarative field schema and untyped input data, ledgermap
//! validates and coerces the data, resolves cross-table references, compiles
//! statements in the ledger's SQL-like query language, encodes values into
//! the store's self-describing binary format, and exposes CRUD plus
//! audit-history operations over an injected ledger service client.

pub mod client;
pub mod codec;
pub mod query;
pub mod repository;
pub mod schema;
