//! Query compiler
//!
//! Turns a schema model, mapped data, and query arguments into statements in
//! the ledger's SQL-like document query language, together with a parallel
//! list of binary-encoded parameters where the positional style is used.
//!
//! # Design Principles
//!
//! - Column order follows schema declaration order
//! - Reference fields compile to joins on the target's primary key
//! - String scalars embedded in statement text are always escaped
//! - An unfiltered DELETE or UPDATE is refused, never emitted
//! - History bounds in the future are rejected before any query is issued

mod args;
mod builder;
mod errors;
mod operators;

pub use args::{Condition, HistoryArgs, HistoryScope, OrderSpec, Predicate, QueryArgs, SortDirection};
pub use builder::{
    build_committed, build_delete, build_history, build_insert, build_select, build_update,
    build_where, document_value, Statement, UpdatePlan,
};
pub use errors::{QueryError, QueryResult};
pub use operators::Operator;
