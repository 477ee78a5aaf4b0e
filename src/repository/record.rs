//! Result record types for committed-view and history queries
//!
//! The committed view and the history function both project full revisions:
//! store-assigned metadata, the block address and hash proving the revision,
//! and the document data itself. Revisions are immutable once committed;
//! updates and deletes create new revisions and tombstones, and the
//! committed view exposes every revision ever written.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::codec::Value;

use super::errors::{RepositoryError, RepositoryResult};

/// Store-assigned revision metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionMetadata {
    /// Store-assigned document identifier
    pub id: String,
    /// Revision number, starting at 0
    pub version: i64,
    /// Transaction that committed the revision
    pub tx_id: String,
    /// Commit time of the transaction
    pub tx_time: Option<DateTime<Utc>>,
}

/// One committed revision of a document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    /// Store-assigned metadata
    pub metadata: RevisionMetadata,
    /// Address of the block holding the revision
    pub block_address: serde_json::Value,
    /// Revision hash
    pub hash: serde_json::Value,
    /// Document data; empty for tombstones
    pub data: serde_json::Value,
}

impl DocumentRecord {
    /// Parses a committed-view or history row.
    ///
    /// The metadata id is required; other metadata fields default when the
    /// store omits them.
    pub fn from_row(row: &Value) -> RepositoryResult<Self> {
        let metadata = row
            .field("metadata")
            .ok_or_else(|| RepositoryError::MalformedRecord("missing metadata".to_string()))?;

        let id = match metadata.field("id") {
            Some(Value::String(id)) => id.clone(),
            _ => {
                return Err(RepositoryError::MalformedRecord(
                    "metadata carries no id".to_string(),
                ))
            }
        };
        let version = match metadata.field("version") {
            Some(Value::Int(version)) => *version,
            _ => 0,
        };
        let tx_id = match metadata.field("txId") {
            Some(Value::String(tx_id)) => tx_id.clone(),
            _ => String::new(),
        };
        let tx_time = match metadata.field("txTime") {
            Some(Value::Timestamp(ts)) => Some(*ts),
            Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|ts| ts.with_timezone(&Utc)),
            _ => None,
        };

        Ok(Self {
            metadata: RevisionMetadata {
                id,
                version,
                tx_id,
                tx_time,
            },
            block_address: row
                .field("blockAddress")
                .map(Value::to_json)
                .unwrap_or(serde_json::Value::Null),
            hash: row
                .field("hash")
                .map(Value::to_json)
                .unwrap_or(serde_json::Value::Null),
            data: row
                .field("data")
                .map(Value::to_json)
                .unwrap_or(serde_json::Value::Null),
        })
    }
}
