//! In-memory stub client
//!
//! Records every executed statement and plays back scripted rows, for tests
//! and examples. When the script queue is empty it answers inserts with a
//! store-style acknowledgment (`{documentId}`) and everything else with an
//! empty result set.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::codec::{decode_bytes, encode, Value};

use super::errors::{ClientError, ClientResult};
use super::LedgerClient;

/// One statement as the stub received it
#[derive(Debug, Clone)]
pub struct ExecutedStatement {
    /// Statement text
    pub text: String,
    /// Encoded positional parameters, as received
    pub params: Vec<Vec<u8>>,
}

impl ExecutedStatement {
    /// Decodes the received parameters back into value trees
    pub fn decoded_params(&self) -> Vec<Value> {
        self.params
            .iter()
            .filter_map(|bytes| decode_bytes(bytes).ok())
            .collect()
    }
}

/// Scripted in-memory ledger client
#[derive(Default)]
pub struct StubLedger {
    tables: Mutex<Vec<String>>,
    created: Mutex<Vec<String>>,
    indexes: Mutex<Vec<(String, String)>>,
    executed: Mutex<Vec<ExecutedStatement>>,
    responses: Mutex<VecDeque<ClientResult<Vec<Value>>>>,
    catalog_fetches: Mutex<usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StubLedger {
    /// Creates an empty stub
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the table catalog
    pub fn with_tables(self, names: Vec<String>) -> Self {
        *lock(&self.tables) = names;
        self
    }

    /// Queues one scripted result set for the next statement
    pub fn push_rows(&self, rows: Vec<Value>) {
        lock(&self.responses).push_back(Ok(rows));
    }

    /// Queues one scripted failure for the next statement
    pub fn push_error(&self, error: ClientError) {
        lock(&self.responses).push_back(Err(error));
    }

    /// Snapshot of every statement executed so far
    pub fn executed(&self) -> Vec<ExecutedStatement> {
        lock(&self.executed).clone()
    }

    /// Statement texts only, for terse assertions
    pub fn executed_texts(&self) -> Vec<String> {
        self.executed()
            .into_iter()
            .map(|statement| statement.text)
            .collect()
    }

    /// Tables created through this stub
    pub fn created_tables(&self) -> Vec<String> {
        lock(&self.created).clone()
    }

    /// Indexes ensured through this stub
    pub fn ensured_indexes(&self) -> Vec<(String, String)> {
        lock(&self.indexes).clone()
    }

    /// How many times the catalog was fetched
    pub fn catalog_fetches(&self) -> usize {
        *lock(&self.catalog_fetches)
    }

    fn default_response(statement: &str) -> Vec<Value> {
        if statement
            .trim_start()
            .to_ascii_uppercase()
            .starts_with("INSERT")
        {
            vec![Value::Struct(vec![(
                "documentId".to_string(),
                Value::String(Uuid::new_v4().to_string()),
            )])]
        } else {
            Vec::new()
        }
    }
}

#[async_trait]
impl LedgerClient for StubLedger {
    async fn execute(&self, statement: &str, params: &[Vec<u8>]) -> ClientResult<Vec<Vec<u8>>> {
        lock(&self.executed).push(ExecutedStatement {
            text: statement.to_string(),
            params: params.to_vec(),
        });

        let scripted = lock(&self.responses).pop_front();
        let rows = match scripted {
            Some(response) => response?,
            None => Self::default_response(statement),
        };
        Ok(rows.iter().map(encode).collect())
    }

    async fn table_names(&self) -> ClientResult<Vec<String>> {
        *lock(&self.catalog_fetches) += 1;
        Ok(lock(&self.tables).clone())
    }

    async fn create_table(&self, name: &str) -> ClientResult<()> {
        lock(&self.tables).push(name.to_string());
        lock(&self.created).push(name.to_string());
        Ok(())
    }

    async fn create_index(&self, table: &str, field: &str) -> ClientResult<()> {
        lock(&self.indexes).push((table.to_string(), field.to_string()));
        Ok(())
    }
}
