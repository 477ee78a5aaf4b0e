//! Connection wrapper owning the per-connection table catalog
//!
//! Repositories of one ledger share a `Connection`. It delegates statements
//! to the client and caches the table-name list; the first caller fetches,
//! later callers reuse, and concurrent first-callers may harmlessly race to
//! an equivalent value.

use std::sync::Arc;

use log::debug;
use tokio::sync::RwLock;

use super::errors::ClientResult;
use super::LedgerClient;

/// Shared handle over a ledger client
pub struct Connection {
    client: Arc<dyn LedgerClient>,
    table_names: RwLock<Option<Vec<String>>>,
}

impl Connection {
    /// Wraps a client into a shared connection
    pub fn new(client: Arc<dyn LedgerClient>) -> Arc<Self> {
        Arc::new(Self {
            client,
            table_names: RwLock::new(None),
        })
    }

    /// Executes one statement in its own session-scoped transaction
    pub async fn execute(&self, statement: &str, params: &[Vec<u8>]) -> ClientResult<Vec<Vec<u8>>> {
        debug!("executing statement: {}", statement);
        self.client.execute(statement, params).await
    }

    /// Returns the cached table-name catalog, fetching it on first use.
    ///
    /// Pass `refresh` to bypass the cache after out-of-band table creation.
    pub async fn table_names(&self, refresh: bool) -> ClientResult<Vec<String>> {
        if !refresh {
            if let Some(names) = self.table_names.read().await.as_ref() {
                return Ok(names.clone());
            }
        }
        let names = self.client.table_names().await?;
        *self.table_names.write().await = Some(names.clone());
        Ok(names)
    }

    /// Creates the table when the catalog does not list it.
    ///
    /// Returns true when a table was created.
    pub async fn ensure_table(&self, name: &str) -> ClientResult<bool> {
        let names = self.table_names(false).await?;
        if names.iter().any(|existing| existing == name) {
            return Ok(false);
        }
        debug!("creating missing table '{}'", name);
        self.client.create_table(name).await?;
        let mut cache = self.table_names.write().await;
        match cache.as_mut() {
            Some(names) => names.push(name.to_string()),
            None => *cache = Some(vec![name.to_string()]),
        }
        Ok(true)
    }

    /// Ensures a secondary index exists for the field
    pub async fn ensure_index(&self, table: &str, field: &str) -> ClientResult<()> {
        debug!("ensuring index on {}.{}", table, field);
        self.client.create_index(table, field).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::stub::StubLedger;
    use super::*;

    #[tokio::test]
    async fn test_table_names_cached_after_first_fetch() {
        let stub = Arc::new(StubLedger::new().with_tables(vec!["people".into()]));
        let connection = Connection::new(stub.clone());

        assert_eq!(connection.table_names(false).await.unwrap(), vec!["people"]);
        assert_eq!(stub.catalog_fetches(), 1);

        connection.table_names(false).await.unwrap();
        assert_eq!(stub.catalog_fetches(), 1);

        connection.table_names(true).await.unwrap();
        assert_eq!(stub.catalog_fetches(), 2);
    }

    #[tokio::test]
    async fn test_ensure_table_creates_once() {
        let stub = Arc::new(StubLedger::new());
        let connection = Connection::new(stub.clone());

        assert!(connection.ensure_table("people").await.unwrap());
        assert!(!connection.ensure_table("people").await.unwrap());
        assert_eq!(stub.created_tables(), vec!["people"]);
    }
}
