//! Repository Flow Tests
//!
//! End-to-end flows over the stub client:
//! - Add round trip with store acknowledgment
//! - Client-side shaping (sort, pagination) over materialized results
//! - Committed-view and history decoding
//! - Cascading updates (fire-and-forget) and recursive deletes
//! - Managed timestamp refresh

use std::sync::Arc;

use serde_json::json;

use ledgermap::client::{Connection, StubLedger};
use ledgermap::codec::Value;
use ledgermap::query::{OrderSpec, QueryArgs, QueryError};
use ledgermap::repository::{Repository, RepositoryError, RepositoryOptions};
use ledgermap::schema::{FieldDef, SchemaModel};

// =============================================================================
// Helper Functions
// =============================================================================

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn person_repo(stub: &Arc<StubLedger>) -> Arc<Repository> {
    init_logging();
    Repository::new(
        Connection::new(stub.clone()),
        "person",
        SchemaModel::new()
            .field("name", FieldDef::string().primary_key())
            .field("city", FieldDef::string().allow_null()),
        RepositoryOptions::default(),
    )
    .expect("schema should assemble")
}

fn people_repo(stub: &Arc<StubLedger>) -> Arc<Repository> {
    Repository::new(
        Connection::new(stub.clone()),
        "people",
        SchemaModel::new()
            .field("id", FieldDef::string().primary_key())
            .field("owner", FieldDef::reference(person_repo(stub)))
            .field("age", FieldDef::integer().allow_null()),
        RepositoryOptions::default(),
    )
    .expect("schema should assemble")
}

fn row(name: &str, age: i64) -> Value {
    Value::Struct(vec![
        ("name".into(), Value::String(name.into())),
        ("age".into(), Value::Int(age)),
    ])
}

// =============================================================================
// Add
// =============================================================================

/// Add returns the store's acknowledgment rows.
#[tokio::test]
async fn test_add_returns_store_acknowledgment() {
    let stub = Arc::new(StubLedger::new());
    let repo = person_repo(&stub);

    let acks = repo.add(json!({"name": "Bo"})).await.unwrap();
    assert_eq!(acks.len(), 1);
    assert!(acks[0]["documentId"].is_string());
}

/// Add creates the table when the catalog does not list it, exactly once.
#[tokio::test]
async fn test_add_auto_creates_missing_table() {
    let stub = Arc::new(StubLedger::new());
    let repo = person_repo(&stub);

    repo.add(json!({"name": "Bo"})).await.unwrap();
    repo.add(json!({"name": "Mi"})).await.unwrap();

    assert_eq!(stub.created_tables(), vec!["person"]);
}

// =============================================================================
// Reads and Client-Side Shaping
// =============================================================================

/// Results sort case-insensitively and paginate by slice, in-process.
#[tokio::test]
async fn test_get_by_sorts_and_paginates_client_side() {
    let stub = Arc::new(StubLedger::new());
    let repo = person_repo(&stub);

    stub.push_rows(vec![row("charlie", 30), row("Alice", 20), row("bob", 25)]);

    let args = QueryArgs::new()
        .order_by(OrderSpec::asc("name"))
        .with_offset(1)
        .with_limit(1);
    let results = repo.get_by(args).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], json!("bob"));

    // The statement itself carries no ordering or pagination.
    let text = &stub.executed_texts()[0];
    assert!(!text.to_lowercase().contains("order by"));
    assert!(!text.to_lowercase().contains("limit"));
}

/// get_one_by returns the first shaped result.
#[tokio::test]
async fn test_get_one_by_returns_first_match() {
    let stub = Arc::new(StubLedger::new());
    let repo = person_repo(&stub);

    stub.push_rows(vec![row("Alice", 20), row("bob", 25)]);
    let result = repo
        .get_one_by(QueryArgs::new().filter_eq("city", json!("Utrecht")))
        .await
        .unwrap();
    assert_eq!(result.unwrap()["name"], json!("Alice"));
}

/// get_by_pk compiles an equality filter on the resolved primary key.
#[tokio::test]
async fn test_get_by_pk_filters_on_primary_key() {
    let stub = Arc::new(StubLedger::new());
    let repo = person_repo(&stub);

    stub.push_rows(vec![row("Bo", 41)]);
    let result = repo.get_by_pk(&json!("Bo")).await.unwrap();
    assert!(result.is_some());
    assert!(stub.executed_texts()[0].contains("WHERE person.name = 'Bo'"));
}

// =============================================================================
// Committed View and History
// =============================================================================

fn committed_row(id: &str, version: i64) -> Value {
    Value::Struct(vec![
        (
            "blockAddress".into(),
            Value::Struct(vec![("sequenceNo".into(), Value::Int(7))]),
        ),
        ("hash".into(), Value::String("aGFzaA==".into())),
        (
            "data".into(),
            Value::Struct(vec![("name".into(), Value::String("Bo".into()))]),
        ),
        (
            "metadata".into(),
            Value::Struct(vec![
                ("id".into(), Value::String(id.into())),
                ("version".into(), Value::Int(version)),
                ("txId".into(), Value::String("tx-1".into())),
                ("txTime".into(), Value::String("2024-05-01T12:00:00Z".into())),
            ]),
        ),
    ])
}

/// Document-id lookups go through the committed view and decode revisions.
#[tokio::test]
async fn test_get_by_document_id_uses_committed_view() {
    let stub = Arc::new(StubLedger::new());
    let repo = person_repo(&stub);

    stub.push_rows(vec![committed_row("doc-1", 0), committed_row("doc-1", 1)]);
    let revisions = repo.get_by_document_id("doc-1").await.unwrap();

    assert_eq!(
        stub.executed_texts()[0],
        "SELECT * FROM _ql_committed_person WHERE metadata.id = 'doc-1';"
    );
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[0].metadata.id, "doc-1");
    assert_eq!(revisions[1].metadata.version, 1);
    assert_eq!(revisions[0].data, json!({"name": "Bo"}));
}

/// History by primary key projects the change log filtered on data fields.
#[tokio::test]
async fn test_history_by_pk_projects_change_log() {
    let stub = Arc::new(StubLedger::new());
    let repo = person_repo(&stub);

    stub.push_rows(vec![committed_row("doc-1", 0)]);
    let revisions = repo
        .get_history_by_pk(&json!("Bo"), None, None)
        .await
        .unwrap();

    assert_eq!(
        stub.executed_texts()[0],
        "SELECT * FROM history(person) AS h WHERE h.data.name = 'Bo';"
    );
    assert_eq!(revisions.len(), 1);
    assert!(revisions[0].metadata.tx_time.is_some());
}

/// Future history bounds fail before any statement executes.
#[tokio::test]
async fn test_future_history_window_issues_no_query() {
    let stub = Arc::new(StubLedger::new());
    let repo = person_repo(&stub);

    let future = chrono::Utc::now() + chrono::Duration::days(1);
    let error = repo
        .get_history_by_pk(&json!("Bo"), Some(future), None)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        RepositoryError::Query(QueryError::InvalidDates)
    ));
    assert!(stub.executed_texts().is_empty());
}

// =============================================================================
// Update
// =============================================================================

/// Reference fields cascade: the referenced table's update is compiled and
/// executed independently; the local SET excludes the reference.
#[tokio::test]
async fn test_update_cascades_through_reference() {
    let stub = Arc::new(StubLedger::new());
    let repo = people_repo(&stub);

    // Auxiliary lookup resolving the stored foreign key.
    stub.push_rows(vec![Value::Struct(vec![(
        "owner".into(),
        Value::String("bo-1".into()),
    )])]);

    repo.update(
        json!({"age": 31, "owner": {"city": "Utrecht"}}),
        QueryArgs::new().filter_eq("id", json!("a1")),
    )
    .await
    .unwrap();

    let texts = stub.executed_texts();
    assert_eq!(
        texts,
        vec![
            "SELECT people.owner FROM people WHERE people.id = 'a1';".to_string(),
            "UPDATE person SET person.city = 'Utrecht' WHERE person.name = 'bo-1';".to_string(),
            "UPDATE people SET people.age = 31 WHERE people.id = 'a1';".to_string(),
        ]
    );
}

/// A failing cascade does not fail the local update.
#[tokio::test]
async fn test_cascade_failure_is_not_surfaced() {
    let stub = Arc::new(StubLedger::new());
    let repo = people_repo(&stub);

    // The auxiliary lookup finds no referenced key.
    stub.push_rows(vec![]);

    let result = repo
        .update(
            json!({"age": 31, "owner": {"city": "Utrecht"}}),
            QueryArgs::new().filter_eq("id", json!("a1")),
        )
        .await;
    assert!(result.is_ok());
    assert!(stub
        .executed_texts()
        .iter()
        .any(|text| text.starts_with("UPDATE people")));
}

/// Managed timestamps refresh updatedAt on every update.
#[tokio::test]
async fn test_update_refreshes_updated_at() {
    let stub = Arc::new(StubLedger::new());
    let repo = Repository::new(
        Connection::new(stub.clone()),
        "person",
        SchemaModel::new()
            .field("name", FieldDef::string().primary_key())
            .field("city", FieldDef::string().allow_null()),
        RepositoryOptions::default().with_timestamps(),
    )
    .unwrap();

    repo.update(
        json!({"city": "Utrecht"}),
        QueryArgs::new().filter_eq("name", json!("Bo")),
    )
    .await
    .unwrap();

    let text = &stub.executed_texts()[0];
    assert!(text.contains("person.city = 'Utrecht'"));
    assert!(text.contains("person.updatedAt = '"));
}

/// Managed timestamps bind createdAt/updatedAt defaults on add.
#[tokio::test]
async fn test_add_binds_managed_timestamps() {
    let stub = Arc::new(StubLedger::new());
    let repo = Repository::new(
        Connection::new(stub.clone()),
        "person",
        SchemaModel::new().field("name", FieldDef::string().primary_key()),
        RepositoryOptions::default().with_timestamps(),
    )
    .unwrap();

    repo.add(json!({"name": "Bo"})).await.unwrap();

    let executed = stub.executed();
    let insert = executed
        .iter()
        .find(|statement| statement.text.starts_with("INSERT"))
        .unwrap();
    let doc = &insert.decoded_params()[0];
    assert!(matches!(doc.field("createdAt"), Some(Value::Timestamp(_))));
    assert!(matches!(doc.field("updatedAt"), Some(Value::Timestamp(_))));
}

// =============================================================================
// Delete
// =============================================================================

/// Unfiltered deletes are refused before anything executes.
#[tokio::test]
async fn test_unfiltered_delete_executes_nothing() {
    let stub = Arc::new(StubLedger::new());
    let repo = person_repo(&stub);

    let error = repo.delete(QueryArgs::new()).await.unwrap_err();
    assert!(matches!(
        error,
        RepositoryError::Query(QueryError::UnfilteredDelete(_))
    ));
    assert!(stub.executed_texts().is_empty());
}

/// A recursive delete resolves each reference and deletes the referenced
/// documents with independent statements.
#[tokio::test]
async fn test_recursive_delete_cascades() {
    let stub = Arc::new(StubLedger::new());
    let repo = people_repo(&stub);

    // Auxiliary lookup resolving the stored foreign key.
    stub.push_rows(vec![Value::Struct(vec![(
        "owner".into(),
        Value::String("bo-1".into()),
    )])]);

    repo.delete(QueryArgs::new().filter_eq("id", json!("a1")).recursive())
        .await
        .unwrap();

    let texts = stub.executed_texts();
    assert_eq!(
        texts,
        vec![
            "SELECT people.owner FROM people WHERE people.id = 'a1';".to_string(),
            "DELETE FROM people WHERE people.id = 'a1';".to_string(),
            "DELETE FROM person WHERE person.name = 'bo-1';".to_string(),
        ]
    );
}

/// A plain delete touches only its own table.
#[tokio::test]
async fn test_plain_delete_does_not_cascade() {
    let stub = Arc::new(StubLedger::new());
    let repo = people_repo(&stub);

    repo.delete(QueryArgs::new().filter_eq("id", json!("a1")))
        .await
        .unwrap();

    assert_eq!(
        stub.executed_texts(),
        vec!["DELETE FROM people WHERE people.id = 'a1';".to_string()]
    );
}

// =============================================================================
// Collaborator Failures
// =============================================================================

/// Client failures propagate as fatal per-call errors.
#[tokio::test]
async fn test_client_failure_propagates() {
    let stub = Arc::new(StubLedger::new());
    let repo = person_repo(&stub);

    stub.push_error(ledgermap::client::ClientError::Transport("link down".into()));
    let error = repo.get_all().await.unwrap_err();
    assert!(matches!(error, RepositoryError::Client(_)));
}
