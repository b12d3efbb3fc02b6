//! Integration tests for record persistence
//!
//! Each test registers a `MockExecutor` under its own connection name and
//! drives records through the public API: set, save, reload, delete.

use lifeline::mock::MockExecutor;
use lifeline::{row, Collection, ColumnType, Entity, ExecResult, LifeError, Value};

// ============================================================================
// Test Entities
// ============================================================================

fn person(config: &str) -> Entity {
    Entity::builder(config, "people", "id")
        .field("id", ColumnType::Int)
        .field("name", ColumnType::String)
        .field("age", ColumnType::Int)
        .incrementing("id")
        .build()
        .unwrap()
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn loaded(entity: &Entity, id: i64, name: &str) -> lifeline::Record {
    let record = entity.new_record();
    record.load_data(&row([
        ("id", Value::from(id)),
        ("name", Value::from(name)),
        ("age", Value::from(30)),
    ]));
    record
}

// ============================================================================
// Insert
// ============================================================================

#[test]
fn test_insert_takes_generated_id() {
    init_logging();
    let mock = MockExecutor::register("lifecycle_insert");
    mock.append_exec_result(ExecResult::new(1).with_insert_id(42));

    let record = person("lifecycle_insert").new_record();
    record.set_column("name", "Ann").set_column("age", 31);
    assert!(record.save().unwrap());

    assert!(!record.is_new());
    assert_eq!(record.id(), Value::Int(42));
    assert_eq!(record.get_column("name"), Value::from("Ann"));
    assert!(!record.has_changes());

    let statement = &mock.statements()[0];
    assert!(statement.sql.starts_with(r#"INSERT INTO "people""#));
    assert!(statement.sql.contains(r#"RETURNING "id""#));
    assert_eq!(statement.params, vec![Value::from("Ann"), Value::Int(31)]);
}

#[test]
fn test_failed_insert_leaves_record_untouched() {
    let mock = MockExecutor::register("lifecycle_insert_fail");
    mock.append_exec_error("duplicate key value");

    let record = person("lifecycle_insert_fail").new_record();
    record.set_column("name", "Ann");
    assert!(matches!(record.save(), Err(LifeError::Persistence(_))));
    assert!(record.is_new());
    assert_eq!(record.changed().len(), 1);
}

// ============================================================================
// Update
// ============================================================================

#[test]
fn test_update_writes_only_pending_fields() {
    let mock = MockExecutor::register("lifecycle_update");
    let record = loaded(&person("lifecycle_update"), 5, "Bob");

    record.set_column("name", "Robert");
    assert!(record.save().unwrap());

    let statement = &mock.statements()[0];
    assert!(statement.sql.starts_with(r#"UPDATE "people" SET "name" = $1"#));
    assert!(!statement.sql.contains(r#""age""#));
    assert_eq!(statement.params, vec![Value::from("Robert"), Value::Int(5)]);
    assert_eq!(record.original()["name"], Value::from("Robert"));
    assert!(!record.has_changes());
}

#[test]
fn test_primary_key_is_never_updated() {
    let mock = MockExecutor::register("lifecycle_pk");
    let record = loaded(&person("lifecycle_pk"), 5, "Bob");

    record.set_column("id", 99).set_column("age", 40);
    assert!(record.save().unwrap());

    let statement = &mock.statements()[0];
    assert!(statement.sql.starts_with(r#"UPDATE "people" SET "age" = $1"#));
    assert_eq!(statement.params, vec![Value::Int(40), Value::Int(5)]);
    assert_eq!(record.id(), Value::Int(5));
}

#[test]
fn test_save_without_changes_is_noop() {
    let mock = MockExecutor::register("lifecycle_noop");
    let record = loaded(&person("lifecycle_noop"), 5, "Bob");
    assert!(!record.save().unwrap());
    assert!(mock.statements().is_empty());
}

#[test]
fn test_update_matching_no_row() {
    let mock = MockExecutor::register("lifecycle_update_none");
    mock.append_exec_result(ExecResult::new(0));
    let record = loaded(&person("lifecycle_update_none"), 5, "Bob");
    record.set_column("age", 41);
    assert!(!record.save().unwrap());
    assert!(record.has_changes());
}

// ============================================================================
// Delete
// ============================================================================

#[test]
fn test_delete_unsaved_record_fails_without_engine_call() {
    let mock = MockExecutor::register("lifecycle_delete_new");
    let record = person("lifecycle_delete_new").new_record();
    assert!(matches!(record.delete(), Err(LifeError::InvalidState(_))));
    assert!(mock.statements().is_empty());
}

#[test]
fn test_delete_by_primary_key() {
    let mock = MockExecutor::register("lifecycle_delete");
    let record = loaded(&person("lifecycle_delete"), 8, "Cy");
    assert!(record.delete().unwrap());

    let statement = &mock.statements()[0];
    assert!(statement.sql.starts_with(r#"DELETE FROM "people""#));
    assert_eq!(statement.params, vec![Value::Int(8)]);
}

// ============================================================================
// Lookup and serialization
// ============================================================================

#[test]
fn test_find_by_primary_key() {
    let mock = MockExecutor::register("lifecycle_find");
    mock.append_query_result(vec![row([
        ("id", Value::from(3)),
        ("name", Value::from("Dee")),
        ("age", Value::from("27")),
    ])]);
    let entity = person("lifecycle_find");

    let found = entity.find(3).unwrap().unwrap();
    assert_eq!(found.get_column("age"), Value::Int(27));
    assert!(!found.is_new());
    assert!(entity.find(4).unwrap().is_none());

    let statement = &mock.statements()[0];
    assert!(statement.sql.contains(r#""people"."id" = $1"#));
    assert!(statement.sql.contains("LIMIT"));
}

#[test]
fn test_to_json_is_stable() {
    let record = loaded(&person("lifecycle_json"), 1, "Eve");
    record.set_column("age", 33);
    let first = record.to_json();
    assert_eq!(first, serde_json::json!({"id": 1, "name": "Eve", "age": 33}));
    assert_eq!(record.to_json(), first);
    assert_eq!(serde_json::to_value(&record).unwrap(), first);
}

#[test]
fn test_unknown_connection() {
    let record = person("lifecycle_never_registered").new_record();
    record.set_column("name", "Zed");
    assert!(matches!(record.save(), Err(LifeError::Configuration(_))));
}

// ============================================================================
// Collection save
// ============================================================================

#[test]
fn test_collection_save_counts_written_rows() {
    let mock = MockExecutor::register("lifecycle_batch");
    let entity = person("lifecycle_batch");
    let records: Collection = (1..=3)
        .map(|i| {
            let record = loaded(&entity, i, "P");
            record.set_column("age", 50 + i);
            record
        })
        .collect();

    assert_eq!(records.save().unwrap(), 3);
    assert_eq!(mock.statements().len(), 3);
    assert!(records.iter().all(|r| !r.has_changes()));
}

#[test]
fn test_collection_save_runs_every_record_before_failing() {
    let mock = MockExecutor::register("lifecycle_batch_fail");
    mock.append_exec_result(ExecResult::new(1).with_insert_id(1))
        .append_exec_error("connection reset")
        .append_exec_result(ExecResult::new(1).with_insert_id(3));

    let entity = person("lifecycle_batch_fail");
    let records: Collection = (0..3)
        .map(|i| {
            let record = entity.new_record();
            record.set_column("name", format!("N{}", i));
            record
        })
        .collect();

    let result = records.save();
    assert!(matches!(result, Err(LifeError::Persistence(_))));
    assert_eq!(mock.statements().len(), 3);
    assert_eq!(records.iter().filter(|r| !r.is_new()).count(), 2);
}
