//! Integration tests for the query facade
//!
//! Queries are started from entities bound to a per-test connection backed by
//! `MockExecutor`; assertions look at the rendered SQL and at the records the
//! facade builds from scripted rows.

use lifeline::mock::MockExecutor;
use lifeline::query::{ModelQuery, Order, WEIGHT_COLUMN};
use lifeline::{row, Comparator, Entity, LifeError, Value};

// ============================================================================
// Test Entities
// ============================================================================

fn book(config: &str) -> Entity {
    Entity::builder(config, "books", "id")
        .fields(["id", "title", "author_id"])
        .build()
        .unwrap()
}

fn author(config: &str) -> Entity {
    Entity::builder(config, "authors", "id")
        .fields(["id", "name"])
        .build()
        .unwrap()
}

// ============================================================================
// Hydration
// ============================================================================

#[test]
fn test_unknown_columns_become_additional() {
    let mock = MockExecutor::register("facade_hydrate");
    mock.append_query_result(vec![row([
        ("id", Value::from(1)),
        ("title", Value::from("Dune")),
        ("rating", Value::from(4.5)),
        (WEIGHT_COLUMN, Value::from(3)),
    ])]);

    let mut query = book("facade_hydrate").all().unwrap();
    query.remove_col("books.author_id").add_col("reviews.stars rating");
    let records = query.fetch_models().unwrap();
    let record = records.first().unwrap();

    assert_eq!(record.additional_column("rating"), Some(Value::Float(4.5)));
    assert!(record.additional_column(WEIGHT_COLUMN).is_none());
    assert_eq!(
        record.to_json(),
        serde_json::json!({"id": 1, "title": "Dune", "rating": 4.5})
    );
    assert!(!mock.statements()[0].sql.contains("author_id"));
}

#[test]
fn test_target_without_connection_inherits_query_connection() {
    let mock = MockExecutor::register("facade_inherit");
    mock.append_query_result(vec![row([("id", 1), ("name", 2)])]);

    let mut query = ModelQuery::new("facade_inherit").unwrap();
    query.table("authors").to_model(&author(""));
    let record = query.fetch_models().unwrap().first().unwrap().clone();
    assert_eq!(record.config(), "facade_inherit");
    assert_eq!(mock.query_count(), 1);
}

// ============================================================================
// Predicates and ranking
// ============================================================================

#[test]
fn test_boolean_grouping() {
    let mock = MockExecutor::register("facade_groups");
    let mut query = book("facade_groups").all().unwrap();
    query
        .filter("books.author_id", Comparator::Eq, 1)
        .or()
        .open_bracket()
        .filter("books.title", Comparator::Like, "D%")
        .where_not_null("books.author_id")
        .close_bracket();
    query.fetch().unwrap();

    let statement = &mock.statements()[0];
    assert!(statement.sql.contains(" OR "));
    assert!(statement.sql.contains(r#""books"."title" LIKE $2"#));
    assert!(statement.sql.contains(r#""books"."author_id" IS NOT NULL"#));
    assert_eq!(statement.params, vec![Value::Int(1), Value::from("D%")]);
}

#[test]
fn test_subquery_membership() {
    let mock = MockExecutor::register("facade_subquery");
    let mut authors = author("facade_subquery").all().unwrap();
    authors
        .cols(["authors.id"])
        .filter("authors.name", Comparator::Eq, "Herbert");

    let mut query = book("facade_subquery").all().unwrap();
    query
        .where_in_query("books.author_id", &authors)
        .unwrap()
        .where_not_in("books.id", [3, 4]);
    query.fetch().unwrap();

    let statement = &mock.statements()[0];
    assert!(statement.sql.contains(r#""books"."author_id" IN (SELECT"#));
    assert!(statement.sql.contains(r#""books"."id" NOT IN"#));
    assert_eq!(
        statement.params,
        vec![Value::from("Herbert"), Value::Int(3), Value::Int(4)]
    );
}

#[test]
fn test_weighted_ranking_orders_first() {
    let mock = MockExecutor::register("facade_weights");
    let mut query = book("facade_weights").all().unwrap();
    let nested = ModelQuery::sub_weighted_where("books.title", Comparator::Like, "%Dune%", 5, 0);
    query
        .weighted_where("books.title", Comparator::Eq, "Dune", 10, nested)
        .order("books.id", Order::Asc);
    query.fetch().unwrap();

    let statement = &mock.statements()[0];
    assert_eq!(statement.params, vec![Value::from("Dune"), Value::from("%Dune%")]);
    let sql = &statement.sql;
    assert!(sql.contains("CASE WHEN"));
    assert!(sql.contains("THEN 10"));
    assert!(sql.contains(&format!(r#"AS "{}""#, WEIGHT_COLUMN)));
    let weight_order = sql.find(&format!(r#"ORDER BY "{}" DESC"#, WEIGHT_COLUMN));
    let id_order = sql.find(r#""books"."id" ASC"#);
    assert!(weight_order.is_some());
    assert!(weight_order < id_order);
}

// ============================================================================
// Paging and streaming
// ============================================================================

#[test]
fn test_paginate_models() {
    let mock = MockExecutor::register("facade_paginate");
    mock.append_query_result(vec![row([("count", 25)])]);
    mock.append_query_result(vec![
        row([("id", 21), ("title", 1)]),
        row([("id", 22), ("title", 2)]),
    ]);

    let query = book("facade_paginate").all().unwrap();
    let page = query.paginate_models(10, 3).unwrap();
    assert_eq!(page.total, 25);
    assert_eq!(page.page, 3);
    assert_eq!(page.last_page, 3);
    assert_eq!(page.items.len(), 2);

    let statements = mock.statements();
    assert!(statements[0].sql.starts_with(r#"SELECT COUNT(*) AS "count" FROM (SELECT"#));
    assert!(statements[1].sql.contains("LIMIT"));
    assert!(statements[1].sql.contains("OFFSET"));
}

#[test]
fn test_stream_models_in_batches() {
    let mock = MockExecutor::register("facade_stream");
    mock.append_query_result(vec![row([("id", 1)]), row([("id", 2)])]);
    mock.append_query_result(vec![row([("id", 3)])]);

    let query = book("facade_stream").all().unwrap();
    let mut seen = Vec::new();
    query
        .stream_models(2, |batch| {
            seen.extend(batch.ids());
            true
        })
        .unwrap();

    assert_eq!(seen, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert_eq!(mock.query_count(), 2);
}

// ============================================================================
// Writes and transactions
// ============================================================================

#[test]
fn test_insert_many_and_transaction() {
    let mock = MockExecutor::register("facade_tx");
    let query = book("facade_tx").all().unwrap();

    query.begin_transaction().unwrap();
    let result = query
        .insert_many(&[
            row([("title", Value::from("A")), ("author_id", Value::from(1))]),
            row([("title", Value::from("B")), ("author_id", Value::from(2))]),
        ])
        .unwrap();
    query.commit().unwrap();
    assert_eq!(result.rows_affected, 1);

    let statements = mock.statements();
    assert_eq!(statements[0].sql, "BEGIN");
    assert!(statements[1].sql.starts_with(r#"INSERT INTO "books""#));
    assert_eq!(statements[1].params.len(), 4);
    assert_eq!(statements[2].sql, "COMMIT");
}

#[test]
fn test_staged_values_update_when_filtered() {
    let mock = MockExecutor::register("facade_values");
    let mut query = book("facade_values").all().unwrap();
    query
        .filter("id", Comparator::Eq, 9)
        .values(row([("title", "Renamed")]));
    query.save().unwrap();

    let statement = &mock.statements()[0];
    assert!(statement.sql.starts_with(r#"UPDATE "books" SET "title" = $1"#));
    assert_eq!(statement.params, vec![Value::from("Renamed"), Value::Int(9)]);
}

#[test]
fn test_new_query_shares_connection() {
    let mock = MockExecutor::register("facade_new_query");
    let query = book("facade_new_query").all().unwrap();
    let mut fresh = query.new_query();
    assert_eq!(fresh.config(), "facade_new_query");
    fresh.raw("SELECT 1", &[]).unwrap();
    assert_eq!(mock.statements()[0].sql, "SELECT 1");

    assert!(matches!(
        ModelQuery::new("facade_missing"),
        Err(LifeError::Configuration(_))
    ));
}
