//! Integration tests for relation resolution and eager loading
//!
//! Relations:
//! - Book belongs_to Author, Author belongs_to Country
//! - Author has_many Books, Author has_one Profile
//! - Book belongs_to_many Tags through book_tags (pivot column `position`)
//!
//! Root entities are bound to a per-test connection with `with_config`;
//! related entities inherit it from the relation query.

use lifeline::mock::MockExecutor;
use lifeline::query::Order;
use lifeline::{row, Collection, EagerLoad, Entity, LifeError, Record, RelationValue, Row, Value};

// ============================================================================
// Test Entities
// ============================================================================

fn country() -> Entity {
    Entity::builder("", "countries", "id")
        .fields(["id", "name"])
        .build()
        .unwrap()
}

fn author() -> Entity {
    Entity::builder("", "authors", "id")
        .fields(["id", "name", "country_id"])
        .belongs_to("country", country, "country_id")
        .has_many("books", book, "author_id")
        .has_one("profile", profile, "author_id")
        .build()
        .unwrap()
}

fn profile() -> Entity {
    Entity::builder("", "profiles", "id")
        .fields(["id", "author_id", "bio"])
        .build()
        .unwrap()
}

fn book() -> Entity {
    Entity::builder("", "books", "id")
        .fields(["id", "title", "author_id"])
        .belongs_to("author", author, "author_id")
        .belongs_to_many_with("tags", tag, "book_tags", "book_id", "tag_id", &["position"])
        .build()
        .unwrap()
}

fn tag() -> Entity {
    Entity::builder("", "tags", "id")
        .fields(["id", "label"])
        .build()
        .unwrap()
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn books(config: &str, rows: &[(i64, i64)]) -> Collection {
    let entity = book().with_config(config);
    rows.iter()
        .map(|&(id, author_id)| {
            let record = entity.new_record();
            record.load_data(&row([
                ("id", Value::from(id)),
                ("title", Value::from(format!("Book {}", id))),
                ("author_id", Value::from(author_id)),
            ]));
            record
        })
        .collect()
}

fn author_row(book_id: i64, id: i64, name: &str, country_id: i64) -> Row {
    row([
        ("__table_books__key", Value::from(book_id)),
        ("id", Value::from(id)),
        ("name", Value::from(name)),
        ("country_id", Value::from(country_id)),
    ])
}

fn related_one(record: &Record, name: &str) -> Record {
    match record.get_relation(name) {
        Some(RelationValue::One(related)) => related,
        other => panic!("expected one related record for `{}`, got {:?}", name, other),
    }
}

// ============================================================================
// Batching
// ============================================================================

#[test]
fn test_owners_sharing_an_id_share_related_handles() {
    init_logging();
    let mock = MockExecutor::register("eager_shared");
    mock.append_query_result(vec![
        author_row(1, 10, "Le Guin", 100),
        author_row(2, 11, "Herbert", 100),
    ]);

    let collection = books("eager_shared", &[(1, 10), (1, 10), (2, 11)]);
    collection
        .eager_load(&EagerLoad::new().path("author"))
        .unwrap();

    assert_eq!(mock.query_count(), 1);
    assert_eq!(mock.statements()[0].params, vec![Value::Int(1), Value::Int(2)]);

    let first = related_one(collection.get(0).unwrap(), "author");
    let second = related_one(collection.get(1).unwrap(), "author");
    let third = related_one(collection.get(2).unwrap(), "author");
    assert!(first.ptr_eq(&second));
    assert_eq!(first.get_column("name"), Value::from("Le Guin"));
    assert_eq!(third.get_column("name"), Value::from("Herbert"));
    assert_eq!(third.config(), "eager_shared");
}

#[test]
fn test_nested_path_costs_one_query_per_level() {
    let mock = MockExecutor::register("eager_nested");
    mock.append_query_result(vec![
        author_row(1, 10, "Le Guin", 100),
        author_row(2, 11, "Herbert", 101),
        author_row(3, 10, "Le Guin", 100),
    ]);
    mock.append_query_result(vec![
        row([
            ("__table_authors__key", Value::from(10)),
            ("id", Value::from(100)),
            ("name", Value::from("USA")),
        ]),
        row([
            ("__table_authors__key", Value::from(11)),
            ("id", Value::from(101)),
            ("name", Value::from("UK")),
        ]),
    ]);

    let collection = books("eager_nested", &[(1, 10), (2, 11), (3, 10)]);
    collection
        .eager_load(&EagerLoad::new().path("author.country"))
        .unwrap();

    assert_eq!(mock.query_count(), 2);
    let statements = mock.statements();
    assert!(statements[1].sql.contains(r#""authors" AS "__primary__""#));
    assert_eq!(statements[1].params, vec![Value::Int(10), Value::Int(11)]);

    let author = related_one(collection.get(1).unwrap(), "author");
    let country = related_one(&author, "country");
    assert_eq!(country.get_column("name"), Value::from("UK"));

    let json = collection.get(0).unwrap().to_json();
    assert_eq!(json["author"]["country"]["name"], serde_json::json!("USA"));
}

#[test]
fn test_shared_prefix_paths_fetch_head_once() {
    let mock = MockExecutor::register("eager_prefix");
    mock.append_query_result(vec![
        author_row(1, 10, "Le Guin", 100),
        author_row(2, 11, "Herbert", 101),
    ]);
    mock.append_query_result(vec![row([
        ("__table_authors__key", Value::from(10)),
        ("id", Value::from(100)),
        ("name", Value::from("USA")),
    ])]);
    mock.append_query_result(vec![row([
        ("__table_authors__key", Value::from(11)),
        ("id", Value::from(7)),
        ("author_id", Value::from(11)),
        ("bio", Value::from("Arrakis")),
    ])]);

    let collection = books("eager_prefix", &[(1, 10), (2, 11)]);
    let paths = EagerLoad::new()
        .path("author.country")
        .path("author.profile");
    collection.eager_load(&paths).unwrap();

    assert_eq!(mock.query_count(), 3);
    let statements = mock.statements();
    let author_queries = statements
        .iter()
        .filter(|s| s.sql.contains(r#""books" AS "__primary__""#))
        .count();
    assert_eq!(author_queries, 1);
    assert!(statements[2].sql.contains(r#""profiles""#));
    assert_eq!(statements[2].params, vec![Value::Int(10), Value::Int(11)]);

    let le_guin = related_one(collection.get(0).unwrap(), "author");
    let herbert = related_one(collection.get(1).unwrap(), "author");
    for author in [&le_guin, &herbert] {
        assert!(author.has_relation("country"));
        assert!(author.has_relation("profile"));
    }
    assert_eq!(related_one(&le_guin, "country").get_column("name"), Value::from("USA"));
    assert!(herbert.get_relation("country").unwrap().is_null());
    assert!(le_guin.get_relation("profile").unwrap().is_null());
    assert_eq!(related_one(&herbert, "profile").get_column("bio"), Value::from("Arrakis"));
}

#[test]
fn test_missing_relations_are_cached_as_empty() {
    let mock = MockExecutor::register("eager_empty");
    let owner = author().with_config("eager_empty").new_record();
    owner.load_data(&row([("id", Value::from(1)), ("name", Value::from("Anon"))]));

    let paths: EagerLoad = ["books", "profile", "country"].into_iter().collect();
    owner.eager_load(&paths).unwrap();
    assert_eq!(mock.query_count(), 3);

    assert!(owner.get_relation("books").unwrap().as_many().unwrap().is_empty());
    assert!(owner.get_relation("profile").unwrap().is_null());
    assert!(owner.has_relation("country"));
    assert_eq!(
        owner.to_json(),
        serde_json::json!({"id": 1, "name": "Anon", "country_id": null, "books": []})
    );

    owner.eager_load(&paths).unwrap();
    assert_eq!(mock.query_count(), 3);
}

#[test]
fn test_unsaved_owners_resolve_without_query() {
    let mock = MockExecutor::register("eager_unsaved");
    let owner = author().with_config("eager_unsaved").new_record();
    owner.eager_load(&EagerLoad::new().path("books")).unwrap();

    assert_eq!(mock.query_count(), 0);
    assert!(owner.get_relation("books").unwrap().as_many().unwrap().is_empty());
}

#[test]
fn test_has_many_groups_and_customizes() {
    let mock = MockExecutor::register("eager_has_many");
    mock.append_query_result(vec![
        row([
            ("__table_authors__key", Value::from(2)),
            ("id", Value::from(7)),
            ("title", Value::from("A")),
            ("author_id", Value::from(2)),
        ]),
        row([
            ("__table_authors__key", Value::from(2)),
            ("id", Value::from(8)),
            ("title", Value::from("B")),
            ("author_id", Value::from(2)),
        ]),
    ]);

    let entity = author().with_config("eager_has_many");
    let authors: Collection = [1, 2]
        .into_iter()
        .map(|id| {
            let record = entity.new_record();
            record.load_data(&row([("id", id)]));
            record
        })
        .collect();

    let paths = EagerLoad::new().path_with("books", |q| {
        q.order("books.title", Order::Asc);
    });
    authors.eager_load(&paths).unwrap();

    let titles: Vec<Value> = authors
        .get(1)
        .unwrap()
        .get_relation("books")
        .unwrap()
        .as_many()
        .unwrap()
        .iter()
        .map(|b| b.get_column("title"))
        .collect();
    assert_eq!(titles, vec![Value::from("A"), Value::from("B")]);
    assert!(authors
        .get(0)
        .unwrap()
        .get_relation("books")
        .unwrap()
        .as_many()
        .unwrap()
        .is_empty());
    assert!(mock.statements()[0]
        .sql
        .contains(r#"ORDER BY "books"."title" ASC"#));
}

// ============================================================================
// Many-to-many
// ============================================================================

#[test]
fn test_pivot_columns_surface_on_related_records() {
    let mock = MockExecutor::register("eager_pivot");
    mock.append_query_result(vec![row([
        ("__table_books__key", Value::from(1)),
        ("id", Value::from(4)),
        ("label", Value::from("classic")),
        ("position", Value::from(1)),
    ])]);

    let collection = books("eager_pivot", &[(1, 10)]);
    collection.eager_load(&EagerLoad::new().path("tags")).unwrap();

    let book = collection.first().unwrap();
    let json = book.to_json();
    assert_eq!(
        json["tags"],
        serde_json::json!([{"id": 4, "label": "classic", "position": 1}])
    );
    assert!(mock.statements()[0]
        .sql
        .contains(r#""book_tags"."position""#));
}

#[test]
fn test_link_unlink_and_pivot_update() {
    let mock = MockExecutor::register("eager_link");
    let book = books("eager_link", &[(1, 10)]).first().unwrap().clone();

    let mut tags = book.belongs_to_many(tag(), "book_tags", "book_id", "tag_id").unwrap();
    tags.set_link_columns(&["position"]);

    assert!(tags.link(4).unwrap());
    assert!(tags.update(4, &row([("position", 2)])).unwrap());
    assert!(!tags.update(4, &row([("label", "x")])).unwrap());
    assert!(tags.unlink(4).unwrap());

    let sql: Vec<String> = mock.statements().into_iter().map(|s| s.sql).collect();
    assert_eq!(sql.len(), 3);
    assert!(sql[0].starts_with(r#"INSERT INTO "book_tags""#));
    assert!(sql[1].starts_with(r#"UPDATE "book_tags""#));
    assert!(sql[2].starts_with(r#"DELETE FROM "book_tags""#));
}

// ============================================================================
// Errors and lazy access
// ============================================================================

#[test]
fn test_unknown_relation_fails_before_any_query() {
    let mock = MockExecutor::register("eager_unknown");
    let collection = books("eager_unknown", &[(1, 10)]);

    let result = collection.eager_load(&EagerLoad::new().path("publisher"));
    assert!(matches!(
        result,
        Err(LifeError::InvalidRelation { ref relation, ref table })
            if relation == "publisher" && table == "books"
    ));
    assert_eq!(mock.query_count(), 0);
}

#[test]
fn test_engine_failure_propagates() {
    let mock = MockExecutor::register("eager_failure");
    mock.append_query_error("relation \"authors\" does not exist");
    let collection = books("eager_failure", &[(1, 10)]);

    let result = collection.eager_load(&EagerLoad::new().path("author"));
    assert!(matches!(result, Err(LifeError::Persistence(_))));
    assert!(!collection.first().unwrap().has_relation("author"));
}

#[test]
fn test_lazy_relation_access() {
    let mock = MockExecutor::register("eager_lazy");
    mock.append_query_result(vec![author_row(1, 10, "Le Guin", 100)]);
    let book = books("eager_lazy", &[(1, 10)]).first().unwrap().clone();

    let relation = book.relation("author").unwrap();
    assert!(!relation.returns_many());
    let author = relation.get_result().unwrap().unwrap();
    assert_eq!(author.get_column("name"), Value::from("Le Guin"));
    assert!(!book.has_relation("author"));
    assert_eq!(mock.statements()[0].params, vec![Value::Int(1)]);
}
