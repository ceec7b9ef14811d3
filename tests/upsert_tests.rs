//! Warehouse upsert properties, exercised against a live Postgres named by
//! `TEST_DATABASE_URL`. Each test skips with a notice when no database is
//! reachable.

mod common;

use books_etl::table::{Table, Value};
use common::{drop_table, test_warehouse, unique_table};
use serial_test::serial;

fn sample_table(rows: &[(i64, &str, f64)]) -> Table {
    let mut table = Table::new(vec![
        "id".to_string(),
        "name".to_string(),
        "amount".to_string(),
    ]);
    for (id, name, amount) in rows {
        table
            .push_row(vec![
                Value::Int(*id),
                Value::Text(name.to_string()),
                Value::Float(*amount),
            ])
            .unwrap();
    }
    table
}

async fn create_keyed_table(warehouse: &books_etl::Warehouse, table: &str) {
    let sql = format!(
        "CREATE TABLE \"{table}\" (\
         \"id\" BIGINT PRIMARY KEY, \
         \"name\" TEXT, \
         \"amount\" DOUBLE PRECISION, \
         \"record_inserted\" TIMESTAMP NOT NULL DEFAULT NOW(), \
         \"record_updated\" TIMESTAMP NOT NULL DEFAULT NOW())"
    );
    sqlx::query(&sql).execute(warehouse.pool()).await.unwrap();
}

async fn count_rows(warehouse: &books_etl::Warehouse, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM \"{table}\"");
    let row: (i64,) = sqlx::query_as(&sql).fetch_one(warehouse.pool()).await.unwrap();
    row.0
}

#[tokio::test]
#[serial]
async fn upsert_is_idempotent_and_advances_only_record_updated() {
    let Some(warehouse) = test_warehouse().await else { return };
    let table_name = unique_table("idempotence");
    create_keyed_table(&warehouse, &table_name).await;

    let data = sample_table(&[(1, "one", 1.0), (2, "two", 2.0), (3, "three", 3.0)]);

    warehouse.upsert(&table_name, &data, Some("id")).await.unwrap();
    let sql = format!(
        "SELECT MAX(\"record_inserted\"), MAX(\"record_updated\") FROM \"{table_name}\""
    );
    let first: (chrono::NaiveDateTime, chrono::NaiveDateTime) =
        sqlx::query_as(&sql).fetch_one(warehouse.pool()).await.unwrap();

    // Let the clock move before the second application.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    warehouse.upsert(&table_name, &data, Some("id")).await.unwrap();
    let second: (chrono::NaiveDateTime, chrono::NaiveDateTime) =
        sqlx::query_as(&sql).fetch_one(warehouse.pool()).await.unwrap();

    assert_eq!(count_rows(&warehouse, &table_name).await, 3);
    assert_eq!(first.0, second.0, "record_inserted must not change");
    assert!(second.1 > first.1, "record_updated must advance");

    drop_table(&warehouse, &table_name).await;
}

#[tokio::test]
#[serial]
async fn final_state_is_independent_of_batch_size() {
    let Some(warehouse) = test_warehouse().await else { return };
    let small = unique_table("chunk_small");
    let large = unique_table("chunk_large");
    create_keyed_table(&warehouse, &small).await;
    create_keyed_table(&warehouse, &large).await;

    let rows: Vec<(i64, String, f64)> = (0..25)
        .map(|i| (i, format!("row{i}"), i as f64 / 2.0))
        .collect();
    let borrowed: Vec<(i64, &str, f64)> =
        rows.iter().map(|(i, s, f)| (*i, s.as_str(), *f)).collect();
    let data = sample_table(&borrowed);

    warehouse
        .upsert_batched(&small, &data, Some("id"), 4)
        .await
        .unwrap();
    warehouse
        .upsert_batched(&large, &data, Some("id"), 1000)
        .await
        .unwrap();

    let sql = |t: &str| {
        format!("SELECT \"id\", \"name\", \"amount\" FROM \"{t}\" ORDER BY \"id\"")
    };
    let from_small: Vec<(i64, String, f64)> = sqlx::query_as(&sql(&small))
        .fetch_all(warehouse.pool())
        .await
        .unwrap();
    let from_large: Vec<(i64, String, f64)> = sqlx::query_as(&sql(&large))
        .fetch_all(warehouse.pool())
        .await
        .unwrap();

    assert_eq!(from_small.len(), 25);
    assert_eq!(from_small, from_large);

    drop_table(&warehouse, &small).await;
    drop_table(&warehouse, &large).await;
}

#[tokio::test]
#[serial]
async fn null_equivalents_persist_as_genuine_nulls() {
    let Some(warehouse) = test_warehouse().await else { return };
    let table_name = unique_table("nulls");
    create_keyed_table(&warehouse, &table_name).await;

    let mut data = Table::new(vec![
        "id".to_string(),
        "name".to_string(),
        "amount".to_string(),
    ]);
    data.push_row(vec![
        Value::Int(1),
        Value::Text("NaN".to_string()),
        Value::Float(f64::NAN),
    ])
    .unwrap();
    data.push_row(vec![Value::Int(2), Value::Null, Value::Float(2.5)])
        .unwrap();

    warehouse.upsert(&table_name, &data, Some("id")).await.unwrap();

    let sql = format!(
        "SELECT COUNT(*) FROM \"{table_name}\" WHERE \"name\" IS NULL OR \"amount\" IS NULL"
    );
    let row: (i64,) = sqlx::query_as(&sql).fetch_one(warehouse.pool()).await.unwrap();
    assert_eq!(row.0, 2, "NaN text and NaN float must both persist as NULL");

    let sql = format!("SELECT COUNT(*) FROM \"{table_name}\" WHERE \"name\" = 'NaN'");
    let row: (i64,) = sqlx::query_as(&sql).fetch_one(warehouse.pool()).await.unwrap();
    assert_eq!(row.0, 0);

    drop_table(&warehouse, &table_name).await;
}

#[tokio::test]
#[serial]
async fn missing_table_fallback_creates_and_fills_the_table() {
    let Some(warehouse) = test_warehouse().await else { return };
    let table_name = unique_table("fallback");
    drop_table(&warehouse, &table_name).await;

    let mut data = Table::new(vec!["Credit Note #".to_string(), "amount".to_string()]);
    data.push_row(vec![Value::Text("CN-1".to_string()), Value::Float(10.0)])
        .unwrap();
    data.push_row(vec![Value::Text("CN-2".to_string()), Value::Float(20.0)])
        .unwrap();

    let outcome = warehouse.upsert(&table_name, &data, None).await.unwrap();
    assert_eq!(outcome.rows_affected, 2);

    // Created table carries the input columns plus both audit columns, and
    // the punctuated display name survives unchanged.
    let columns: Vec<(String,)> = sqlx::query_as(
        "SELECT column_name FROM information_schema.columns \
         WHERE table_name = $1 ORDER BY ordinal_position",
    )
    .bind(&table_name)
    .fetch_all(warehouse.pool())
    .await
    .unwrap();
    let names: Vec<&str> = columns.iter().map(|(n,)| n.as_str()).collect();
    assert_eq!(
        names,
        vec!["Credit Note #", "amount", "record_inserted", "record_updated"]
    );
    assert_eq!(count_rows(&warehouse, &table_name).await, 2);

    drop_table(&warehouse, &table_name).await;
}

#[tokio::test]
#[serial]
async fn empty_input_is_a_no_op_without_ddl() {
    let Some(warehouse) = test_warehouse().await else { return };
    let table_name = unique_table("empty");
    drop_table(&warehouse, &table_name).await;

    let data = Table::new(vec!["id".to_string(), "name".to_string()]);
    let outcome = warehouse.upsert(&table_name, &data, Some("id")).await.unwrap();
    assert_eq!(outcome.rows_affected, 0);

    let row: (Option<String>,) = sqlx::query_as("SELECT to_regclass($1)::text")
        .bind(format!("\"{table_name}\""))
        .fetch_one(warehouse.pool())
        .await
        .unwrap();
    assert!(row.0.is_none(), "empty input must not create the table");
}

#[tokio::test]
#[serial]
async fn chunks_before_a_failure_stay_committed() {
    let Some(warehouse) = test_warehouse().await else { return };
    let table_name = unique_table("partial");
    let sql = format!(
        "CREATE TABLE \"{table_name}\" (\
         \"id\" BIGINT PRIMARY KEY, \
         \"name\" TEXT, \
         \"amount\" DOUBLE PRECISION CHECK (\"amount\" >= 0), \
         \"record_inserted\" TIMESTAMP NOT NULL DEFAULT NOW(), \
         \"record_updated\" TIMESTAMP NOT NULL DEFAULT NOW())"
    );
    sqlx::query(&sql).execute(warehouse.pool()).await.unwrap();

    // Six rows, two per chunk; the violating row lands in the third chunk.
    let data = sample_table(&[
        (1, "a", 1.0),
        (2, "b", 2.0),
        (3, "c", 3.0),
        (4, "d", 4.0),
        (5, "e", -5.0),
        (6, "f", 6.0),
    ]);

    let result = warehouse.upsert_batched(&table_name, &data, Some("id"), 2).await;
    assert!(result.is_err(), "the call must report failure");

    assert_eq!(
        count_rows(&warehouse, &table_name).await,
        4,
        "chunks before the failing one stay committed"
    );

    drop_table(&warehouse, &table_name).await;
}

#[tokio::test]
#[serial]
async fn extract_data_returns_columns_even_for_empty_results() {
    let Some(warehouse) = test_warehouse().await else { return };

    let table = warehouse
        .extract_data("SELECT 1 AS \"one\", 'x' AS \"label\" WHERE false")
        .await
        .unwrap();
    assert!(table.is_empty());
    assert_eq!(table.columns(), &["one".to_string(), "label".to_string()]);

    let table = warehouse
        .extract_data("SELECT 7 AS \"seven\", 'hi' AS \"greeting\"")
        .await
        .unwrap();
    assert_eq!(table.n_rows(), 1);
    assert_eq!(table.value(0, "seven"), Some(&Value::Int(7)));
    assert_eq!(table.value(0, "greeting"), Some(&Value::Text("hi".to_string())));
}

#[tokio::test]
#[serial]
async fn execute_accepts_percent_style_placeholders() {
    let Some(warehouse) = test_warehouse().await else { return };
    let table_name = unique_table("executor");
    create_keyed_table(&warehouse, &table_name).await;

    let insert = format!(
        "INSERT INTO \"{table_name}\" (\"id\", \"name\", \"amount\") \
         VALUES (%(id)s, %(name)s, %(amount)s)"
    );
    let result = warehouse
        .execute(
            &insert,
            &[
                ("id", Value::Int(1)),
                ("name", Value::Text("bound".to_string())),
                ("amount", Value::Float(3.5)),
            ],
        )
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 1);

    drop_table(&warehouse, &table_name).await;
}
