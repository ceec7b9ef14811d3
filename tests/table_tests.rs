use books_etl::error::SyncError;
use books_etl::table::{ColumnType, Table, Value};
use books_etl::textio;
use serde_json::json;

fn record(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

#[test]
fn push_row_rejects_arity_mismatch() {
    let mut table = Table::new(vec!["a".to_string(), "b".to_string()]);
    let err = table.push_row(vec![Value::Int(1)]).unwrap_err();
    assert!(matches!(err, SyncError::ArityMismatch { expected: 2, got: 1 }));
}

#[test]
fn from_records_uses_first_seen_order_and_fills_missing_keys() {
    let records = vec![
        record(json!({"id": 1, "name": "first"})),
        record(json!({"id": 2, "amount": 9.5})),
    ];
    let table = Table::from_records(&records);

    assert_eq!(
        table.columns(),
        &["id".to_string(), "name".to_string(), "amount".to_string()]
    );
    assert_eq!(table.value(0, "amount"), Some(&Value::Null));
    assert_eq!(table.value(1, "name"), Some(&Value::Null));
    assert_eq!(table.value(1, "amount"), Some(&Value::Float(9.5)));
}

#[test]
fn from_records_serializes_nested_structures_as_text() {
    let records = vec![record(json!({"branch": {"branch_name": "HQ"}}))];
    let table = Table::from_records(&records);
    assert_eq!(
        table.value(0, "branch"),
        Some(&Value::Text("{\"branch_name\":\"HQ\"}".to_string()))
    );
}

#[test]
fn rename_and_drop_reshape_columns() {
    let records = vec![record(json!({
        "creditnote_id": "cn-1",
        "bcy_total": 100,
        "currency_code": "INR"
    }))];
    let mut table = Table::from_records(&records);
    table.rename_columns(&[
        ("creditnote_id", "credit_note_id"),
        ("bcy_total", "credit_note_amount"),
        ("absent", "ignored"),
    ]);
    table.drop_columns(&["currency_code", "also_absent"]);

    assert_eq!(
        table.columns(),
        &["credit_note_id".to_string(), "credit_note_amount".to_string()]
    );
    assert_eq!(table.value(0, "credit_note_amount"), Some(&Value::Int(100)));
}

#[test]
fn select_columns_reorders_and_errors_on_missing() {
    let records = vec![record(json!({"a": 1, "b": 2, "c": 3}))];
    let table = Table::from_records(&records);

    let selected = table.select_columns(&["c", "a"]).unwrap();
    assert_eq!(selected.columns(), &["c".to_string(), "a".to_string()]);
    assert_eq!(selected.value(0, "c"), Some(&Value::Int(3)));

    assert!(table.select_columns(&["a", "missing"]).is_err());
}

#[test]
fn column_type_inference_widens_and_degrades() {
    let mut table = Table::new(vec![
        "ints".to_string(),
        "mixed_num".to_string(),
        "mixed".to_string(),
        "all_null".to_string(),
    ]);
    table
        .push_row(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::Null,
        ])
        .unwrap();
    table
        .push_row(vec![
            Value::Int(4),
            Value::Float(5.5),
            Value::Text("six".to_string()),
            Value::Null,
        ])
        .unwrap();

    assert_eq!(
        table.column_types(),
        vec![
            ColumnType::Int,
            ColumnType::Float,
            ColumnType::Text,
            ColumnType::Text,
        ]
    );
}

#[test]
fn csv_bounce_preserves_numeric_and_temporal_fidelity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bounce.csv");

    let ts = chrono::NaiveDate::from_ymd_opt(2024, 12, 6)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();
    let mut table = Table::new(vec![
        "count".to_string(),
        "amount".to_string(),
        "when".to_string(),
        "note".to_string(),
    ]);
    table
        .push_row(vec![
            Value::Int(42),
            Value::Float(1234.56),
            Value::Timestamp(ts),
            Value::Text("hello, world".to_string()),
        ])
        .unwrap();
    table
        .push_row(vec![Value::Null, Value::Null, Value::Null, Value::Null])
        .unwrap();

    textio::write_table(&path, &table).unwrap();
    let bounced = textio::read_table(&path).unwrap();

    assert_eq!(bounced.columns(), table.columns());
    assert_eq!(bounced.value(0, "count"), Some(&Value::Int(42)));
    assert_eq!(bounced.value(0, "amount"), Some(&Value::Float(1234.56)));
    assert_eq!(bounced.value(0, "when"), Some(&Value::Timestamp(ts)));
    assert_eq!(
        bounced.value(0, "note"),
        Some(&Value::Text("hello, world".to_string()))
    );
    assert_eq!(bounced.value(1, "count"), Some(&Value::Null));
    assert_eq!(bounced.value(1, "note"), Some(&Value::Null));
}

#[test]
fn csv_bounce_normalizes_numeric_looking_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bounce.csv");

    // The run's batch id is written as text but reads back as an integer,
    // matching how the ledger report's bounce settles types.
    let mut table = Table::new(vec!["batch_id".to_string()]);
    table
        .push_row(vec![Value::Text("20241206103000".to_string())])
        .unwrap();

    textio::write_table(&path, &table).unwrap();
    let bounced = textio::read_table(&path).unwrap();
    assert_eq!(bounced.value(0, "batch_id"), Some(&Value::Int(20241206103000)));
}
