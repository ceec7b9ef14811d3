use books_etl::error::SyncError;
use books_etl::sanitize::{clean, normalize_column_name, normalize_columns};
use books_etl::table::{Table, Value};

#[test]
fn normalization_strips_everything_but_alphanumerics() {
    assert_eq!(normalize_column_name("Credit Note #"), "CreditNote");
    assert_eq!(normalize_column_name("balance_due"), "balancedue");
    assert_eq!(normalize_column_name("amount (INR)"), "amountINR");
    assert_eq!(normalize_column_name("plain"), "plain");
}

#[test]
fn colliding_normalized_names_are_rejected() {
    let columns = vec!["credit_note".to_string(), "credit-note".to_string()];
    let err = normalize_columns(&columns).unwrap_err();
    match err {
        SyncError::ColumnCollision { first, second, normalized } => {
            assert_eq!(first, "credit_note");
            assert_eq!(second, "credit-note");
            assert_eq!(normalized, "creditnote");
        }
        other => panic!("expected ColumnCollision, got {other:?}"),
    }
}

#[test]
fn fully_punctuated_name_is_rejected() {
    let columns = vec!["###".to_string()];
    assert!(matches!(
        normalize_columns(&columns),
        Err(SyncError::EmptyColumnName(_))
    ));
}

#[test]
fn clean_canonicalizes_null_equivalents() {
    let mut table = Table::new(vec!["a".to_string(), "b".to_string()]);
    table
        .push_row(vec![Value::Float(f64::NAN), Value::Text("NaN".to_string())])
        .unwrap();
    table
        .push_row(vec![Value::Float(1.5), Value::Text("kept".to_string())])
        .unwrap();

    let cleaned = clean(&table).unwrap();
    assert_eq!(cleaned.value(0, "a"), Some(&Value::Null));
    assert_eq!(cleaned.value(0, "b"), Some(&Value::Null));
    assert_eq!(cleaned.value(1, "a"), Some(&Value::Float(1.5)));
    assert_eq!(cleaned.value(1, "b"), Some(&Value::Text("kept".to_string())));
}

#[test]
fn clean_is_pure_and_preserves_shape() {
    let mut table = Table::new(vec!["Credit Note #".to_string(), "Amount".to_string()]);
    table
        .push_row(vec![Value::Text("CN-1".to_string()), Value::Float(f64::NAN)])
        .unwrap();

    let cleaned = clean(&table).unwrap();

    // Shape preserved, names normalized, order preserved.
    assert_eq!(cleaned.n_rows(), table.n_rows());
    assert_eq!(cleaned.n_columns(), table.n_columns());
    assert_eq!(cleaned.columns(), &["CreditNote".to_string(), "Amount".to_string()]);

    // Input untouched: original name and NaN still present.
    assert_eq!(table.columns()[0], "Credit Note #");
    match table.value(0, "Amount") {
        Some(Value::Float(f)) => assert!(f.is_nan()),
        other => panic!("input mutated: {other:?}"),
    }
}
