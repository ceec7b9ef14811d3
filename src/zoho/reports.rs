//! The five report jobs: fetch, flatten, reshape, persist.
//!
//! Each job pulls its report page by page, flattens the JSON payload into a
//! [`Table`], applies the report-specific renames and drops, stamps the run's
//! batch id, and hands the result to the warehouse. A failing report is
//! logged and the run continues with the next one; only the per-report
//! reshaping differs, the persistence contract is the same for all five.

use chrono::Local;
use serde_json::Value as JsonValue;
use tracing::{error, info};

use crate::constants::zoho::AGING_PER_PAGE;
use crate::error::{Result, SyncError};
use crate::table::{Table, Value};
use crate::textio;
use crate::warehouse::Warehouse;
use crate::zoho::ZohoClient;

/// Run all five reports sequentially. Failures are logged per report and do
/// not stop the run.
pub async fn run_all(client: &ZohoClient, warehouse: &Warehouse) {
    // Batch id uniquely identifying the records of this run.
    let batch_id = Local::now().format("%Y%m%d%H%M%S").to_string();

    let reports: [(&str, ReportFn); 5] = [
        ("creditnotedetails", credit_note_details),
        ("vendorcreditdetails", vendor_credit_details),
        ("aragingdetails", ar_aging_details),
        ("apagingdetails", ap_aging_details),
        ("generalledgerdetails", general_ledger_details),
    ];

    for (name, job) in reports {
        match job(client, warehouse, &batch_id).await {
            Ok(()) => info!(report = name, "done"),
            Err(e) => error!(report = name, error = %e, "report failed, continuing"),
        }
    }
}

type ReportFn = for<'a> fn(
    &'a ZohoClient,
    &'a Warehouse,
    &'a str,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;

fn credit_note_details<'a>(
    client: &'a ZohoClient,
    warehouse: &'a Warehouse,
    batch_id: &'a str,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let records = client
            .fetch_report_pages("creditnotedetails", &[], |data| {
                records_at(data, &["creditnote_details"], Some(0), "creditnotes")
            })
            .await?;

        let mut table = Table::from_records(&records);
        table.rename_columns(&[
            ("date", "credit_date"),
            ("bcy_total", "credit_note_amount"),
            ("bcy_balance", "balance_amount"),
            ("creditnote_id", "credit_note_id"),
            ("creditnote_number", "credit_note_number"),
        ]);
        table.drop_columns(&[
            "currency_code",
            "sales_person_id",
            "associated_projects",
            "project_names",
            "contact",
            "invoice",
            "branch",
            "reference_number",
            "txn_posting_date",
        ]);
        table.add_constant_column("batch_id", Value::Text(batch_id.to_string()));

        warehouse.upsert("credit_note_details", &table, None).await?;
        Ok(())
    })
}

fn vendor_credit_details<'a>(
    client: &'a ZohoClient,
    warehouse: &'a Warehouse,
    batch_id: &'a str,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let params = params(&[("usestate", "true"), ("response_option", "1")]);
        let records = client
            .fetch_report_pages("vendorcreditdetails", &params, |data| {
                records_at(data, &["vendor_credit_details"], Some(0), "vendor_credits")
            })
            .await?;

        let mut table = Table::from_records(&records);
        table.rename_columns(&[
            ("vendor_credit_number", "credit_note"),
            ("date", "vendor_credit_date"),
            ("bcy_total", "amount"),
            ("bcy_balance", "balance_amount"),
        ]);
        table.drop_columns(&[
            "currency_id",
            "vendor",
            "has_attachment",
            "branch",
            "txn_posting_date",
            "reference_number",
        ]);
        table.add_constant_column("batch_id", Value::Text(batch_id.to_string()));

        warehouse.upsert("vendor_credit_details", &table, None).await?;
        Ok(())
    })
}

fn ar_aging_details<'a>(
    client: &'a ZohoClient,
    warehouse: &'a Warehouse,
    batch_id: &'a str,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let per_page = AGING_PER_PAGE.to_string();
        let params = params(&[
            ("per_page", &per_page),
            ("sort_order", "A"),
            ("sort_column", "date"),
            ("interval_range", "15"),
            ("number_of_columns", "4"),
            ("interval_type", "days"),
            ("group_by", "none"),
            ("filter_by", "InvoiceDueDate.Today"),
            ("entity_list", "invoice"),
            ("is_new_flow", "true"),
            ("response_option", "1"),
        ]);
        let records = client
            .fetch_report_pages("aragingdetails", &params, |data| {
                records_at(data, &["invoiceaging"], Some(0), "invoiceaging")
            })
            .await?;

        let mut table = Table::from_records(&records);
        table.rename_columns(&[("entity", "type"), ("balance", "balance_due")]);
        table.drop_columns(&["payment_expected_date", "contact"]);

        backfill_age(&mut table);

        let mut table = table.select_columns(&[
            "entity_id",
            "date",
            "amount",
            "exchange_rate",
            "reminders_sent",
            "currency_code",
            "balance_due",
            "transaction_number",
            "customer_name",
            "customer_id",
            "type",
            "age",
            "status",
        ])?;
        table.add_constant_column("batch_id", Value::Text(batch_id.to_string()));

        warehouse.upsert("ar_aging_details", &table, None).await?;
        Ok(())
    })
}

fn ap_aging_details<'a>(
    client: &'a ZohoClient,
    warehouse: &'a Warehouse,
    batch_id: &'a str,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let per_page = AGING_PER_PAGE.to_string();
        let select_columns = r#"[{"field":"date","group":"report"},{"field":"transaction_number","group":"report"},{"field":"entity","group":"report"},{"field":"status","group":"report"},{"field":"vendor_name","group":"report"},{"field":"age","group":"report"},{"field":"amount","group":"report"},{"field":"balance","group":"report"},{"field":"due_date","group":"report"}]"#;
        let params = params(&[
            ("per_page", &per_page),
            ("sort_order", "A"),
            ("sort_column", "date"),
            ("aging_by", "billduedate"),
            ("interval_range", "15"),
            ("number_of_columns", "4"),
            ("interval_type", "days"),
            ("group_by", "none"),
            ("include_vendor_credit_notes", "false"),
            ("select_columns", select_columns),
            ("include_manual_journals", "false"),
            ("response_option", "1"),
        ]);
        let records = client
            .fetch_report_pages("apagingdetails", &params, |data| {
                // Bills aging nests its rows two group levels deep.
                let groups = data
                    .get("billsaging")
                    .and_then(|v| v.get("group_list"))
                    .and_then(JsonValue::as_array)
                    .and_then(|l| l.first())
                    .and_then(|v| v.get("group_list"))
                    .and_then(JsonValue::as_array)
                    .and_then(|l| l.first())
                    .and_then(|v| v.get("group_list"))
                    .and_then(JsonValue::as_array)
                    .ok_or_else(|| {
                        SyncError::MalformedReport("billsaging group_list missing".into())
                    })?;
                as_records(groups)
            })
            .await?;

        let mut table = Table::from_records(&records);
        table.rename_columns(&[
            ("amount", "bill_amount"),
            ("balance", "balance_due"),
            ("id", "ap_aging_id"),
            ("entity", "type"),
        ]);

        backfill_age(&mut table);
        table.add_constant_column("batch_id", Value::Text(batch_id.to_string()));

        warehouse
            .upsert("ap_aging_details", &table, Some("ap_aging_id"))
            .await?;
        Ok(())
    })
}

fn general_ledger_details<'a>(
    client: &'a ZohoClient,
    warehouse: &'a Warehouse,
    batch_id: &'a str,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let params = params(&[("usestate", "true"), ("response_option", "0")]);

        // One pass collects both the per-transaction rows and the per-group
        // opening/closing balance summaries.
        let mut detail_records: Vec<serde_json::Map<String, JsonValue>> = Vec::new();
        let mut group_records: Vec<serde_json::Map<String, JsonValue>> = Vec::new();

        client
            .fetch_report_pages("generalledgerdetails", &params, |data| {
                let accounts = data
                    .get("account_transactions")
                    .and_then(JsonValue::as_array)
                    .ok_or_else(|| {
                        SyncError::MalformedReport("account_transactions missing".into())
                    })?;

                let mut details = Vec::new();
                let mut groups = Vec::new();
                for account in accounts {
                    let group_name = account
                        .get("group_name")
                        .cloned()
                        .unwrap_or(JsonValue::Null);

                    if let Some(transactions) = account
                        .get("account_transactions")
                        .and_then(JsonValue::as_array)
                    {
                        for txn in transactions {
                            if let JsonValue::Object(map) = txn {
                                let mut record = map.clone();
                                record.insert("group_id".to_string(), group_name.clone());
                                details.push(record);
                            }
                        }
                    }

                    let mut summary = serde_json::Map::new();
                    summary.insert("group_id".to_string(), group_name);
                    for (side, key) in [("opening", "opening_balance"), ("closing", "closing_balance")] {
                        let balance = account.get(key).cloned().unwrap_or(JsonValue::Null);
                        summary.insert(
                            format!("{side}_debit"),
                            balance.get("debit").cloned().unwrap_or(JsonValue::Null),
                        );
                        summary.insert(
                            format!("{side}_credit"),
                            balance.get("credit").cloned().unwrap_or(JsonValue::Null),
                        );
                        summary.insert(
                            format!("{side}_date"),
                            balance.get("date").cloned().unwrap_or(JsonValue::Null),
                        );
                    }
                    groups.push(summary);
                }

                detail_records.extend(details);
                group_records.extend(groups);
                Ok(Vec::new())
            })
            .await?;

        persist_ledger_groups(warehouse, group_records, batch_id).await?;
        persist_ledger_details(warehouse, detail_records, batch_id).await?;
        Ok(())
    })
}

async fn persist_ledger_groups(
    warehouse: &Warehouse,
    records: Vec<serde_json::Map<String, JsonValue>>,
    batch_id: &str,
) -> Result<()> {
    let mut table = Table::from_records(&records);

    // Balance dates arrive as "As On dd-mm-yy"; strip the prefix and reshape.
    for column in ["opening_date", "closing_date"] {
        table.map_column(column, |v| match v {
            Value::Text(s) => {
                let raw = s.strip_prefix("As On ").unwrap_or(s.as_str());
                match chrono::NaiveDate::parse_from_str(raw, "%d-%m-%y") {
                    Ok(date) => Value::Text(date.format("%y/%m/%d").to_string()),
                    Err(_) => Value::Text(raw.to_string()),
                }
            }
            other => other.clone(),
        })?;
    }

    for column in ["opening_debit", "opening_credit", "closing_debit", "closing_credit"] {
        table.map_column(column, coerce_numeric)?;
    }
    table.add_constant_column("batch_id", Value::Text(batch_id.to_string()));

    let table = csv_bounce(&table)?;
    warehouse.upsert("general_ledger_groups", &table, None).await?;
    Ok(())
}

async fn persist_ledger_details(
    warehouse: &Warehouse,
    mut records: Vec<serde_json::Map<String, JsonValue>>,
    batch_id: &str,
) -> Result<()> {
    // Flatten the nested objects and composite fields before tabulating.
    for record in &mut records {
        let branch_name = record
            .get("branch")
            .and_then(|b| b.get("branch_name"))
            .cloned()
            .unwrap_or(JsonValue::Null);
        record.insert("branch_name".to_string(), branch_name);

        let account_group = record
            .get("account")
            .and_then(|a| a.get("account_group"))
            .cloned()
            .unwrap_or(JsonValue::Null);
        record.insert("account_group".to_string(), account_group);

        // net_amount is "1,234.56 INR"; split into amount and currency.
        let net_amount = record
            .get("net_amount")
            .and_then(JsonValue::as_str)
            .unwrap_or("")
            .to_string();
        let mut parts = net_amount.splitn(2, ' ');
        let amount = parts.next().unwrap_or("").to_string();
        let currency = parts.next().unwrap_or(&net_amount).to_string();
        record.insert("amount".to_string(), JsonValue::String(amount));
        record.insert("currency".to_string(), JsonValue::String(currency));
    }

    let mut table = Table::from_records(&records);
    table.drop_columns(&[
        "branch",
        "project_ids",
        "account",
        "reference_transaction_id",
        "reporting_tag",
        "net_amount",
        "contact_id",
    ]);
    table.rename_columns(&[
        ("account_name", "account"),
        ("entity_number", "transaction_number"),
    ]);

    for column in ["amount", "debit", "credit"] {
        table.map_column(column, coerce_numeric)?;
    }
    table.add_constant_column("batch_id", Value::Text(batch_id.to_string()));

    let table = csv_bounce(&table)?;
    warehouse.upsert("general_ledger_details", &table, None).await?;
    Ok(())
}

/// Write the table to a temp CSV and read it back, letting type inference
/// settle the mixed types the payload reshaping leaves behind.
fn csv_bounce(table: &Table) -> Result<Table> {
    let dir = std::env::temp_dir().join("books-etl");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("temp.csv");
    textio::write_table(&path, table)?;
    textio::read_table(&path)
}

/// Empty strings become zero; comma grouping is stripped; whatever still does
/// not parse as a number is left as-is for the column to settle as text.
fn coerce_numeric(value: &Value) -> Value {
    match value {
        Value::Text(s) => {
            if s.is_empty() {
                return Value::Float(0.0);
            }
            let stripped = s.replace(',', "");
            match stripped.parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => value.clone(),
            }
        }
        Value::Int(i) => Value::Float(*i as f64),
        other => other.clone(),
    }
}

/// Some ledger rows predate aging and carry an empty or missing age; the
/// 2020-03-31 opening-balance rows get their known fixed age.
fn backfill_age(table: &mut Table) {
    let Some(date_idx) = table.column_index("date") else { return };
    let Some(age_idx) = table.column_index("age") else { return };
    table.for_each_row_mut(|_, row| {
        if row[date_idx] == Value::Text("2020-03-31".to_string()) {
            row[age_idx] = Value::Int(1653);
        } else if row[age_idx] == Value::Text(String::new()) {
            row[age_idx] = Value::Int(0);
        }
    });
}

fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Navigate `data[key][index][leaf]` and return the record list found there.
fn records_at(
    data: &JsonValue,
    path: &[&str],
    index: Option<usize>,
    leaf: &str,
) -> Result<Vec<serde_json::Map<String, JsonValue>>> {
    let mut cursor = data;
    for key in path {
        cursor = cursor
            .get(key)
            .ok_or_else(|| SyncError::MalformedReport(format!("missing key `{key}`")))?;
    }
    if let Some(i) = index {
        cursor = cursor
            .get(i)
            .ok_or_else(|| SyncError::MalformedReport(format!("missing element {i}")))?;
    }
    let records = cursor
        .get(leaf)
        .and_then(JsonValue::as_array)
        .ok_or_else(|| SyncError::MalformedReport(format!("missing record list `{leaf}`")))?;
    as_records(records)
}

fn as_records(values: &[JsonValue]) -> Result<Vec<serde_json::Map<String, JsonValue>>> {
    values
        .iter()
        .map(|v| match v {
            JsonValue::Object(map) => Ok(map.clone()),
            other => Err(SyncError::MalformedReport(format!(
                "expected object record, got {other}"
            ))),
        })
        .collect()
}
