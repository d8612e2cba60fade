//! Per-customer rollups, broadcast back onto every row.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::audit::StageReport;
use crate::types::{DataSet, DataType, Field, Value};

use super::normalize::{normalize_currency, value_identifier};

/// Broadcast column holding the customer's total debt.
pub const TOTAL_DEBT_COLUMN: &str = "valordivida";
/// Broadcast column holding the customer's distinct service-point count.
pub const SERVICE_POINT_COUNT_COLUMN: &str = "quantidade_uc_por_cpf";
/// Broadcast column listing the customer's distinct service points.
pub const SERVICE_POINT_LIST_COLUMN: &str = "ucs_do_cpf";

const STAGE: &str = "aggregate";

/// Compute `total_debt` and distinct service-point rollups per customer key and broadcast
/// them onto every row sharing that key, including invoice-level duplicates still present
/// before deduplication.
///
/// Summation is order-independent; amounts that fail to parse contribute nothing. If the key
/// column is absent the stage skips; if only one of the two source columns is absent the
/// other rollup is still computed and the skip is noted in the report.
pub fn aggregate(
    ds: &DataSet,
    key: &str,
    amount: &str,
    service_point: &str,
) -> (DataSet, StageReport) {
    let Some(key_idx) = ds.column_index(key) else {
        let reason = format!("key column '{key}' not found");
        warn!(stage = STAGE, %reason);
        return (ds.clone(), StageReport::skipped(STAGE, ds.row_count(), reason));
    };

    let row_keys: Vec<Option<String>> = ds
        .rows
        .iter()
        .map(|row| value_identifier(&row[key_idx]))
        .collect();

    let mut out = ds.clone();
    let mut notes: Vec<String> = Vec::new();

    match ds.column_index(amount) {
        Some(amount_idx) => {
            let mut totals: HashMap<&str, f64> = HashMap::new();
            for (row, row_key) in ds.rows.iter().zip(&row_keys) {
                let Some(k) = row_key else { continue };
                if let Some(v) = cell_amount(&row[amount_idx]) {
                    *totals.entry(k.as_str()).or_insert(0.0) += v;
                }
            }
            let values = row_keys
                .iter()
                .map(|k| match k {
                    Some(k) => Value::Float64(totals.get(k.as_str()).copied().unwrap_or(0.0)),
                    None => Value::Null,
                })
                .collect();
            out = out.with_column(Field::new(TOTAL_DEBT_COLUMN, DataType::Float64), values);
        }
        None => notes.push(format!("amount column '{amount}' not found, total debt skipped")),
    }

    match ds.column_index(service_point) {
        Some(sp_idx) => {
            // Distinct service points per key, in first-seen order.
            let mut points: HashMap<&str, Vec<String>> = HashMap::new();
            for (row, row_key) in ds.rows.iter().zip(&row_keys) {
                let Some(k) = row_key else { continue };
                let Some(sp) = row[sp_idx].to_text() else { continue };
                let sp = sp.trim().to_string();
                if sp.is_empty() {
                    continue;
                }
                let list = points.entry(k.as_str()).or_default();
                if !list.contains(&sp) {
                    list.push(sp);
                }
            }
            let counts = row_keys
                .iter()
                .map(|k| match k {
                    Some(k) => Value::Int64(
                        points.get(k.as_str()).map(|l| l.len()).unwrap_or(0) as i64,
                    ),
                    None => Value::Null,
                })
                .collect();
            let lists = row_keys
                .iter()
                .map(|k| match k {
                    Some(k) => Value::Utf8(
                        points
                            .get(k.as_str())
                            .map(|l| l.join(", "))
                            .unwrap_or_default(),
                    ),
                    None => Value::Null,
                })
                .collect();
            out = out.with_column(
                Field::new(SERVICE_POINT_COUNT_COLUMN, DataType::Int64),
                counts,
            );
            out = out.with_column(
                Field::new(SERVICE_POINT_LIST_COLUMN, DataType::Utf8),
                lists,
            );
        }
        None => notes.push(format!(
            "service-point column '{service_point}' not found, rollup skipped"
        )),
    }

    let customers = row_keys.iter().flatten().collect::<std::collections::HashSet<_>>();
    let mut message = format!("rollups broadcast for {} customers", customers.len());
    if !notes.is_empty() {
        message = format!("{message} ({})", notes.join("; "));
    }
    info!(stage = STAGE, customers = customers.len(), %message);
    let report = StageReport::applied(STAGE, ds.row_count(), out.row_count(), message);
    (out, report)
}

/// Numeric amount of a cell; text falls back to decimal-comma parsing.
fn cell_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Utf8(s) => normalize_currency(s),
        other => other.as_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::StageOutcome;
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    fn utf8(s: &str) -> Value {
        Value::Utf8(s.to_string())
    }

    fn invoices() -> DataSet {
        DataSet::new(
            Schema::new(vec![
                Field::new("ncpf", DataType::Utf8),
                Field::new("liquido", DataType::Float64),
                Field::new("ucv", DataType::Utf8),
            ]),
            vec![
                vec![utf8("111"), Value::Float64(100.5), utf8("u1")],
                vec![utf8("111"), Value::Float64(49.5), utf8("u2")],
                vec![utf8("111"), Value::Float64(50.0), utf8("u1")],
                vec![utf8("222"), Value::Float64(10.0), utf8("u9")],
            ],
        )
    }

    #[test]
    fn totals_and_service_points_are_broadcast_to_all_rows() {
        let (out, _) = aggregate(&invoices(), "ncpf", "liquido", "ucv");
        // Every row of customer 111 carries identical aggregates.
        for row in 0..3 {
            assert_eq!(
                out.value(row, TOTAL_DEBT_COLUMN),
                Some(&Value::Float64(200.0))
            );
            assert_eq!(
                out.value(row, SERVICE_POINT_COUNT_COLUMN),
                Some(&Value::Int64(2))
            );
            assert_eq!(
                out.text(row, SERVICE_POINT_LIST_COLUMN),
                Some("u1, u2".to_string())
            );
        }
        assert_eq!(out.value(3, TOTAL_DEBT_COLUMN), Some(&Value::Float64(10.0)));
        assert_eq!(
            out.value(3, SERVICE_POINT_COUNT_COLUMN),
            Some(&Value::Int64(1))
        );
    }

    #[test]
    fn unparseable_and_null_amounts_contribute_nothing() {
        let ds = DataSet::new(
            Schema::new(vec![
                Field::new("ncpf", DataType::Utf8),
                Field::new("liquido", DataType::Utf8),
                Field::new("ucv", DataType::Utf8),
            ]),
            vec![
                vec![utf8("111"), utf8("1.234,56"), utf8("u1")],
                vec![utf8("111"), utf8("??"), utf8("u1")],
                vec![utf8("111"), Value::Null, utf8("u1")],
            ],
        );
        let (out, _) = aggregate(&ds, "ncpf", "liquido", "ucv");
        assert_eq!(
            out.value(0, TOTAL_DEBT_COLUMN),
            Some(&Value::Float64(1234.56))
        );
    }

    #[test]
    fn missing_amount_column_still_computes_service_points() {
        let ds = invoices();
        let (out, report) = aggregate(&ds, "ncpf", "missing_amount", "ucv");
        assert!(!out.has_column(TOTAL_DEBT_COLUMN));
        assert!(out.has_column(SERVICE_POINT_COUNT_COLUMN));
        assert!(report.message.contains("total debt skipped"));
    }

    #[test]
    fn missing_key_column_skips() {
        let (out, report) = aggregate(&invoices(), "document_id", "liquido", "ucv");
        assert_eq!(out, invoices());
        assert_eq!(report.outcome, StageOutcome::Skipped);
    }
}
