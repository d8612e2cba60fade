//! Robot master table.
//!
//! The dialer consumes one row per customer with up to three open invoices pivoted into
//! fixed slots, oldest due date first. Built from the robot channel after layout mapping, so
//! customer-level columns carry their export names while invoice-level columns keep their
//! source names.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::audit::StageReport;
use crate::config::RobotConfig;
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::normalize::{format_currency_br, normalize_currency};

/// Invoice slots pivoted per customer.
pub const INVOICE_SLOTS: usize = 3;

const STAGE: &str = "robot-master";

/// Pivot the robot channel into the per-customer master table.
///
/// Rows are grouped by the customer column in first-seen order; within a group invoices sort
/// by parsed due date ascending with unparseable dates last, and the oldest
/// [`INVOICE_SLOTS`] fill the `vencimento_0N`/`valor_0N`/`codigo_barras_0N` slots. Customer
/// level columns come from the group's first row; unfilled slots stay blank. Every row also
/// carries the configured constant payment profile.
pub fn build_robot_master(ds: &DataSet, cfg: &RobotConfig) -> (DataSet, StageReport) {
    let Some(customer_idx) = ds.column_index(&cfg.customer_column) else {
        let reason = format!("column '{}' not found in robot channel", cfg.customer_column);
        warn!(stage = STAGE, %reason);
        return (
            empty_master(cfg),
            StageReport::skipped(STAGE, ds.row_count(), reason),
        );
    };

    let name_idx = ds.column_index(&cfg.name_column);
    let product_idx = ds.column_index(&cfg.product_column);
    let installments_idx = ds.column_index(&cfg.installments_column);
    let debt_idx = ds.column_index(&cfg.debt_column);
    let due_idx = ds.column_index(&cfg.due_date_column);
    let amount_idx = ds.column_index(&cfg.amount_column);
    let barcode_idx = ds.column_index(&cfg.barcode_column);
    let just_idx = ds.column_index(&cfg.justification_column);
    let phone_idxs: Vec<Option<usize>> = cfg
        .phone_columns
        .iter()
        .map(|c| ds.column_index(c))
        .collect();

    // Row indices per customer, first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<usize>> =
        std::collections::HashMap::new();
    for (idx, row) in ds.rows.iter().enumerate() {
        let Some(customer) = row[customer_idx].to_text() else {
            continue;
        };
        let customer = customer.trim().to_string();
        if customer.is_empty() {
            continue;
        }
        if !groups.contains_key(&customer) {
            order.push(customer.clone());
        }
        groups.entry(customer).or_default().push(idx);
    }

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(order.len());
    for customer in &order {
        let mut invoices = groups[customer].clone();
        invoices.sort_by_key(|&i| {
            let parsed = due_idx.and_then(|d| parse_due_date(&ds.rows[i][d], &cfg.date_format));
            // None sorts after every real date.
            (parsed.is_none(), parsed)
        });

        let first = &ds.rows[invoices[0]];
        let mut row: Vec<Value> = vec![
            Value::Utf8(customer.clone()),
            text_cell(first, name_idx),
            text_cell(first, product_idx),
            text_cell(first, installments_idx),
            Value::Utf8(render_amount(first, debt_idx)),
        ];
        for phone_idx in &phone_idxs {
            row.push(text_cell(first, *phone_idx));
        }
        row.push(Value::Utf8(cfg.payment_profile.clone()));
        row.push(text_cell(first, just_idx));

        for slot in 0..INVOICE_SLOTS {
            match invoices.get(slot) {
                Some(&i) => {
                    let invoice = &ds.rows[i];
                    row.push(Value::Utf8(render_due_date(
                        invoice,
                        due_idx,
                        &cfg.date_format,
                    )));
                    row.push(Value::Utf8(render_amount(invoice, amount_idx)));
                    row.push(text_cell(invoice, barcode_idx));
                }
                None => {
                    row.push(Value::Utf8(String::new()));
                    row.push(Value::Utf8(String::new()));
                    row.push(Value::Utf8(String::new()));
                }
            }
        }
        rows.push(row);
    }

    let out = DataSet::new(master_schema(cfg), rows);
    let message = format!(
        "{} customers pivoted from {} invoices",
        out.row_count(),
        ds.row_count()
    );
    info!(stage = STAGE, customers = out.row_count(), %message);
    let report = StageReport::applied(STAGE, ds.row_count(), out.row_count(), message);
    (out, report)
}

fn master_schema(cfg: &RobotConfig) -> Schema {
    let mut fields = vec![
        Field::new(cfg.customer_column.clone(), DataType::Utf8),
        Field::new(cfg.name_column.clone(), DataType::Utf8),
        Field::new(cfg.product_column.clone(), DataType::Utf8),
        Field::new(cfg.installments_column.clone(), DataType::Utf8),
        Field::new(cfg.debt_column.clone(), DataType::Utf8),
    ];
    for phone in &cfg.phone_columns {
        fields.push(Field::new(phone.clone(), DataType::Utf8));
    }
    fields.push(Field::new("perfil_pagamento", DataType::Utf8));
    fields.push(Field::new("justificativa", DataType::Utf8));
    for slot in 1..=INVOICE_SLOTS {
        fields.push(Field::new(format!("vencimento_{slot:02}"), DataType::Utf8));
        fields.push(Field::new(format!("valor_{slot:02}"), DataType::Utf8));
        fields.push(Field::new(
            format!("codigo_barras_{slot:02}"),
            DataType::Utf8,
        ));
    }
    Schema::new(fields)
}

fn empty_master(cfg: &RobotConfig) -> DataSet {
    DataSet::new(master_schema(cfg), Vec::new())
}

fn text_cell(row: &[Value], idx: Option<usize>) -> Value {
    let text = idx
        .and_then(|i| row[i].to_text())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    Value::Utf8(text)
}

fn parse_due_date(cell: &Value, format: &str) -> Option<NaiveDate> {
    let text = cell.to_text()?;
    NaiveDate::parse_from_str(text.trim(), format).ok()
}

fn render_due_date(row: &[Value], idx: Option<usize>, format: &str) -> String {
    let Some(idx) = idx else {
        return String::new();
    };
    match parse_due_date(&row[idx], format) {
        Some(date) => date.format(format).to_string(),
        None => row[idx]
            .to_text()
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Whole amounts render without decimals, broken ones with two and a comma.
fn render_amount(row: &[Value], idx: Option<usize>) -> String {
    let parsed = idx.and_then(|i| match &row[i] {
        Value::Utf8(s) => normalize_currency(s),
        other => other.as_f64(),
    });
    match parsed {
        Some(v) if v.fract() == 0.0 => format!("{v:.0}"),
        Some(v) => format_currency_br(v),
        None => String::new(),
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

    fn robot_channel() -> DataSet {
        DataSet::new(
            Schema::new(vec![
                Field::new("CPF", DataType::Utf8),
                Field::new("NOME_CLIENTE", DataType::Utf8),
                Field::new("PRODUTO", DataType::Utf8),
                Field::new("parcelasEmAtraso", DataType::Utf8),
                Field::new("valorDivida", DataType::Float64),
                Field::new("TELEFONE_01", DataType::Utf8),
                Field::new("TELEFONE_02", DataType::Utf8),
                Field::new("dtvenc", DataType::Utf8),
                Field::new("liquido", DataType::Float64),
                Field::new("codbarra", DataType::Utf8),
                Field::new("just", DataType::Utf8),
            ]),
            vec![
                vec![
                    utf8("111"),
                    utf8("MARIA"),
                    utf8("EPB"),
                    utf8("4"),
                    Value::Float64(180.0),
                    utf8("11999990000"),
                    utf8(""),
                    utf8("15/03/2024"),
                    Value::Float64(60.5),
                    utf8("bar-2"),
                    utf8("FATURA"),
                ],
                vec![
                    utf8("111"),
                    utf8("MARIA"),
                    utf8("EPB"),
                    utf8("4"),
                    Value::Float64(180.0),
                    utf8("11999990000"),
                    utf8(""),
                    utf8("10/01/2024"),
                    Value::Float64(50.0),
                    utf8("bar-1"),
                    utf8("FATURA"),
                ],
                vec![
                    utf8("111"),
                    utf8("MARIA"),
                    utf8("EPB"),
                    utf8("4"),
                    Value::Float64(180.0),
                    utf8("11999990000"),
                    utf8(""),
                    utf8("sem data"),
                    Value::Float64(69.5),
                    utf8("bar-3"),
                    utf8("FATURA"),
                ],
                vec![
                    utf8("222"),
                    utf8("JOSE"),
                    utf8("EMT"),
                    utf8("1"),
                    Value::Float64(40.0),
                    utf8(""),
                    utf8(""),
                    utf8("05/02/2024"),
                    Value::Float64(40.0),
                    utf8("bar-9"),
                    utf8(""),
                ],
            ],
        )
    }

    #[test]
    fn invoices_fill_slots_oldest_first_with_unparseable_dates_last() {
        let (out, _) = build_robot_master(&robot_channel(), &RobotConfig::default());
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.text(0, "vencimento_01"), Some("10/01/2024".to_string()));
        assert_eq!(out.text(0, "codigo_barras_01"), Some("bar-1".to_string()));
        assert_eq!(out.text(0, "vencimento_02"), Some("15/03/2024".to_string()));
        assert_eq!(out.text(0, "vencimento_03"), Some("sem data".to_string()));
        assert_eq!(out.text(0, "codigo_barras_03"), Some("bar-3".to_string()));
    }

    #[test]
    fn amounts_render_plain_when_whole_and_comma_when_broken() {
        let (out, _) = build_robot_master(&robot_channel(), &RobotConfig::default());
        assert_eq!(out.text(0, "valorDivida"), Some("180".to_string()));
        assert_eq!(out.text(0, "valor_01"), Some("50".to_string()));
        assert_eq!(out.text(0, "valor_02"), Some("60,50".to_string()));
    }

    #[test]
    fn customer_columns_and_profile_come_from_first_invoice() {
        let (out, _) = build_robot_master(&robot_channel(), &RobotConfig::default());
        assert_eq!(out.text(0, "NOME_CLIENTE"), Some("MARIA".to_string()));
        assert_eq!(out.text(0, "perfil_pagamento"), Some("VISTA".to_string()));
        assert_eq!(out.text(0, "justificativa"), Some("FATURA".to_string()));
        // Single-invoice customer leaves later slots blank.
        assert_eq!(out.text(1, "vencimento_02"), Some(String::new()));
        assert_eq!(out.text(1, "valor_03"), Some(String::new()));
    }

    #[test]
    fn missing_customer_column_yields_empty_master() {
        let ds = DataSet::new(
            Schema::new(vec![Field::new("outra", DataType::Utf8)]),
            vec![vec![utf8("x")]],
        );
        let (out, report) = build_robot_master(&ds, &RobotConfig::default());
        assert_eq!(out.row_count(), 0);
        assert_eq!(report.outcome, StageOutcome::Skipped);
        assert!(out.has_column("vencimento_01"));
    }
}
