//! Export polish: every cell rendered as clean text.
//!
//! The downstream dialer and agent tooling consume flat text files, so the last stage before
//! hand-off rewrites the whole table as `Utf8` cells with the artifacts of spreadsheet
//! loading scrubbed out.

use tracing::info;

use crate::audit::StageReport;
use crate::config::LayoutConfig;
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::normalize::{format_currency_br, normalize_currency};

const STAGE: &str = "finalize";

/// Render a channel dataset as all-text export cells.
///
/// - Nulls and placeholder text (`nan`, `none`, `nat`, case-insensitive) become empty cells.
/// - Integral floats lose their `.0` tail; identifiers never come out in scientific notation.
/// - The double-encoding artifact `Ãƒ` is repaired, so `NÃƒO` reads `NÃO` again.
/// - A leading BOM, if a loader smuggled one into the first cell, is stripped.
/// - The configured debt and currency columns render with two decimals and a decimal comma.
pub fn finalize_for_export(ds: &DataSet, cfg: &LayoutConfig) -> (DataSet, StageReport) {
    let currency_idxs: Vec<usize> = std::iter::once(&cfg.debt_column)
        .chain(&cfg.currency_columns)
        .filter_map(|c| ds.column_index(c))
        .collect();

    let fields = ds
        .schema
        .fields
        .iter()
        .map(|f| Field::new(f.name.clone(), DataType::Utf8))
        .collect();

    let rows = ds
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(idx, cell)| {
                    if currency_idxs.contains(&idx) {
                        Value::Utf8(render_currency(cell))
                    } else {
                        Value::Utf8(render_text(cell))
                    }
                })
                .collect()
        })
        .collect();

    let out = DataSet::new(Schema::new(fields), rows);
    let message = format!(
        "{} columns rendered as text, {} as currency",
        out.column_count(),
        currency_idxs.len()
    );
    info!(stage = STAGE, %message);
    let report = StageReport::applied(STAGE, ds.row_count(), out.row_count(), message);
    (out, report)
}

fn render_text(cell: &Value) -> String {
    let Some(text) = cell.to_text() else {
        return String::new();
    };
    let text = text.trim_start_matches('\u{feff}');
    if matches!(text.trim().to_lowercase().as_str(), "nan" | "none" | "nat") {
        return String::new();
    }
    if text.contains("Ãƒ") {
        return text.replace("Ãƒ", "Ã");
    }
    text.to_string()
}

fn render_currency(cell: &Value) -> String {
    let parsed = match cell {
        Value::Utf8(s) => normalize_currency(s),
        other => other.as_f64(),
    };
    match parsed {
        Some(v) => format_currency_br(v),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    fn utf8(s: &str) -> Value {
        Value::Utf8(s.to_string())
    }

    fn export_config() -> LayoutConfig {
        LayoutConfig {
            debt_column: "valorDivida".to_string(),
            currency_columns: vec!["liquido".to_string()],
            ..LayoutConfig::default()
        }
    }

    fn channel() -> DataSet {
        DataSet::new(
            Schema::new(vec![
                Field::new("CPF", DataType::Float64),
                Field::new("Cliente_Regulariza", DataType::Utf8),
                Field::new("valorDivida", DataType::Float64),
                Field::new("liquido", DataType::Utf8),
                Field::new("LOCALIDADE", DataType::Utf8),
            ]),
            vec![
                vec![
                    Value::Float64(12345678901.0),
                    utf8("NÃƒO"),
                    Value::Float64(1234.5),
                    utf8("1.234,56"),
                    utf8("nan"),
                ],
                vec![
                    Value::Null,
                    utf8("SIM"),
                    Value::Null,
                    Value::Null,
                    utf8("\u{feff}CENTRO"),
                ],
            ],
        )
    }

    #[test]
    fn cells_render_as_clean_text() {
        let (out, _) = finalize_for_export(&channel(), &export_config());
        assert_eq!(out.text(0, "CPF"), Some("12345678901".to_string()));
        assert_eq!(out.text(0, "Cliente_Regulariza"), Some("NÃO".to_string()));
        assert_eq!(out.text(0, "LOCALIDADE"), Some(String::new()));
        assert_eq!(out.text(1, "CPF"), Some(String::new()));
        assert_eq!(out.text(1, "LOCALIDADE"), Some("CENTRO".to_string()));
    }

    #[test]
    fn currency_columns_render_with_decimal_comma() {
        let (out, _) = finalize_for_export(&channel(), &export_config());
        assert_eq!(out.text(0, "valorDivida"), Some("1234,50".to_string()));
        assert_eq!(out.text(0, "liquido"), Some("1234,56".to_string()));
        assert_eq!(out.text(1, "valorDivida"), Some(String::new()));
    }

    #[test]
    fn schema_becomes_all_text() {
        let (out, _) = finalize_for_export(&channel(), &export_config());
        assert!(out.schema.fields.iter().all(|f| f.data_type == DataType::Utf8));
    }
}
