//! Field normalizers and early column cleanup.
//!
//! Normalizers are total functions: invalid input maps to a defined null/empty result and the
//! caller decides whether that is fatal. Nothing in this module raises into the pipeline.

use tracing::info;

use crate::audit::StageReport;
use crate::config::MailingColumns;
use crate::types::{DataSet, DataType, Field, Value};

/// Parse monetary text into a float, accepting either `,` or `.` as the decimal separator.
///
/// `"1.234,56"` and `"1234.56"` both parse; thousands separators are stripped. A comma-free
/// value whose dots group digits in threes, like `"1.234"` or `"1.234.567"`, reads as a
/// dot-grouped Brazilian integer rather than a decimal fraction. Unparseable input returns
/// `None`, never an error.
pub fn normalize_currency(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Brazilian convention: '.' groups thousands, ',' marks decimals.
    if trimmed.contains(',') {
        let cleaned = trimmed.replace('.', "").replacen(',', ".", 1);
        return cleaned.parse::<f64>().ok();
    }
    if is_dot_grouped(trimmed) {
        return trimmed.replace('.', "").parse::<f64>().ok();
    }
    trimmed.parse::<f64>().ok()
}

/// Whether a comma-free value is a dot-grouped integer: digit groups separated by dots, the
/// first 1 to 3 digits long and every later group exactly 3.
fn is_dot_grouped(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let mut parts = digits.split('.');
    let Some(first) = parts.next() else {
        return false;
    };
    if first.is_empty() || first.len() > 3 || !first.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let mut grouped = false;
    for part in parts {
        if part.len() != 3 || !part.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        grouped = true;
    }
    grouped
}

/// Render a monetary value with exactly two decimals and a decimal comma, e.g. `"1234,50"`.
pub fn format_currency_br(value: f64) -> String {
    format!("{value:.2}").replace('.', ",")
}

/// Reduce a raw phone cell to its digits, or `None` if nothing remains.
///
/// A trailing `.0` (numeric-as-float serialization artifact) is dropped before extracting
/// digits, so `"11999990000.0"` becomes `"11999990000"`.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let without_artifact = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    let digits: String = without_artifact.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() { None } else { Some(digits) }
}

/// Canonical display form of an identifier: trimmed, with any trailing `.0` removed.
pub fn normalize_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix(".0").unwrap_or(trimmed).to_string()
}

/// Join-key form of an identifier: [`normalize_identifier`] plus lowercasing.
pub fn normalize_join_key(raw: &str) -> String {
    normalize_identifier(raw).to_lowercase()
}

/// Identifier text of a cell, or `None` for nulls and blank strings.
pub fn value_identifier(value: &Value) -> Option<String> {
    let text = value.to_text()?;
    let id = normalize_identifier(&text);
    if id.is_empty() { None } else { Some(id) }
}

/// Normalize schema column names: trimmed and lowercased.
///
/// Every input dataset goes through this once at Load, so all later column lookups can use
/// lowercase names.
pub fn standardize_columns(ds: &DataSet) -> DataSet {
    let mut out = ds.clone();
    for field in &mut out.schema.fields {
        field.name = field.name.trim().to_lowercase();
    }
    out
}

/// Early cleanup of columns that arrive misshapen from the loader.
///
/// - Financial columns: decimal-comma text parsed into `Float64` once, here, so every later
///   stage works with numbers instead of re-parsing rounded strings.
/// - Mojibake columns: the `Ã©` double-encoding artifact repaired to `é`.
/// - Integer-text columns: numeric-as-float identifiers rewritten as integer text.
pub fn clean_rebellious_columns(ds: &DataSet, cols: &MailingColumns) -> (DataSet, StageReport) {
    let mut out = ds.clone();
    let mut touched: Vec<String> = Vec::new();

    for name in &cols.financial {
        if let Some(idx) = out.column_index(name) {
            let values = out
                .rows
                .iter()
                .map(|row| match &row[idx] {
                    Value::Null => Value::Null,
                    Value::Float64(v) => Value::Float64(*v),
                    Value::Int64(v) => Value::Float64(*v as f64),
                    Value::Utf8(s) => match normalize_currency(s) {
                        Some(v) => Value::Float64(v),
                        None => Value::Null,
                    },
                    Value::Bool(_) => Value::Null,
                })
                .collect();
            out = out.with_column(Field::new(name.clone(), DataType::Float64), values);
            touched.push(format!("{name} (currency)"));
        }
    }

    for name in &cols.mojibake {
        if let Some(idx) = out.column_index(name) {
            let values = out
                .rows
                .iter()
                .map(|row| match &row[idx] {
                    Value::Utf8(s) if s.contains("Ã©") => {
                        Value::Utf8(s.replace("Ã©", "é"))
                    }
                    other => other.clone(),
                })
                .collect();
            out = out.with_column(Field::new(name.clone(), DataType::Utf8), values);
            touched.push(format!("{name} (encoding)"));
        }
    }

    for name in &cols.integer_text {
        if let Some(idx) = out.column_index(name) {
            let values = out
                .rows
                .iter()
                .map(|row| match value_identifier(&row[idx]) {
                    Some(id) => Value::Utf8(id),
                    None => Value::Null,
                })
                .collect();
            out = out.with_column(Field::new(name.clone(), DataType::Utf8), values);
            touched.push(format!("{name} (identifier)"));
        }
    }

    let message = if touched.is_empty() {
        "no configured columns present".to_string()
    } else {
        format!("cleaned columns: {}", touched.join(", "))
    };
    info!(stage = "clean", %message);
    let report = StageReport::applied("clean", ds.row_count(), out.row_count(), message);
    (out, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    #[test]
    fn normalize_currency_accepts_both_decimal_separators() {
        assert_eq!(normalize_currency("1234.56"), Some(1234.56));
        assert_eq!(normalize_currency("1234,56"), Some(1234.56));
        assert_eq!(normalize_currency("1.234,56"), Some(1234.56));
        assert_eq!(normalize_currency("  150 "), Some(150.0));
        assert_eq!(normalize_currency(""), None);
        assert_eq!(normalize_currency("n/a"), None);
    }

    #[test]
    fn normalize_currency_reads_dot_groups_as_thousands() {
        assert_eq!(normalize_currency("1.234"), Some(1234.0));
        assert_eq!(normalize_currency("1.234.567"), Some(1234567.0));
        assert_eq!(normalize_currency("-1.234"), Some(-1234.0));
        // A dot not grouping threes stays a decimal point.
        assert_eq!(normalize_currency("0.5"), Some(0.5));
        assert_eq!(normalize_currency("1.2345"), Some(1.2345));
        assert_eq!(normalize_currency("1234.567"), Some(1234.567));
    }

    #[test]
    fn currency_round_trip_has_no_precision_drift() {
        let v = normalize_currency("1234.5").unwrap();
        assert_eq!(format_currency_br(v), "1234,50");
        let v = normalize_currency("1234,50").unwrap();
        assert_eq!(format_currency_br(v), "1234,50");
    }

    #[test]
    fn normalize_phone_strips_artifacts_and_noise() {
        assert_eq!(
            normalize_phone("11999990000.0"),
            Some("11999990000".to_string())
        );
        assert_eq!(
            normalize_phone("(11) 99999-0000"),
            Some("11999990000".to_string())
        );
        assert_eq!(normalize_phone("sem telefone"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn normalize_identifier_trims_and_drops_float_tail() {
        assert_eq!(normalize_identifier("  12345678.0 "), "12345678");
        assert_eq!(normalize_identifier("abc"), "abc");
        assert_eq!(normalize_join_key(" ABC123.0 "), "abc123");
    }

    #[test]
    fn standardize_columns_trims_and_lowercases_names() {
        let ds = DataSet::new(
            Schema::new(vec![
                Field::new("  NCPF ", DataType::Utf8),
                Field::new("NomeCad", DataType::Utf8),
            ]),
            vec![],
        );
        let out = standardize_columns(&ds);
        let names: Vec<&str> = out.schema.field_names().collect();
        assert_eq!(names, vec!["ncpf", "nomecad"]);
    }

    #[test]
    fn clean_rebellious_columns_parses_currency_and_identifiers() {
        let ds = DataSet::new(
            Schema::new(vec![
                Field::new("liquido", DataType::Utf8),
                Field::new("ndoc", DataType::Float64),
                Field::new("faixa", DataType::Utf8),
            ]),
            vec![
                vec![
                    Value::Utf8("1.234,56".to_string()),
                    Value::Float64(12345678.0),
                    Value::Utf8("a vencer hÃ© pouco".to_string()),
                ],
                vec![Value::Utf8("??".to_string()), Value::Null, Value::Null],
            ],
        );
        let (out, report) = clean_rebellious_columns(&ds, &MailingColumns::default());
        assert_eq!(out.value(0, "liquido"), Some(&Value::Float64(1234.56)));
        // Unparseable currency degrades to null, never an error.
        assert!(out.value(1, "liquido").unwrap().is_null());
        assert_eq!(out.text(0, "ndoc"), Some("12345678".to_string()));
        assert_eq!(
            out.text(0, "faixa"),
            Some("a vencer hé pouco".to_string())
        );
        assert_eq!(report.rows_before, report.rows_after);
        assert!(report.message.contains("liquido (currency)"));
    }
}
