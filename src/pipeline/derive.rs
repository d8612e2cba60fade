//! Derived columns added after cleanup and before layout.

use chrono::NaiveDate;
use tracing::info;

use crate::audit::StageReport;
use crate::types::{DataSet, DataType, Field, Value};

/// Column flagging customers already regularizing old debt.
pub const REGULARIZE_COLUMN: &str = "cliente_regulariza";
/// Column stamping the mailing's import date.
pub const IMPORT_DATE_COLUMN: &str = "data_de_importacao";

/// Add the `cliente_regulariza` flag: `"SIM"` when the source column carries any marker of
/// debt older than one year, that is, a non-null, non-blank cell other than `"N"`
/// (case-insensitive, trimmed). Null, blank and `"N"` cells flag `"NÃO"`, as does every row
/// when the source column is absent.
pub fn add_regularize_flag(ds: &DataSet, source: &str) -> (DataSet, StageReport) {
    const STAGE: &str = "regularize-flag";

    let source_idx = ds.column_index(source);
    let values = ds
        .rows
        .iter()
        .map(|row| {
            let marked = source_idx
                .and_then(|i| row[i].to_text())
                .map(|s| {
                    let s = s.trim();
                    !s.is_empty() && !s.eq_ignore_ascii_case("N")
                })
                .unwrap_or(false);
            let flag = if marked { "SIM" } else { "NÃO" };
            Value::Utf8(flag.to_string())
        })
        .collect();
    let out = ds.with_column(Field::new(REGULARIZE_COLUMN, DataType::Utf8), values);

    let message = match source_idx {
        Some(_) => format!("flag derived from '{source}'"),
        None => format!("source column '{source}' not found, all rows flagged NÃO"),
    };
    info!(stage = STAGE, %message);
    let report = StageReport::applied(STAGE, ds.row_count(), out.row_count(), message);
    (out, report)
}

/// Stamp every row with the run's import date, rendered with `format`.
pub fn stamp_import_date(ds: &DataSet, date: NaiveDate, format: &str) -> (DataSet, StageReport) {
    const STAGE: &str = "import-date";

    let stamp = date.format(format).to_string();
    let values = vec![Value::Utf8(stamp.clone()); ds.row_count()];
    let out = ds.with_column(Field::new(IMPORT_DATE_COLUMN, DataType::Utf8), values);

    let message = format!("stamped '{stamp}'");
    info!(stage = STAGE, %message);
    let report = StageReport::applied(STAGE, ds.row_count(), out.row_count(), message);
    (out, report)
}
