//! Export layout mapping.

use tracing::info;

use crate::audit::StageReport;
use crate::config::LayoutConfig;
use crate::types::{DataSet, DataType, Field, Value};

const STAGE: &str = "layout";

/// Map a channel dataset to the export layout.
///
/// Applies the configured rename map, guarantees every principal column exists (absent ones
/// are filled with blank text), and reorders the principal columns to the front in their
/// configured order. Extra columns keep their relative order after the principal block.
///
/// The mapping is idempotent: rename ignores names no longer present and the fill step only
/// creates columns that are missing, so applying the layout twice is a no-op.
pub fn apply_layout(ds: &DataSet, cfg: &LayoutConfig) -> (DataSet, StageReport) {
    let rename: Vec<(&str, &str)> = cfg
        .rename
        .iter()
        .map(|(from, to)| (from.as_str(), to.as_str()))
        .collect();
    let mut out = ds.rename_columns(&rename);

    let mut filled: Vec<&str> = Vec::new();
    for name in &cfg.principal_columns {
        if !out.has_column(name) {
            out = out.with_column(
                Field::new(name.clone(), DataType::Utf8),
                vec![Value::Utf8(String::new()); out.row_count()],
            );
            filled.push(name.as_str());
        }
    }

    let prefix: Vec<&str> = cfg.principal_columns.iter().map(String::as_str).collect();
    let out = out.reorder_with_prefix(&prefix);

    let message = if filled.is_empty() {
        format!("{} principal columns ordered", cfg.principal_columns.len())
    } else {
        format!(
            "{} principal columns ordered, filled blanks for: {}",
            cfg.principal_columns.len(),
            filled.join(", ")
        )
    };
    info!(stage = STAGE, %message);
    let report = StageReport::applied(STAGE, ds.row_count(), out.row_count(), message);
    (out, report)
}
