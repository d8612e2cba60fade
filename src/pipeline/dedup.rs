//! Record deduplication with a completeness-based tie-break.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::audit::StageReport;
use crate::types::{DataSet, Value};

use super::normalize::value_identifier;

const STAGE: &str = "dedup";

/// Collapse rows sharing `primary_key` down to one survivor per key.
///
/// Among rows with the same key the most complete one wins: a row with a non-null
/// `name_column` beats one without, then the greater count of non-null fields, and equally
/// complete rows keep the first occurrence. Survivors stay in their original row order.
///
/// Rows with a null key are never grouped and all pass through. If the key column is absent
/// the stage skips explicitly instead of silently passing data through.
pub fn deduplicate(ds: &DataSet, primary_key: &str, name_column: &str) -> (DataSet, StageReport) {
    if !ds.has_column(primary_key) {
        let reason = format!("primary key column '{primary_key}' not found");
        warn!(stage = STAGE, %reason);
        return (ds.clone(), StageReport::skipped(STAGE, ds.row_count(), reason));
    }

    let key_idx = ds.column_index(primary_key).expect("checked above");
    let name_idx = ds.column_index(name_column);

    let completeness = |row: &[Value]| -> (bool, usize) {
        let has_name = name_idx.map(|i| !row[i].is_null()).unwrap_or(false);
        let non_null = row.iter().filter(|v| !v.is_null()).count();
        (has_name, non_null)
    };

    // Best surviving row index per key; keyless rows always survive.
    let mut best: HashMap<String, usize> = HashMap::new();
    let mut keyless: Vec<usize> = Vec::new();
    for (idx, row) in ds.rows.iter().enumerate() {
        let Some(key) = value_identifier(&row[key_idx]) else {
            keyless.push(idx);
            continue;
        };
        match best.get(&key) {
            None => {
                best.insert(key, idx);
            }
            Some(&current) => {
                if completeness(row.as_slice()) > completeness(ds.rows[current].as_slice()) {
                    best.insert(key, idx);
                }
            }
        }
    }

    let mut survivors: Vec<usize> = best.values().copied().chain(keyless).collect();
    survivors.sort_unstable();
    let out = ds.select_rows(&survivors);

    let removed = ds.row_count() - out.row_count();
    let message = if removed == 0 {
        "no duplicate records found".to_string()
    } else {
        format!("removed {removed} duplicate records by '{primary_key}'")
    };
    info!(stage = STAGE, removed, remaining = out.row_count(), %message);
    let report = StageReport::applied(STAGE, ds.row_count(), out.row_count(), message);
    (out, report)
}

#[cfg(test)]
mod tests {
    use super::deduplicate;
    use crate::audit::StageOutcome;
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    fn mailing(rows: Vec<Vec<Value>>) -> DataSet {
        DataSet::new(
            Schema::new(vec![
                Field::new("ncpf", DataType::Utf8),
                Field::new("nomecad", DataType::Utf8),
                Field::new("loc", DataType::Utf8),
            ]),
            rows,
        )
    }

    fn utf8(s: &str) -> Value {
        Value::Utf8(s.to_string())
    }

    #[test]
    fn keeps_the_row_with_a_name() {
        let ds = mailing(vec![
            vec![utf8("111"), Value::Null, utf8("centro")],
            vec![utf8("111"), utf8("MARIA"), Value::Null],
            vec![utf8("222"), utf8("JOSE"), utf8("norte")],
        ]);
        let (out, report) = deduplicate(&ds, "ncpf", "nomecad");
        assert_eq!(out.row_count(), 2);
        assert_eq!(report.removed(), 1);
        assert_eq!(out.text(0, "nomecad"), Some("MARIA".to_string()));
    }

    #[test]
    fn equally_complete_rows_keep_first_occurrence() {
        let ds = mailing(vec![
            vec![utf8("111"), utf8("FIRST"), utf8("a")],
            vec![utf8("111"), utf8("SECOND"), utf8("b")],
        ]);
        let (out, _) = deduplicate(&ds, "ncpf", "nomecad");
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.text(0, "nomecad"), Some("FIRST".to_string()));
    }

    #[test]
    fn float_artifact_keys_group_with_clean_keys() {
        let ds = mailing(vec![
            vec![utf8("111.0"), Value::Null, utf8("a")],
            vec![utf8("111"), utf8("MARIA"), utf8("b")],
        ]);
        let (out, _) = deduplicate(&ds, "ncpf", "nomecad");
        assert_eq!(out.row_count(), 1);
    }

    #[test]
    fn null_keys_are_never_grouped() {
        let ds = mailing(vec![
            vec![Value::Null, utf8("A"), Value::Null],
            vec![Value::Null, utf8("B"), Value::Null],
        ]);
        let (out, report) = deduplicate(&ds, "ncpf", "nomecad");
        assert_eq!(out.row_count(), 2);
        assert_eq!(report.removed(), 0);
    }

    #[test]
    fn dedup_is_idempotent() {
        let ds = mailing(vec![
            vec![utf8("111"), utf8("MARIA"), utf8("a")],
            vec![utf8("111"), Value::Null, utf8("b")],
            vec![utf8("222"), utf8("JOSE"), utf8("c")],
        ]);
        let (once, _) = deduplicate(&ds, "ncpf", "nomecad");
        let (twice, report) = deduplicate(&once, "ncpf", "nomecad");
        assert_eq!(twice, once);
        assert_eq!(report.removed(), 0);
    }

    #[test]
    fn missing_key_column_skips_with_signal() {
        let ds = mailing(vec![vec![utf8("111"), utf8("MARIA"), utf8("a")]]);
        let (out, report) = deduplicate(&ds, "document_id", "nomecad");
        assert_eq!(out, ds);
        assert_eq!(report.outcome, StageOutcome::Skipped);
        assert!(report.message.contains("document_id"));
    }
}
