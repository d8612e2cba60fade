//! Cross-dataset removal policies.
//!
//! Three independent, composable policies suppress mailing rows based on reference datasets
//! (disqualifying disposition statuses, repeated critical dispositions, recorded payments),
//! plus the mailing-local block-status filter. Every policy reports how many rows it removed
//! and how many remain; a policy whose required columns or datasets are absent skips with a
//! warning instead of aborting the run.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::audit::StageReport;
use crate::config::{
    BlockFilterConfig, PaymentRemovalConfig, StatusRemovalConfig, ThresholdRemovalConfig,
};
use crate::types::{DataSet, Value};

use super::normalize::normalize_join_key;

/// Remove mailing rows whose client id carries a disqualifying disposition status.
pub fn remove_by_status(
    mailing: &DataSet,
    reference: Option<&DataSet>,
    cfg: &StatusRemovalConfig,
) -> (DataSet, StageReport) {
    const STAGE: &str = "status-removal";

    let Some(reference) = non_empty(reference) else {
        return skip(STAGE, mailing, "blocklist dataset missing or empty");
    };
    if cfg.statuses.is_empty() {
        return skip(STAGE, mailing, "no disqualifying statuses configured");
    }
    let Some(ref_key_idx) = reference.column_index(&cfg.reference_key) else {
        return skip(
            STAGE,
            mailing,
            format!("column '{}' not found in blocklist", cfg.reference_key),
        );
    };
    let Some(status_idx) = reference.column_index(&cfg.status_column) else {
        return skip(
            STAGE,
            mailing,
            format!("column '{}' not found in blocklist", cfg.status_column),
        );
    };
    let Some(mail_key_idx) = mailing.column_index(&cfg.mailing_key) else {
        return skip(
            STAGE,
            mailing,
            format!("column '{}' not found in mailing", cfg.mailing_key),
        );
    };

    let disqualifying: HashSet<String> = cfg
        .statuses
        .iter()
        .map(|s| s.trim().to_lowercase())
        .collect();

    let mut ids: HashSet<String> = HashSet::new();
    for row in &reference.rows {
        let matches = cell_key(&row[status_idx])
            .map(|s| disqualifying.contains(&s))
            .unwrap_or(false);
        if matches {
            if let Some(id) = cell_key(&row[ref_key_idx]) {
                ids.insert(id);
            }
        }
    }

    let out = mailing.filter_rows(|row| {
        cell_key(&row[mail_key_idx])
            .map(|key| !ids.contains(&key))
            .unwrap_or(true)
    });

    applied(
        STAGE,
        mailing,
        out,
        format!("{} disqualifying ids from {} statuses", ids.len(), disqualifying.len()),
    )
}

/// Remove mailing rows whose client id accumulated too many critical dispositions.
pub fn remove_by_threshold(
    mailing: &DataSet,
    reference: Option<&DataSet>,
    cfg: &ThresholdRemovalConfig,
) -> (DataSet, StageReport) {
    const STAGE: &str = "threshold-removal";

    let Some(reference) = non_empty(reference) else {
        return skip(STAGE, mailing, "blocklist dataset missing or empty");
    };
    if cfg.critical_statuses.is_empty() {
        return skip(STAGE, mailing, "no critical statuses configured");
    }
    let Some(ref_key_idx) = reference.column_index(&cfg.reference_key) else {
        return skip(
            STAGE,
            mailing,
            format!("column '{}' not found in blocklist", cfg.reference_key),
        );
    };
    let Some(status_idx) = reference.column_index(&cfg.status_column) else {
        return skip(
            STAGE,
            mailing,
            format!("column '{}' not found in blocklist", cfg.status_column),
        );
    };
    let Some(mail_key_idx) = mailing.column_index(&cfg.mailing_key) else {
        return skip(
            STAGE,
            mailing,
            format!("column '{}' not found in mailing", cfg.mailing_key),
        );
    };

    let critical: HashSet<String> = cfg
        .critical_statuses
        .iter()
        .map(|s| s.trim().to_lowercase())
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in &reference.rows {
        let is_critical = cell_key(&row[status_idx])
            .map(|s| critical.contains(&s))
            .unwrap_or(false);
        if is_critical {
            if let Some(id) = cell_key(&row[ref_key_idx]) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
    }
    let ids: HashSet<&String> = counts
        .iter()
        .filter(|&(_, &n)| n >= cfg.min_count)
        .map(|(id, _)| id)
        .collect();

    let out = mailing.filter_rows(|row| {
        cell_key(&row[mail_key_idx])
            .map(|key| !ids.contains(&key))
            .unwrap_or(true)
    });

    applied(
        STAGE,
        mailing,
        out,
        format!(
            "{} ids with >= {} critical dispositions",
            ids.len(),
            cfg.min_count
        ),
    )
}

/// Remove mailing rows whose composite (company, service-point, year, month) key matches a
/// recorded payment.
pub fn remove_paid(
    mailing: &DataSet,
    payments: Option<&DataSet>,
    cfg: &PaymentRemovalConfig,
) -> (DataSet, StageReport) {
    const STAGE: &str = "payment-removal";

    let Some(payments) = non_empty(payments) else {
        return skip(STAGE, mailing, "payment dataset missing or empty");
    };

    let mut mail_idxs = Vec::with_capacity(cfg.key_columns.len());
    let mut pay_idxs = Vec::with_capacity(cfg.key_columns.len());
    for col in &cfg.key_columns {
        match (mailing.column_index(col), payments.column_index(col)) {
            (Some(m), Some(p)) => {
                mail_idxs.push(m);
                pay_idxs.push(p);
            }
            _ => {
                return skip(
                    STAGE,
                    mailing,
                    format!("composite key column '{col}' not found in both datasets"),
                );
            }
        }
    }

    let paid: HashSet<String> = payments
        .rows
        .iter()
        .map(|row| composite_key(row, &pay_idxs))
        .collect();

    let out = mailing.filter_rows(|row| !paid.contains(&composite_key(row, &mail_idxs)));

    applied(
        STAGE,
        mailing,
        out,
        format!("{} distinct payment keys", paid.len()),
    )
}

/// Keep only mailing rows whose block column carries the configured "unblocked" value.
pub fn retain_unblocked(mailing: &DataSet, cfg: &BlockFilterConfig) -> (DataSet, StageReport) {
    const STAGE: &str = "block-filter";

    let Some(idx) = mailing.column_index(&cfg.column) else {
        return skip(
            STAGE,
            mailing,
            format!("column '{}' not found in mailing", cfg.column),
        );
    };

    let keep = cfg.keep_value.trim().to_uppercase();
    let out = mailing.filter_rows(|row| {
        row[idx]
            .to_text()
            .map(|s| s.trim().to_uppercase() == keep)
            .unwrap_or(false)
    });

    applied(
        STAGE,
        mailing,
        out,
        format!("kept '{}' = '{}'", cfg.column, cfg.keep_value),
    )
}

fn non_empty(ds: Option<&DataSet>) -> Option<&DataSet> {
    ds.filter(|d| d.row_count() > 0)
}

/// Case-folded, trimmed, `.0`-free join form of a cell, or `None` for null/blank cells.
fn cell_key(value: &Value) -> Option<String> {
    let text = value.to_text()?;
    let key = normalize_join_key(&text);
    if key.is_empty() { None } else { Some(key) }
}

/// Composite key from several columns. Parts are joined with an ASCII unit separator so that
/// `("1", "23")` and `("12", "3")` cannot alias.
fn composite_key(row: &[Value], idxs: &[usize]) -> String {
    idxs.iter()
        .map(|&i| {
            row[i]
                .to_text()
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

fn skip(stage: &str, mailing: &DataSet, reason: impl Into<String>) -> (DataSet, StageReport) {
    let reason = reason.into();
    warn!(stage, %reason, "removal policy skipped");
    (
        mailing.clone(),
        StageReport::skipped(stage, mailing.row_count(), reason),
    )
}

fn applied(
    stage: &str,
    before: &DataSet,
    after: DataSet,
    detail: String,
) -> (DataSet, StageReport) {
    let removed = before.row_count() - after.row_count();
    let message = format!(
        "removed {removed} records, {} remaining ({detail})",
        after.row_count()
    );
    info!(stage, removed, remaining = after.row_count(), %message);
    let report = StageReport::applied(stage, before.row_count(), after.row_count(), message);
    (after, report)
}
