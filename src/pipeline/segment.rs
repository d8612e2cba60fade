//! Channel segmentation and human-channel ordering.
//!
//! Segmentation policy is the most change-churned business logic in this system, so it sits
//! behind the [`SegmentationPolicy`] trait: the orchestrator only knows it hands a dataset to
//! a policy and gets back disjoint human/robot partitions. [`ThresholdSegmentation`] is the
//! current production policy.

use tracing::info;

use crate::audit::StageReport;
use crate::config::{PriorityRule, RobotRule, SegmentGroup};
use crate::types::{DataSet, Value};

use super::normalize::normalize_currency;

/// Result of a segmentation pass: two disjoint channel datasets plus the count of rows whose
/// product code belonged to no configured group (excluded from both, by design).
#[derive(Debug, Clone)]
pub struct SegmentationOutcome {
    /// Rows routed to human agents.
    pub human: DataSet,
    /// Rows routed to the automated dialer.
    pub robot: DataSet,
    /// Rows matching no configured group.
    pub unmatched: usize,
}

/// A versioned segmentation strategy.
///
/// Implementations must uphold the partition property: every input row lands in exactly one
/// of human or robot, or in neither when it belongs to no group, and never in both.
pub trait SegmentationPolicy {
    /// Policy name, recorded in the audit trail.
    fn name(&self) -> &str;

    /// Partition `ds` into the two channels.
    fn segment(&self, ds: &DataSet) -> SegmentationOutcome;
}

/// Per-group monetary threshold policy.
///
/// Groups are evaluated in configuration order and a row joins the first group whose product
/// codes contain its product. Within a group, [`RobotRule::BelowThreshold`] sends rows with
/// total debt at or above the threshold to human and the rest to robot;
/// [`RobotRule::All`] sends the whole subset to the robot channel.
pub struct ThresholdSegmentation<'a> {
    /// Configured groups, in evaluation order.
    pub groups: &'a [SegmentGroup],
    /// Product/company code column.
    pub product_column: &'a str,
    /// Broadcast total-debt column.
    pub debt_column: &'a str,
}

impl SegmentationPolicy for ThresholdSegmentation<'_> {
    fn name(&self) -> &str {
        "threshold-by-group"
    }

    fn segment(&self, ds: &DataSet) -> SegmentationOutcome {
        let product_idx = ds.column_index(self.product_column);
        let debt_idx = ds.column_index(self.debt_column);

        let mut human_rows: Vec<usize> = Vec::new();
        let mut robot_rows: Vec<usize> = Vec::new();
        let mut assigned = vec![false; ds.row_count()];

        for group in self.groups {
            let codes: Vec<String> = group
                .product_codes
                .iter()
                .map(|c| c.trim().to_uppercase())
                .collect();
            for (idx, row) in ds.rows.iter().enumerate() {
                if assigned[idx] {
                    continue;
                }
                let in_group = product_idx
                    .and_then(|i| row[i].to_text())
                    .map(|p| codes.contains(&p.trim().to_uppercase()))
                    .unwrap_or(false);
                if !in_group {
                    continue;
                }
                assigned[idx] = true;

                let debt = debt_idx.map(|i| cell_debt(&row[i])).unwrap_or(0.0);
                match group.robot_rule {
                    RobotRule::BelowThreshold => {
                        if debt >= group.debt_threshold {
                            human_rows.push(idx);
                        } else {
                            robot_rows.push(idx);
                        }
                    }
                    RobotRule::All => robot_rows.push(idx),
                }
            }
        }

        let unmatched = assigned.iter().filter(|&&a| !a).count();
        SegmentationOutcome {
            human: ds.select_rows(&human_rows),
            robot: ds.select_rows(&robot_rows),
            unmatched,
        }
    }
}

/// Run a segmentation policy and report the channel split.
pub fn segment(ds: &DataSet, policy: &dyn SegmentationPolicy) -> (SegmentationOutcome, StageReport) {
    let outcome = policy.segment(ds);
    let message = format!(
        "policy '{}': {} rows to human, {} to robot, {} in no configured group",
        policy.name(),
        outcome.human.row_count(),
        outcome.robot.row_count(),
        outcome.unmatched
    );
    info!(stage = "segment", %message);
    let report = StageReport::applied(
        "segment",
        ds.row_count(),
        outcome.human.row_count() + outcome.robot.row_count(),
        message,
    );
    (outcome, report)
}

/// Sort the human channel by priority tier, then total debt descending within each tier.
///
/// A row's tier is the 1-based index of the first [`PriorityRule`] it matches
/// (case-insensitive, trimmed); rows matching no rule fall into the catch-all tier after the
/// last rung. Tie-break order is exactly tier-then-debt-descending: this is business policy,
/// not an optimization.
pub fn order_human(
    ds: &DataSet,
    rules: &[PriorityRule],
    debt_column: &str,
) -> (DataSet, StageReport) {
    let rule_idxs: Vec<Option<usize>> = rules.iter().map(|r| ds.column_index(&r.column)).collect();
    let debt_idx = ds.column_index(debt_column);
    let catch_all = rules.len() + 1;

    let tier = |row: &[Value]| -> usize {
        for (rank, (rule, idx)) in rules.iter().zip(&rule_idxs).enumerate() {
            let Some(idx) = idx else { continue };
            let matches = row[*idx]
                .to_text()
                .map(|v| v.trim().eq_ignore_ascii_case(rule.value.trim()))
                .unwrap_or(false);
            if matches {
                return rank + 1;
            }
        }
        catch_all
    };

    let out = ds.sorted_by(|a, b| {
        let (ta, tb) = (tier(a), tier(b));
        ta.cmp(&tb).then_with(|| {
            let da = debt_idx.map(|i| cell_debt(&a[i])).unwrap_or(0.0);
            let db = debt_idx.map(|i| cell_debt(&b[i])).unwrap_or(0.0);
            db.total_cmp(&da)
        })
    });

    let message = format!(
        "priority ordering applied ({} rungs, then '{debt_column}' descending)",
        rules.len()
    );
    info!(stage = "order-human", %message);
    let report = StageReport::applied("order-human", ds.row_count(), out.row_count(), message);
    (out, report)
}

fn cell_debt(value: &Value) -> f64 {
    match value {
        Value::Utf8(s) => normalize_currency(s).unwrap_or(0.0),
        other => other.as_f64().unwrap_or(0.0),
    }
}
