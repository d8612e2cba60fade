//! Structured audit trail for pipeline runs.
//!
//! Every stage appends exactly one [`StageReport`], whether it transformed the data or
//! skipped with a reason. The accumulated [`AuditLog`] is the pipeline's externally visible
//! protocol: row counts before/after each stage, removals, and degradation notices, usable
//! both for human reporting and for asserting exact counts in tests.

use std::fmt;

/// How a stage concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage ran and produced (possibly unchanged) output.
    Applied,
    /// The stage could not run and passed data through unchanged.
    Skipped,
    /// The stage aborted the run.
    Fatal,
}

/// One audit entry: stage name, row counts at its boundaries, and a human-readable message.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    /// Stage name, e.g. `"dedup"`.
    pub stage: String,
    /// Row count of the stage's input.
    pub rows_before: usize,
    /// Row count of the stage's output.
    pub rows_after: usize,
    /// How the stage concluded.
    pub outcome: StageOutcome,
    /// Free-text detail (counts, matched keys, skip reason).
    pub message: String,
}

impl StageReport {
    /// Report for a stage that ran.
    pub fn applied(
        stage: impl Into<String>,
        rows_before: usize,
        rows_after: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            rows_before,
            rows_after,
            outcome: StageOutcome::Applied,
            message: message.into(),
        }
    }

    /// Report for a stage that skipped and passed `rows` through unchanged.
    pub fn skipped(stage: impl Into<String>, rows: usize, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            rows_before: rows,
            rows_after: rows,
            outcome: StageOutcome::Skipped,
            message: reason.into(),
        }
    }

    /// Report for a fatal condition that aborted the run.
    pub fn fatal(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            rows_before: 0,
            rows_after: 0,
            outcome: StageOutcome::Fatal,
            message: message.into(),
        }
    }

    /// Number of rows this stage removed.
    pub fn removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            StageOutcome::Applied => write!(
                f,
                "[{}] {} ({} -> {} rows)",
                self.stage, self.message, self.rows_before, self.rows_after
            ),
            StageOutcome::Skipped => {
                write!(f, "[{}] skipped: {}", self.stage, self.message)
            }
            StageOutcome::Fatal => write!(f, "[{}] FATAL: {}", self.stage, self.message),
        }
    }
}

/// Append-only list of [`StageReport`]s, owned by the orchestrator for the run's duration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditLog {
    reports: Vec<StageReport>,
}

impl AuditLog {
    /// Create an empty audit log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a report.
    pub fn push(&mut self, report: StageReport) {
        self.reports.push(report);
    }

    /// All reports, in stage order.
    pub fn reports(&self) -> &[StageReport] {
        &self.reports
    }

    /// Find the report for a given stage name.
    pub fn report_for(&self, stage: &str) -> Option<&StageReport> {
        self.reports.iter().find(|r| r.stage == stage)
    }

    /// Render the log as numbered report lines.
    pub fn render_lines(&self) -> Vec<String> {
        self.reports
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}", i + 1, r))
            .collect()
    }
}
