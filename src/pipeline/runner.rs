//! Pipeline orchestration.
//!
//! [`run`] wires the stages together in their production order. The orchestrator owns the
//! [`AuditLog`]; every stage contributes exactly one report, so the log reads as the run's
//! complete protocol.

use chrono::{Local, NaiveDate};
use tracing::{error, info};

use crate::audit::{AuditLog, StageReport};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::DataSet;

use super::aggregate::{aggregate, TOTAL_DEBT_COLUMN};
use super::dedup::deduplicate;
use super::derive::{add_regularize_flag, stamp_import_date};
use super::enrich::enrich_phones;
use super::filters::{remove_by_status, remove_by_threshold, remove_paid, retain_unblocked};
use super::finalize::finalize_for_export;
use super::layout::apply_layout;
use super::normalize::{clean_rebellious_columns, standardize_columns};
use super::robot::build_robot_master;
use super::segment::{order_human, segment, ThresholdSegmentation};

/// All datasets a run consumes. Only the mailing is mandatory; every other input degrades
/// its stage to a skip when absent.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    /// The primary mailing dataset, one row per open invoice.
    pub mailing: DataSet,
    /// Blocklist/disposition reference for the status and threshold removals.
    pub blocklist: Option<DataSet>,
    /// Recorded payments for the composite-key removal.
    pub payments: Option<DataSet>,
    /// Phone enrichment workbook, one dataset per sheet.
    pub enrichment: Vec<DataSet>,
}

/// The run's deliverables: both export channels, the robot master table, and the audit log.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Human-channel export, priority ordered.
    pub human: DataSet,
    /// Robot-channel export.
    pub robot: DataSet,
    /// Per-customer robot master table.
    pub robot_master: DataSet,
    /// Protocol of every stage that ran.
    pub audit: AuditLog,
}

impl PipelineOutput {
    /// Output of a run aborted before any stage could transform data.
    fn aborted(audit: AuditLog) -> Self {
        Self {
            human: DataSet::empty(),
            robot: DataSet::empty(),
            robot_master: DataSet::empty(),
            audit,
        }
    }
}

/// Run the pipeline stamped with today's date.
pub fn run(inputs: &PipelineInputs, cfg: &PipelineConfig) -> PipelineResult<PipelineOutput> {
    run_with_import_date(inputs, cfg, Local::now().date_naive())
}

/// Run the pipeline with an explicit import date, which keeps runs reproducible in tests and
/// reprocessing.
pub fn run_with_import_date(
    inputs: &PipelineInputs,
    cfg: &PipelineConfig,
    import_date: NaiveDate,
) -> PipelineResult<PipelineOutput> {
    let mut audit = AuditLog::new();

    if inputs.mailing.row_count() == 0 {
        let report = StageReport::fatal("load", "primary mailing dataset missing or empty");
        error!(stage = "load", "{report}");
        audit.push(report);
        return Ok(PipelineOutput::aborted(audit));
    }

    let mailing = standardize_columns(&inputs.mailing);
    let blocklist = inputs.blocklist.as_ref().map(standardize_columns);
    let payments = inputs.payments.as_ref().map(standardize_columns);
    let enrichment: Vec<DataSet> = inputs.enrichment.iter().map(standardize_columns).collect();
    audit.push(StageReport::applied(
        "load",
        mailing.row_count(),
        mailing.row_count(),
        format!("loaded {} records, column names standardized", mailing.row_count()),
    ));

    let missing: Vec<String> = cfg
        .required_columns
        .iter()
        .filter(|c| !mailing.has_column(c))
        .cloned()
        .collect();
    if !missing.is_empty() {
        let err = PipelineError::SchemaValidation {
            dataset: "mailing".to_string(),
            missing,
        };
        error!(stage = "load", %err);
        audit.push(StageReport::fatal("load", err.to_string()));
        return Err(err);
    }

    let (mailing, report) = clean_rebellious_columns(&mailing, &cfg.mailing);
    audit.push(report);

    let (mailing, report) = remove_by_status(&mailing, blocklist.as_ref(), &cfg.status_removal);
    audit.push(report);
    let (mailing, report) =
        remove_by_threshold(&mailing, blocklist.as_ref(), &cfg.threshold_removal);
    audit.push(report);
    let (mailing, report) = remove_paid(&mailing, payments.as_ref(), &cfg.payment_removal);
    audit.push(report);

    let (mailing, report) = aggregate(
        &mailing,
        &cfg.primary_key,
        &cfg.mailing.amount,
        &cfg.mailing.service_point,
    );
    audit.push(report);

    let (mailing, report) = deduplicate(&mailing, &cfg.primary_key, &cfg.name_column);
    audit.push(report);

    let (mailing, report) = enrich_phones(&mailing, &enrichment, &cfg.enrichment);
    audit.push(report);

    let (mailing, report) = add_regularize_flag(&mailing, &cfg.mailing.regularize_source);
    audit.push(report);
    let (mailing, report) = stamp_import_date(&mailing, import_date, &cfg.import_date_format);
    audit.push(report);

    let (mailing, report) = retain_unblocked(&mailing, &cfg.block_filter);
    audit.push(report);

    let policy = ThresholdSegmentation {
        groups: &cfg.groups,
        product_column: &cfg.mailing.product,
        debt_column: TOTAL_DEBT_COLUMN,
    };
    let (channels, report) = segment(&mailing, &policy);
    audit.push(report);

    let (human, report) = order_human(&channels.human, &cfg.priority_order, TOTAL_DEBT_COLUMN);
    audit.push(report);

    let (human, mut report) = apply_layout(&human, &cfg.layout);
    report.stage = "layout-human".to_string();
    audit.push(report);
    let (robot, mut report) = apply_layout(&channels.robot, &cfg.layout);
    report.stage = "layout-robot".to_string();
    audit.push(report);

    let (robot_master, report) = build_robot_master(&robot, &cfg.robot);
    audit.push(report);

    let (human, mut report) = finalize_for_export(&human, &cfg.layout);
    report.stage = "finalize-human".to_string();
    audit.push(report);
    let (robot, mut report) = finalize_for_export(&robot, &cfg.layout);
    report.stage = "finalize-robot".to_string();
    audit.push(report);

    info!(
        human = human.row_count(),
        robot = robot.row_count(),
        customers = robot_master.row_count(),
        "pipeline run complete"
    );
    Ok(PipelineOutput {
        human,
        robot,
        robot_master,
        audit,
    })
}
