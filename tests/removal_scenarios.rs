//! Degradation and failure scenarios: missing reference datasets, threshold suppression,
//! schema contract violations, and the empty-mailing abort.

use chrono::NaiveDate;
use mailing_etl::audit::StageOutcome;
use mailing_etl::config::PipelineConfig;
use mailing_etl::pipeline::{run_with_import_date, PipelineInputs};
use mailing_etl::types::{DataSet, DataType, Field, Schema, Value};
use mailing_etl::PipelineError;

fn utf8(s: &str) -> Value {
    Value::Utf8(s.to_string())
}

fn minimal_mailing() -> DataSet {
    DataSet::new(
        Schema::new(vec![
            Field::new("ncpf", DataType::Utf8),
            Field::new("nomecad", DataType::Utf8),
            Field::new("empresa", DataType::Utf8),
            Field::new("liquido", DataType::Float64),
            Field::new("ucv", DataType::Utf8),
        ]),
        vec![
            vec![utf8("111"), utf8("MARIA"), utf8("EPB"), Value::Float64(300.0), utf8("u1")],
            vec![utf8("222"), utf8("JOSE"), utf8("EPB"), Value::Float64(150.0), utf8("u2")],
        ],
    )
}

fn blocklist(rows: Vec<(&str, &str)>) -> DataSet {
    DataSet::new(
        Schema::new(vec![
            Field::new("idcliente", DataType::Utf8),
            Field::new("status", DataType::Utf8),
        ]),
        rows.into_iter()
            .map(|(id, status)| vec![utf8(id), utf8(status)])
            .collect(),
    )
}

fn import_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
}

#[test]
fn missing_reference_datasets_degrade_to_skips_without_losing_rows() {
    let inputs = PipelineInputs {
        mailing: minimal_mailing(),
        ..PipelineInputs::default()
    };
    let mut cfg = PipelineConfig::default();
    cfg.status_removal.statuses = vec!["CONTA PAGA CLIENTE".to_string()];
    cfg.threshold_removal.critical_statuses = vec!["CRITICO".to_string()];

    let out = run_with_import_date(&inputs, &cfg, import_date()).unwrap();

    for stage in ["status-removal", "threshold-removal", "payment-removal"] {
        let report = out.audit.report_for(stage).unwrap();
        assert_eq!(report.outcome, StageOutcome::Skipped, "stage {stage}");
        assert_eq!(report.removed(), 0);
    }
    // Both customers survive the removals; no group config leaves both channels empty.
    let segment = out.audit.report_for("segment").unwrap();
    assert_eq!(segment.rows_before, 2);
    assert!(segment.message.contains("2 in no configured group"));
}

#[test]
fn repeated_critical_dispositions_suppress_a_customer() {
    let inputs = PipelineInputs {
        mailing: minimal_mailing(),
        blocklist: Some(blocklist(vec![
            ("111", "TITULAR FALECIDO"),
            ("111", "titular falecido"),
            ("111", "TITULAR FALECIDO"),
            ("222", "TITULAR FALECIDO"),
        ])),
        ..PipelineInputs::default()
    };
    let mut cfg = PipelineConfig::default();
    cfg.threshold_removal.critical_statuses = vec!["TITULAR FALECIDO".to_string()];

    let out = run_with_import_date(&inputs, &cfg, import_date()).unwrap();

    let report = out.audit.report_for("threshold-removal").unwrap();
    assert_eq!(report.removed(), 1);
    // 222 had only one critical disposition and stays.
    let dedup = out.audit.report_for("dedup").unwrap();
    assert_eq!(dedup.rows_after, 1);
}

#[test]
fn schema_contract_violation_is_a_typed_error() {
    let inputs = PipelineInputs {
        mailing: DataSet::new(
            Schema::new(vec![
                Field::new("ncpf", DataType::Utf8),
                Field::new("liquido", DataType::Float64),
            ]),
            vec![vec![utf8("111"), Value::Float64(10.0)]],
        ),
        ..PipelineInputs::default()
    };
    let err =
        run_with_import_date(&inputs, &PipelineConfig::default(), import_date()).unwrap_err();
    match err {
        PipelineError::SchemaValidation { dataset, missing } => {
            assert_eq!(dataset, "mailing");
            assert_eq!(missing, vec!["nomecad", "empresa", "ucv"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_mailing_returns_empty_tables_with_a_fatal_entry() {
    let out = run_with_import_date(
        &PipelineInputs::default(),
        &PipelineConfig::default(),
        import_date(),
    )
    .unwrap();
    assert_eq!(out.human.row_count(), 0);
    assert_eq!(out.robot.row_count(), 0);
    assert_eq!(out.robot_master.row_count(), 0);
    let load = out.audit.report_for("load").unwrap();
    assert_eq!(load.outcome, StageOutcome::Fatal);
    assert!(load.to_string().contains("FATAL"));
}
