//! `mailing-etl` is a batch pipeline that turns raw collection mailing extracts into the two
//! dialer-ready export tables: a priority-ordered human channel and a robot channel with its
//! per-customer master table.
//!
//! Data lives in an in-memory [`types::DataSet`] (typed [`types::Value`] cells against a
//! [`types::Schema`]); every stage consumes a dataset plus its slice of the immutable
//! [`config::PipelineConfig`] and produces a new dataset together with a
//! [`audit::StageReport`]. The accumulated [`audit::AuditLog`] is the run's protocol.
//!
//! ## What a run does
//!
//! - cleanup: column-name standardization, currency/encoding/identifier repair
//! - cross-file removals: disposition statuses, repeated critical dispositions, recorded
//!   payments, plus the mailing-local block filter
//! - per-customer rollups broadcast onto every row, then deduplication
//! - phone enrichment join (ranked by score, never dropping a mailing row)
//! - derived columns, channel segmentation behind [`pipeline::segment::SegmentationPolicy`],
//!   priority ordering, export layout, and text finalization
//!
//! ## Quick example: run the pipeline
//!
//! ```
//! use mailing_etl::config::PipelineConfig;
//! use mailing_etl::pipeline::{run, PipelineInputs};
//! use mailing_etl::types::{DataSet, DataType, Field, Schema, Value};
//!
//! # fn main() -> Result<(), mailing_etl::error::PipelineError> {
//! let mailing = DataSet::new(
//!     Schema::new(vec![
//!         Field::new("ncpf", DataType::Utf8),
//!         Field::new("nomecad", DataType::Utf8),
//!         Field::new("empresa", DataType::Utf8),
//!         Field::new("liquido", DataType::Float64),
//!         Field::new("ucv", DataType::Utf8),
//!     ]),
//!     vec![vec![
//!         Value::Utf8("111".into()),
//!         Value::Utf8("MARIA".into()),
//!         Value::Utf8("EPB".into()),
//!         Value::Float64(250.0),
//!         Value::Utf8("u1".into()),
//!     ]],
//! );
//! let inputs = PipelineInputs { mailing, ..PipelineInputs::default() };
//! let out = run(&inputs, &PipelineConfig::default())?;
//! for line in out.audit.render_lines() {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

pub use error::{PipelineError, PipelineResult};
