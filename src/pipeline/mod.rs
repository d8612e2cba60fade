//! The pipeline stages, in production order.
//!
//! Each stage is a free function from an immutable dataset (plus its slice of the
//! configuration) to a new dataset and a [`StageReport`](crate::audit::StageReport).
//! [`runner::run`] composes them; every stage also stands alone for targeted reprocessing
//! and testing.

pub mod aggregate;
pub mod dedup;
pub mod derive;
pub mod enrich;
pub mod filters;
pub mod finalize;
pub mod layout;
pub mod normalize;
pub mod robot;
pub mod runner;
pub mod segment;

pub use runner::{run, run_with_import_date, PipelineInputs, PipelineOutput};
