use thiserror::Error;

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type returned by pipeline entry points.
///
/// Most stage-level problems are not errors: stages with a defined default behavior degrade to
/// a skip and report it through the audit log. Only conditions with no safe skip path surface
/// here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The primary mailing dataset is missing or empty at orchestrator entry.
    #[error("primary mailing dataset is missing or empty")]
    MissingPrimaryDataset,

    /// An input dataset does not carry the columns its schema contract requires.
    #[error("schema validation failed for '{dataset}': missing required columns {missing:?}")]
    SchemaValidation {
        dataset: String,
        missing: Vec<String>,
    },

    /// The pipeline configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
