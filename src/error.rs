use std::path::PathBuf;

/// Errors raised by the extraction and summarization pipeline.
///
/// An empty selection is not an error: extraction reports it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("unknown program code '{code}'")]
    UnknownProgram { code: String },

    #[error(
        "missing structural columns ({}); check that the input follows the survey schema",
        missing.join(", ")
    )]
    MissingStructuralColumns { missing: Vec<String> },

    #[error("invalid date '{value}': expected dd-mm-yyyy")]
    InvalidDateRange { value: String },

    #[error("invalid registry entry '{code}': {reason}")]
    InvalidRegistry { code: String, reason: String },

    #[error("input has {found} columns but schema {version} needs at least {expected}")]
    SchemaMismatch {
        version: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("unsupported input file {path}: expected a spreadsheet or csv")]
    UnsupportedInput { path: PathBuf },

    #[error("failed to read spreadsheet {path}: {source}")]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("failed to read csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
