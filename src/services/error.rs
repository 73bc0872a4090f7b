use std::time::Duration;
use thiserror::Error;

/// Errors that fail a whole pipeline run.
///
/// Soft outcomes (missing accounts, files a parser could not resolve) are never reported
/// through this type; they are carried as data in the run output.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Parser \"{0}\" does not exist")]
    ParserNotFound(String),

    #[error("Invalid glob pattern \"{pattern}\": {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Invalid regular expression \"{pattern}\": {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    #[error("Cannot build a file URI for {0}")]
    FileUri(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
