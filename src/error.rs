//! Error taxonomy for the harvester.
//!
//! Three conditions come from the harvesting contract itself:
//! - `MissingDependency`: a source file imports a module nobody can provide (fatal)
//! - `UnrepresentableRecord`: a record the YAML serializer cannot encode (dropped)
//! - `SchemaCanonicalization`: the schema printer rejects a schema (slot left empty)
//!
//! Everything else (lexing, parsing, evaluation, I/O) stops the run.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Stable classification of every harvest failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A source file imported a module outside the allow-list that could not be resolved
    MissingDependency,
    /// A harvested record contains a value YAML cannot encode
    UnrepresentableRecord,
    /// The schema printer rejected a registered schema
    SchemaCanonicalization,
    /// The source file could not be tokenized or parsed
    Parse,
    /// The source file failed while being evaluated
    Eval,
    /// Reading the corpus or writing documents failed
    Io,
}

impl ErrorCode {
    /// Whether the condition aborts the run instead of dropping data.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ErrorCode::UnrepresentableRecord | ErrorCode::SchemaCanonicalization
        )
    }

    /// Get the error category for logs
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::MissingDependency => "resolution_error",
            ErrorCode::UnrepresentableRecord | ErrorCode::SchemaCanonicalization => "lossy",
            ErrorCode::Parse | ErrorCode::Eval => "corpus_error",
            ErrorCode::Io => "io_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// =============================================================================
// HARVEST ERROR
// =============================================================================

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("cannot resolve module '{specifier}' imported from {importer}")]
    MissingDependency { specifier: String, importer: String },

    #[error("record '{name}' cannot be serialized: {reason}")]
    UnrepresentableRecord { name: String, reason: String },

    #[error("schema #{index} could not be printed: {reason}")]
    SchemaCanonicalization { index: usize, reason: String },

    #[error("{file}:{line}:{column}: {message}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("{file}: {message}")]
    Eval { file: String, message: String },

    #[error("i/o failure on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HarvestError {
    pub fn code(&self) -> ErrorCode {
        match self {
            HarvestError::MissingDependency { .. } => ErrorCode::MissingDependency,
            HarvestError::UnrepresentableRecord { .. } => ErrorCode::UnrepresentableRecord,
            HarvestError::SchemaCanonicalization { .. } => ErrorCode::SchemaCanonicalization,
            HarvestError::Parse { .. } => ErrorCode::Parse,
            HarvestError::Eval { .. } => ErrorCode::Eval,
            HarvestError::Io { .. } => ErrorCode::Io,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarvestError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
