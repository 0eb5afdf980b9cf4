use serde::{Deserialize, Serialize};

/// Application error type covering ingestion, execution and infrastructure
/// failures. Execution-time variants (`VariableResolution`, `Transport`,
/// `Timeout`) are scoped to one step and are converted into result fields
/// by the engine rather than propagated past the case boundary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Ingestion errors (fatal to one schema upload only)
    #[error("Schema parse error: {0}")]
    SchemaParse(String),

    #[error("Reference resolution error: {0}")]
    ReferenceResolution(String),

    // Execution errors (scoped to one step/case)
    #[error("Variable resolution error: {0}")]
    VariableResolution(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    // Resource errors
    #[error("{0} not found")]
    NotFound(String),

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Infrastructure errors (abort the run when unrecoverable)
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Queue error: {0}")]
    Queue(String),
}

/// Stable machine-readable kind tag, recorded alongside step results so
/// consumers can classify failures without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SchemaParse,
    ReferenceResolution,
    VariableResolution,
    Transport,
    Timeout,
    NotFound,
    Validation,
    Persistence,
    Queue,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SchemaParse(_) => ErrorKind::SchemaParse,
            Self::ReferenceResolution(_) => ErrorKind::ReferenceResolution,
            Self::VariableResolution(_) => ErrorKind::VariableResolution,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Queue(_) => ErrorKind::Queue,
        }
    }

    /// Transport-class errors halt the remaining steps of a case and are
    /// eligible for retry; everything else is deterministic.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

// Convenient conversions from common error types

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else {
            AppError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SchemaParse(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::SchemaParse(err.to_string())
    }
}

/// Result type alias used throughout the crate
pub type AppResult<T> = Result<T, AppError>;
