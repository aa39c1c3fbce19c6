use thiserror::Error;

/// Errors raised by registry operations.
///
/// Every error is raised before any file is written, so a failed
/// operation never leaves a partial mutation behind.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("referential integrity violation: {0}")]
    ReferentialIntegrity(String),

    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("export error: {0}")]
    Export(#[from] serde_json::Error),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        CoreError::ReferentialIntegrity(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
