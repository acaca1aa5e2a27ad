use crate::domain::booking::{BookingAction, BookingStatus};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    #[diagnostic(code(staybook::validation))]
    Validation(String),

    #[error("Conflict: {0}")]
    #[diagnostic(code(staybook::conflict))]
    Conflict(String),

    #[error("Permission denied: {0}")]
    #[diagnostic(code(staybook::permission))]
    Permission(String),

    #[error("Cannot {action} a {from} booking")]
    #[diagnostic(code(staybook::invalid_transition))]
    InvalidTransition {
        from: BookingStatus,
        action: BookingAction,
    },

    #[error("Payment gateway error: {0}")]
    #[diagnostic(code(staybook::gateway))]
    Gateway(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(staybook::configuration),
        help("set the variable in the environment or in a .env file")
    )]
    Configuration(String),

    #[error("{entity} {id} not found")]
    #[diagnostic(code(staybook::not_found))]
    NotFound { entity: &'static str, id: String },

    #[error("Storage error: {0}")]
    #[diagnostic(code(staybook::storage))]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(staybook::serialization))]
    Serialization(String),

    #[error("Malformed command: {0}")]
    #[diagnostic(code(staybook::malformed_command))]
    MalformedCommand(#[from] serde_json::Error),
}

impl BookingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for BookingError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Storage(err.into_string())
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
