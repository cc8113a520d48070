use rusqlite;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {message}")]
    Database { message: String },

    #[error("storage is locked: {message}")]
    StorageLocked { message: String },

    #[error("storage unavailable after {attempts} attempt(s): {message}")]
    StorageUnavailable { attempts: u32, message: String },

    #[error("record not found")]
    NotFound,

    #[error("record conflict: {message}")]
    Conflict { message: String },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        details: Option<JsonValue>,
    },

    #[error("submission is missing {} KPI status(es): {}", missing.len(), missing.join(", "))]
    IncompleteSubmission { missing: Vec<String> },

    #[error("invalid KPI status: {value}")]
    InvalidStatus { value: String },

    #[error("unknown KPI: {name}")]
    UnknownKpi { name: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "validation error");
        AppError::Validation {
            message,
            source: None,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, details = %details, "validation error with details");
        AppError::Validation {
            message,
            source: None,
            details: Some(details),
        }
    }

    pub fn incomplete_submission(missing: Vec<String>) -> Self {
        warn!(target: "app::validation", missing = missing.len(), "incomplete submission rejected");
        AppError::IncompleteSubmission { missing }
    }

    pub fn invalid_status(value: impl Into<String>) -> Self {
        let value = value.into();
        warn!(target: "app::validation", %value, "invalid KPI status");
        AppError::InvalidStatus { value }
    }

    pub fn unknown_kpi(name: impl Into<String>) -> Self {
        let name = name.into();
        warn!(target: "app::validation", %name, "unknown KPI");
        AppError::UnknownKpi { name }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::conflict", %message, "conflict error");
        AppError::Conflict { message }
    }

    pub fn not_found() -> Self {
        warn!(target: "app::database", "resource not found");
        AppError::NotFound
    }

    pub fn database(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::database", %message, "database error");
        AppError::Database { message }
    }

    pub fn storage_locked(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::database", %message, "storage locked");
        AppError::StorageLocked { message }
    }

    pub fn storage_unavailable(attempts: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::database", attempts, %message, "storage unavailable");
        AppError::StorageUnavailable { attempts, message }
    }

    pub fn config(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::config", %message, "configuration error");
        AppError::Config(message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::other", %message, "other error");
        AppError::Other(message)
    }

    /// Whether the failure is a lock held by another writer and worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::StorageLocked { .. })
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::Error::{QueryReturnedNoRows, SqliteFailure};
        use rusqlite::ErrorCode;

        match &error {
            QueryReturnedNoRows => AppError::not_found(),
            SqliteFailure(err, _)
                if err.code == ErrorCode::DatabaseBusy || err.code == ErrorCode::DatabaseLocked =>
            {
                AppError::storage_locked(error.to_string())
            }
            SqliteFailure(err, _) if err.code == ErrorCode::CannotOpen => {
                AppError::storage_unavailable(1, error.to_string())
            }
            SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                AppError::conflict("unique or constraint violation")
            }
            _ => {
                error!(target: "app::database", error = ?error, "sqlite error");
                AppError::database(error.to_string())
            }
        }
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(error: serde_yaml::Error) -> Self {
        AppError::config(error.to_string())
    }
}
