//! Error types for the contract signing system.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid contract: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Certificate error: {message}")]
    Certificate { message: String },

    #[error("Signing error: {message}")]
    Signing { message: String },

    #[error("Signing request {request_id} expired at {expires_at}")]
    ExpiredRequest {
        request_id: Uuid,
        expires_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("Signing request {request_id} is already {status}")]
    AlreadyTerminal { request_id: Uuid, status: String },

    #[error("Contract {contract_id} already has a pending signing request ({request_id})")]
    PendingRequestExists { contract_id: String, request_id: Uuid },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Repository error: {0}")]
    Repository(#[source] anyhow::Error),

    #[error("Document storage error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("Notification error: {0}")]
    Notification(#[source] anyhow::Error),
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn certificate(message: impl Into<String>) -> Self {
        Self::Certificate {
            message: message.into(),
        }
    }

    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
