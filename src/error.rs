//! Error types for the Orderbox server

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type (HTTP boundary)
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("S3 SDK error: {0}")]
    SdkError(String),

    #[error("Presign error: {0}")]
    Presign(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by verified transfers and bundle assembly
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Checksum mismatch for {key}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to fetch {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: Box<TransferError>,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,
}

impl TransferError {
    /// Wrap an error as a fetch failure for `key`
    pub fn fetch(key: impl Into<String>, source: TransferError) -> Self {
        Self::Fetch {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Whether the failure is a detected data corruption
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }

    /// Whether the underlying cause is a missing object or file
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Storage(StorageError::ObjectNotFound(_)) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Self::Fetch { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Transfer(e) => {
                tracing::error!("Transfer error: {}", e);
                match e {
                    TransferError::ChecksumMismatch { key, .. } => (
                        StatusCode::CONFLICT,
                        "checksum_mismatch",
                        format!("Checksum mismatch: {} was corrupted during upload", key),
                    ),
                    TransferError::Fetch { key, .. } if e.is_not_found() => {
                        (StatusCode::NOT_FOUND, "not_found", format!("Object not found: {}", key))
                    }
                    TransferError::Fetch { key, source }
                        if matches!(**source, TransferError::Configuration(_)) =>
                    {
                        (
                            StatusCode::BAD_REQUEST,
                            "invalid_key",
                            format!("Invalid item key {}: {}", key, source),
                        )
                    }
                    TransferError::Fetch { key, .. } => (
                        StatusCode::BAD_GATEWAY,
                        "fetch_error",
                        format!("Failed to fetch {}", key),
                    ),
                    TransferError::Storage(StorageError::ObjectNotFound(key)) => {
                        (StatusCode::NOT_FOUND, "not_found", format!("Object not found: {}", key))
                    }
                    TransferError::Storage(StorageError::AccessDenied(_)) => (
                        StatusCode::FORBIDDEN,
                        "access_denied",
                        "Access denied".to_string(),
                    ),
                    TransferError::Storage(_) => (
                        StatusCode::BAD_GATEWAY,
                        "storage_error",
                        "Storage error".to_string(),
                    ),
                    TransferError::Configuration(msg) => {
                        (StatusCode::BAD_REQUEST, "configuration_error", msg.clone())
                    }
                    TransferError::Timeout(_) => (
                        StatusCode::GATEWAY_TIMEOUT,
                        "timeout",
                        "Operation timed out".to_string(),
                    ),
                    TransferError::Cancelled => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "cancelled",
                        "Operation cancelled".to_string(),
                    ),
                    TransferError::Archive(_) | TransferError::Zip(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "archive_error",
                        "Failed to build archive".to_string(),
                    ),
                    TransferError::Io(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "io_error",
                        "IO error".to_string(),
                    ),
                }
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
