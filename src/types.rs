// Error types shared by the ingestion pipeline and the HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::parser::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid file: {0}")]
    InvalidFile(String),

    /// Dataset missing or owned by someone else. Both read the same.
    #[error("Dataset not found")]
    NotFound(Uuid),

    #[error("Storage error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("File storage error: {0}")]
    Blob(#[from] std::io::Error),
}

impl IngestError {
    /// Whether the uploader can fix this by sending a different file.
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, IngestError::Parse(_) | IngestError::InvalidFile(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Ingest(IngestError::Store(err))
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Ingest(e) if e.is_user_correctable() => StatusCode::BAD_REQUEST,
            AppError::Ingest(IngestError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Ingest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
