//! HTTP request handlers for the book server.
//!
//! # Endpoints
//!
//! - `GET /healthz` - Liveness probe
//! - `GET /{*path}` - Book content (`/` serves the index document)

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::archive::ArchiveSource;
use crate::content::BookService;
use crate::error::ContentError;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the book service.
pub struct AppState<A: ArchiveSource> {
    /// Resolves and renders book content
    pub book_service: Arc<BookService<A>>,
}

impl<A: ArchiveSource> AppState<A> {
    pub fn new(book_service: BookService<A>) -> Self {
        Self {
            book_service: Arc::new(book_service),
        }
    }
}

impl<A: ArchiveSource> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            book_service: Arc::clone(&self.book_service),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

// =============================================================================
// Error Conversion
// =============================================================================

impl IntoResponse for ContentError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ContentError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            ContentError::Render { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "render_error"),
            ContentError::Archive(_) => (StatusCode::INTERNAL_SERVER_ERROR, "archive_error"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Serve the archive entry for the request path.
///
/// # Response
///
/// - `200 OK` with the entry's media type
/// - `404 Not Found` if the path has no archive entry
/// - `500 Internal Server Error` if a document cannot be rewritten
pub async fn content_handler<A: ArchiveSource + 'static>(
    State(state): State<AppState<A>>,
    uri: Uri,
) -> Result<Response, ContentError> {
    let rendered = state.book_service.handle(uri.path()).await?;

    Ok((
        [(header::CONTENT_TYPE, rendered.entry.media_type)],
        rendered.body,
    )
        .into_response())
}

/// Liveness probe. Always public, never touches the archive.
///
/// # Response
///
/// `204 No Content`
pub async fn health_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}
