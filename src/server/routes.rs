//! Router configuration for the book server.
//!
//! # Route Structure
//!
//! ```text
//! /healthz          - Liveness probe (public)
//! /                 - Index document (protected when auth is configured)
//! /{*path}          - Book content and the sign-in callback (protected)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use epub_library::archive::EpubArchive;
//! use epub_library::content::BookService;
//! use epub_library::server::{create_router, RouterConfig};
//!
//! let archive = EpubArchive::load("/book.epub").await?;
//! let router = create_router(BookService::new(archive), RouterConfig::without_auth());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{content_handler, health_handler, AppState};
use crate::archive::ArchiveSource;
use crate::auth::{auth_middleware, AuthState};
use crate::content::BookService;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Sign-in and authorization for content routes (None = public)
    pub auth: Option<AuthState>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a configuration that protects content with `auth`.
    pub fn new(auth: AuthState) -> Self {
        Self {
            auth: Some(auth),
            enable_tracing: true,
        }
    }

    /// Create a configuration serving content without sign-in.
    pub fn without_auth() -> Self {
        Self {
            auth: None,
            enable_tracing: true,
        }
    }

    /// Set or replace the authentication layer.
    pub fn with_auth(mut self, auth: AuthState) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// `/healthz` is registered after the auth layer so it stays reachable
/// without a session.
pub fn create_router<A>(book_service: BookService<A>, config: RouterConfig) -> Router
where
    A: ArchiveSource + 'static,
{
    let app_state = AppState::new(book_service);

    let content_routes = Router::new()
        .route("/", get(content_handler::<A>))
        .route("/{*path}", get(content_handler::<A>))
        .with_state(app_state);

    let content_routes = match config.auth {
        Some(auth) => {
            content_routes.layer(middleware::from_fn_with_state(auth, auth_middleware))
        }
        None => content_routes,
    };

    let router = content_routes.route("/healthz", get(health_handler));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

// =============================================================================
// Tests
// =============================================================================
