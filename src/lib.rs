//! # EPUB Library
//!
//! An HTTP server for a single EPUB book.
//!
//! Request paths are mapped onto entries of the book's zip archive. Markup
//! documents get a viewport, a reading stylesheet and an analytics tag added
//! to their head before they are sent; everything else is served as stored.
//! Access can optionally be limited to users signed in through an OpenID
//! Connect provider whose claims match a configured policy.
//!
//! ## Architecture
//!
//! - [`archive`] - Read-only access to archive entries
//! - [`content`] - Path resolution, media types and markup rewriting
//! - [`auth`] - OIDC sign-in flow and claim-based authorization
//! - [`server`] - Axum handlers and router composition
//! - [`config`] - CLI and environment configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use epub_library::{create_router, BookService, EpubArchive, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let archive = EpubArchive::load("/book.epub").await.unwrap();
//!     let router = create_router(BookService::new(archive), RouterConfig::without_auth());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod archive;
pub mod auth;
pub mod config;
pub mod content;
pub mod error;
pub mod server;

// Re-export commonly used types
pub use archive::{ArchiveSource, EpubArchive, MemoryArchive};
pub use auth::{
    auth_middleware, AuthError, AuthState, AuthorizationPolicy, ClaimSet, IdentityProvider,
    OidcProvider, TokenSet, VerifiedClaims,
};
pub use config::{Config, OidcSettings};
pub use content::{BookService, ContentEntry, ContentKind, RenderedContent};
pub use error::{ArchiveError, ConfigError, ContentError, ProviderError};
pub use server::{create_router, AppState, ErrorResponse, RouterConfig};
