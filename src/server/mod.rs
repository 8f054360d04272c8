//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │                 GET /healthz    GET /{*path}                    │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────────┐  ┌─────────────────────┐  │
//! │  │  handlers   │  │ auth middleware │  │       routes        │  │
//! │  │ (content)   │  │ (crate::auth)   │  │  (router config)    │  │
//! │  └─────────────┘  └─────────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{content_handler, health_handler, AppState, ErrorResponse};
pub use routes::{create_router, RouterConfig};
