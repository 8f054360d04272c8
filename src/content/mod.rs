//! Content resolution and rendering.
//!
//! This module turns HTTP request paths into the bytes served to the reader.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              BookService                │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │    media     │  │     markup      │  │
//! │  │ (extension → │  │ (parse → inject │  │
//! │  │  media type) │  │  → serialize)   │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             ArchiveSource               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`BookService`]: resolves a path, opens the entry, renders it
//! - [`ContentEntry`]: the (request path, archive path, media type) triple
//! - [`inject_reader_nodes`]: the markup rewrite applied to book documents
//! - [`media_type_for`] / [`content_kind`]: extension-based classification

mod markup;
mod media;
mod service;

pub use markup::{
    inject_reader_nodes, reader_nodes, Document, Element, MarkupError, Node,
    ANALYTICS_TRACKING_ID, READER_STYLESHEET,
};
pub use media::{
    content_kind, media_type_for, ContentKind, DEFAULT_MEDIA_TYPE, MARKUP_EXTENSIONS,
};
pub use service::{
    BookService, ContentEntry, RenderedContent, DEFAULT_CONTENT_PREFIX, DEFAULT_INDEX_DOCUMENT,
};
