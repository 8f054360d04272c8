//! Book Service for resolving and rendering archive content.
//!
//! The BookService is the entry point for content requests. For every request
//! it:
//! 1. Normalizes the path (`/` becomes the index document)
//! 2. Maps the path onto an archive entry under the content prefix
//! 3. Infers the media type from the extension
//! 4. Opens the entry and, for markup, rewrites it
//!
//! Nothing is cached: each call re-opens the entry and re-renders it.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::archive::ArchiveSource;
use crate::error::{ArchiveError, ContentError};

use super::markup::inject_reader_nodes;
use super::media::{content_kind, media_type_for, ContentKind};

/// Default namespace under which book content lives in the archive.
pub const DEFAULT_CONTENT_PREFIX: &str = "EPUB";

/// Default document served for `/` (the navigation document).
pub const DEFAULT_INDEX_DOCUMENT: &str = "/nav.xhtml";

// =============================================================================
// Content Entry
// =============================================================================

/// A request path resolved against the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    /// Path as requested, after index normalization and percent-decoding
    pub request_path: String,

    /// Exact archive entry name
    pub archive_path: String,

    /// Media type inferred from the extension
    pub media_type: String,

    /// Whether the entry is rewritten or copied
    pub kind: ContentKind,
}

/// A resolved entry together with the bytes to send.
#[derive(Debug, Clone)]
pub struct RenderedContent {
    pub entry: ContentEntry,
    pub body: Bytes,
}

// =============================================================================
// Book Service
// =============================================================================

/// Service resolving HTTP paths to rendered archive content.
///
/// # Example
///
/// ```ignore
/// use epub_library::archive::EpubArchive;
/// use epub_library::content::BookService;
///
/// let archive = EpubArchive::load("/book.epub").await?;
/// let service = BookService::new(archive);
///
/// let rendered = service.handle("/").await?;
/// assert_eq!(rendered.entry.archive_path, "EPUB/nav.xhtml");
/// ```
pub struct BookService<A: ArchiveSource> {
    archive: Arc<A>,
    prefix: String,
    index_document: String,
}

impl<A: ArchiveSource> BookService<A> {
    /// Create a service using the default prefix and index document.
    pub fn new(archive: A) -> Self {
        Self::with_layout(archive, DEFAULT_CONTENT_PREFIX, DEFAULT_INDEX_DOCUMENT)
    }

    /// Create a service with a custom content prefix and index document.
    pub fn with_layout(
        archive: A,
        prefix: impl Into<String>,
        index_document: impl Into<String>,
    ) -> Self {
        Self {
            archive: Arc::new(archive),
            prefix: prefix.into().trim_end_matches('/').to_string(),
            index_document: index_document.into(),
        }
    }

    /// The underlying archive.
    pub fn archive(&self) -> &A {
        &self.archive
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn index_document(&self) -> &str {
        &self.index_document
    }

    /// Rewrite `/` to the index document; other paths are unchanged.
    pub fn normalize<'a>(&'a self, request_path: &'a str) -> &'a str {
        if request_path == "/" {
            &self.index_document
        } else {
            request_path
        }
    }

    /// Archive entry name for a normalized request path.
    pub fn archive_key(&self, path: &str) -> String {
        let relative = path.strip_prefix('/').unwrap_or(path);
        if self.prefix.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.prefix, relative)
        }
    }

    /// Resolve a (percent-encoded) request path to an archive entry.
    pub fn resolve(&self, request_path: &str) -> Result<ContentEntry, ContentError> {
        let not_found = || ContentError::NotFound {
            request_path: request_path.to_string(),
        };

        let decoded = urlencoding::decode(request_path).map_err(|_| not_found())?;
        let path = self.normalize(&decoded);
        let archive_path = self.archive_key(path);

        if !self.archive.contains(&archive_path) {
            debug!(
                request_path = request_path,
                archive_path = %archive_path,
                "No archive entry for request"
            );
            return Err(not_found());
        }

        Ok(ContentEntry {
            request_path: path.to_string(),
            media_type: media_type_for(&archive_path),
            kind: content_kind(&archive_path),
            archive_path,
        })
    }

    /// Resolve, open and render the content for a request path.
    ///
    /// # Errors
    ///
    /// - [`ContentError::NotFound`] if the path has no archive entry
    /// - [`ContentError::Render`] if a markup document cannot be rewritten
    /// - [`ContentError::Archive`] if a listed entry cannot be read
    pub async fn handle(&self, request_path: &str) -> Result<RenderedContent, ContentError> {
        let entry = self.resolve(request_path)?;

        let raw = self
            .archive
            .open(&entry.archive_path)
            .await
            .map_err(|e| match e {
                ArchiveError::NotFound(_) => ContentError::NotFound {
                    request_path: request_path.to_string(),
                },
                other => ContentError::Archive(other),
            })?;

        let body = match entry.kind {
            ContentKind::Verbatim => raw,
            ContentKind::Markup => {
                let rendered = inject_reader_nodes(&raw).map_err(|e| ContentError::Render {
                    archive_path: entry.archive_path.clone(),
                    message: e.to_string(),
                })?;
                Bytes::from(rendered)
            }
        };

        Ok(RenderedContent { entry, body })
    }
}
