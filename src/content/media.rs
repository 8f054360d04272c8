//! Media type inference from file extensions.

use std::path::Path;

/// Media type used when the extension is unknown.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Extensions whose documents are rewritten before serving.
pub const MARKUP_EXTENSIONS: &[&str] = &["xhtml", "xht", "html", "htm"];

/// How an entry is delivered to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Parsed, rewritten and re-serialized
    Markup,
    /// Copied byte for byte
    Verbatim,
}

/// Media type for a path, falling back to [`DEFAULT_MEDIA_TYPE`].
pub fn media_type_for(path: &str) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_MEDIA_TYPE)
        .to_string()
}

/// Delivery strategy for a path.
pub fn content_kind(path: &str) -> ContentKind {
    let is_markup = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            MARKUP_EXTENSIONS
                .iter()
                .any(|markup| ext.eq_ignore_ascii_case(markup))
        })
        .unwrap_or(false);

    if is_markup {
        ContentKind::Markup
    } else {
        ContentKind::Verbatim
    }
}
