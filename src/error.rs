use thiserror::Error;

/// Errors raised by an archive source.
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// The archive file could not be read
    #[error("Unable to open archive {path}: {message}")]
    Open { path: String, message: String },

    /// The file was read but is not a usable archive
    #[error("Invalid archive {path}: {message}")]
    Invalid { path: String, message: String },

    /// No entry with this exact path exists
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// The entry exists but its bytes could not be extracted
    #[error("Unable to read entry {path}: {message}")]
    Read { path: String, message: String },
}

/// Errors produced while resolving and rendering book content.
#[derive(Debug, Clone, Error)]
pub enum ContentError {
    /// Request path has no counterpart in the archive (HTTP 404)
    #[error("Not found: {request_path}")]
    NotFound { request_path: String },

    /// Markup could not be parsed, rewritten or serialized (HTTP 500)
    #[error("Unable to render {archive_path}: {message}")]
    Render {
        archive_path: String,
        message: String,
    },

    /// Archive access failed for an entry that is listed (HTTP 500)
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
}

/// Configuration rejected at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required setting is missing or empty
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    /// A setting is present but unusable
    #[error("Invalid configuration for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },

    /// A claim set with no entries
    #[error("A claim set must contain at least one claim")]
    EmptyClaimSet,

    /// A claim pair that is not `name=value`
    #[error("Invalid claim \"{0}\": expected name=value")]
    InvalidClaim(String),

    /// An authorization policy with no claim sets
    #[error("An authorization policy must contain at least one claim set")]
    EmptyPolicy,
}

/// Errors from the identity provider capability.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Provider metadata could not be discovered (fatal at startup)
    #[error("Unable to discover identity provider: {0}")]
    Discovery(String),

    /// Authorization code could not be exchanged for tokens
    #[error("Failed to exchange token: {0}")]
    Exchange(String),

    /// Token failed signature, issuer, audience or expiry checks
    #[error("Unable to verify user: {0}")]
    Verification(String),

    /// The provider did not answer within the configured bound
    #[error("Identity provider did not respond within {seconds}s")]
    Timeout { seconds: u64 },
}
