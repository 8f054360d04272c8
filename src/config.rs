//! Configuration management for the book server.
//!
//! Settings come from command-line arguments or `LIBRARY_*` environment
//! variables, with defaults for everything except the OIDC client.
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use epub_library::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//!
//! if let Some(oidc) = config.oidc_settings()? {
//!     println!("Signing in through {}", oidc.issuer);
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `LIBRARY_HOST` - Server bind address (default: 0.0.0.0)
//! - `LIBRARY_PORT` - Server port (default: 8080)
//! - `LIBRARY_BOOK_PATH` - EPUB file to serve (default: /book.epub)
//! - `LIBRARY_CONTENT_PREFIX` - Archive directory holding content (default: EPUB)
//! - `LIBRARY_INDEX_DOCUMENT` - Document served for `/` (default: /nav.xhtml)
//! - `LIBRARY_OIDC_ENABLED` - Require sign-in (default: false)
//! - `LIBRARY_OIDC_ISSUER` - Issuer URL used for discovery
//! - `LIBRARY_OIDC_CLIENT_ID` / `LIBRARY_OIDC_CLIENT_SECRET` - Client credentials
//! - `LIBRARY_OIDC_CALLBACK_URL` - Redirect URL registered with the provider
//! - `LIBRARY_OIDC_CLAIMS` - Claim sets, `;`-separated, e.g. `role=admin;team=ops,level=2`
//! - `LIBRARY_OIDC_TIMEOUT` - Provider call timeout in seconds (default: 10)

use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::auth::{AuthorizationPolicy, ClaimSet};
use crate::content::{DEFAULT_CONTENT_PREFIX, DEFAULT_INDEX_DOCUMENT};
use crate::error::ConfigError;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default location of the book.
pub const DEFAULT_BOOK_PATH: &str = "/book.epub";

/// Default bound on identity provider calls, in seconds.
pub const DEFAULT_OIDC_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// CLI Arguments
// =============================================================================

/// EPUB Library - serve a single book over HTTP.
///
/// Book documents are rewritten for mobile reading. Access can be limited to
/// users whose OpenID Connect claims match a configured policy.
#[derive(Parser, Debug, Clone)]
#[command(name = "epub-library")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "LIBRARY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "LIBRARY_PORT")]
    pub port: u16,

    // =========================================================================
    // Book Configuration
    // =========================================================================
    /// Path of the EPUB file to serve.
    #[arg(long, default_value = DEFAULT_BOOK_PATH, env = "LIBRARY_BOOK_PATH")]
    pub book_path: String,

    /// Directory inside the archive that request paths are resolved against.
    ///
    /// Pass an empty value to resolve against the archive root.
    #[arg(long, default_value = DEFAULT_CONTENT_PREFIX, env = "LIBRARY_CONTENT_PREFIX")]
    pub content_prefix: String,

    /// Document served for `/`.
    #[arg(long, default_value = DEFAULT_INDEX_DOCUMENT, env = "LIBRARY_INDEX_DOCUMENT")]
    pub index_document: String,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Require OpenID Connect sign-in for book content.
    #[arg(long, default_value_t = false, env = "LIBRARY_OIDC_ENABLED")]
    pub oidc_enabled: bool,

    /// Issuer URL of the identity provider.
    #[arg(long, env = "LIBRARY_OIDC_ISSUER")]
    pub oidc_issuer: Option<String>,

    /// Client identifier registered with the provider.
    #[arg(long, env = "LIBRARY_OIDC_CLIENT_ID")]
    pub oidc_client_id: Option<String>,

    /// Client secret registered with the provider.
    #[arg(long, env = "LIBRARY_OIDC_CLIENT_SECRET", hide_env_values = true)]
    pub oidc_client_secret: Option<String>,

    /// Absolute redirect URL registered with the provider.
    ///
    /// Its path is intercepted as the sign-in callback.
    #[arg(long, env = "LIBRARY_OIDC_CALLBACK_URL")]
    pub oidc_callback_url: Option<String>,

    /// A claim set users may match, as `name=value[,name=value...]`.
    ///
    /// Repeat the flag for alternative sets. A user is authorized when any
    /// one set matches in full.
    #[arg(long, env = "LIBRARY_OIDC_CLAIMS", value_delimiter = ';')]
    pub oidc_claims: Vec<String>,

    /// Timeout in seconds for each identity provider call.
    #[arg(long, default_value_t = DEFAULT_OIDC_TIMEOUT_SECS, env = "LIBRARY_OIDC_TIMEOUT")]
    pub oidc_timeout: u64,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

/// Validated OpenID Connect settings.
#[derive(Debug, Clone)]
pub struct OidcSettings {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: Url,
    pub policy: AuthorizationPolicy,
    pub timeout: Duration,
}

impl OidcSettings {
    /// Path the middleware treats as the sign-in callback.
    pub fn callback_path(&self) -> &str {
        self.callback_url.path()
    }
}

impl Config {
    /// Check every setting, failing on the first unusable one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.book_path.trim().is_empty() {
            return Err(ConfigError::Missing("book_path"));
        }

        if self.content_prefix.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "content_prefix",
                message: "archive entry names never start with '/'".to_string(),
            });
        }

        if !self.index_document.starts_with('/') || self.index_document == "/" {
            return Err(ConfigError::Invalid {
                field: "index_document",
                message: format!(
                    "expected a document path such as {}, got {:?}",
                    DEFAULT_INDEX_DOCUMENT, self.index_document
                ),
            });
        }

        self.oidc_settings().map(|_| ())
    }

    /// The OIDC settings, or `None` when sign-in is disabled.
    pub fn oidc_settings(&self) -> Result<Option<OidcSettings>, ConfigError> {
        if !self.oidc_enabled {
            return Ok(None);
        }

        let issuer = required(&self.oidc_issuer, "oidc_issuer")?;
        Url::parse(&issuer).map_err(|e| ConfigError::Invalid {
            field: "oidc_issuer",
            message: e.to_string(),
        })?;

        let client_id = required(&self.oidc_client_id, "oidc_client_id")?;
        let client_secret = required(&self.oidc_client_secret, "oidc_client_secret")?;

        let callback_url = required(&self.oidc_callback_url, "oidc_callback_url")?;
        let callback_url = Url::parse(&callback_url).map_err(|e| ConfigError::Invalid {
            field: "oidc_callback_url",
            message: e.to_string(),
        })?;

        let claim_sets = self
            .oidc_claims
            .iter()
            .map(|set| ClaimSet::parse(set))
            .collect::<Result<Vec<_>, _>>()?;
        let policy = AuthorizationPolicy::new(claim_sets)?;

        if self.oidc_timeout == 0 {
            return Err(ConfigError::Invalid {
                field: "oidc_timeout",
                message: "must be at least 1 second".to_string(),
            });
        }

        Ok(Some(OidcSettings {
            issuer,
            client_id,
            client_secret,
            callback_url,
            policy,
            timeout: Duration::from_secs(self.oidc_timeout),
        }))
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::Missing(field)),
    }
}

// =============================================================================
// Tests
// =============================================================================
