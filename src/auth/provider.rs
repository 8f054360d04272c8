//! Identity provider capability.
//!
//! The middleware only needs three things from a provider: where to send the
//! browser, how to trade an authorization code for tokens, and how to check a
//! token it issued. [`OidcProvider`](super::OidcProvider) implements this
//! against a real OpenID Connect issuer; tests substitute a scripted fake.

use async_trait::async_trait;
use url::Url;

use crate::error::ProviderError;

use super::claims::VerifiedClaims;

/// Tokens returned by a successful code exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    /// Raw (compact JWS) ID token. A compliant provider always sends one.
    pub id_token: Option<String>,
}

impl TokenSet {
    pub fn with_id_token(id_token: impl Into<String>) -> Self {
        Self {
            id_token: Some(id_token.into()),
        }
    }
}

/// An OpenID Connect style identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL that starts an authorization-code flow carrying `state`.
    fn authorization_url(&self, state: &str) -> Url;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, ProviderError>;

    /// Verify a raw ID token and return its claims.
    ///
    /// Fails with [`ProviderError::Verification`] on a bad signature, wrong
    /// issuer or audience, or an expired token.
    async fn verify(&self, token: &str) -> Result<VerifiedClaims, ProviderError>;
}
