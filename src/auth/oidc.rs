//! OpenID Connect provider backed by the `openidconnect` crate.
//!
//! Provider metadata and signing keys are discovered once at startup. ID
//! tokens are verified locally against those keys; no request reaches the
//! issuer except the code exchange.

use std::collections::HashMap;

use async_trait::async_trait;
use openidconnect::core::{
    CoreAuthenticationFlow, CoreClient, CoreGenderClaim, CoreJsonWebKeyType,
    CoreJweContentEncryptionAlgorithm, CoreJwsSigningAlgorithm, CoreProviderMetadata,
};
use openidconnect::reqwest::async_http_client;
use openidconnect::{
    AdditionalClaims, AuthorizationCode, ClientId, ClientSecret, CsrfToken, IdToken, IssuerUrl,
    Nonce, RedirectUrl, Scope, TokenResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::config::OidcSettings;
use crate::error::ProviderError;

use super::claims::VerifiedClaims;
use super::provider::{IdentityProvider, TokenSet};

/// Scopes requested on every authorization.
pub const BASE_SCOPES: &[&str] = &["openid", "profile", "email"];

/// Claims outside the standard set, kept so policies can match on them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ExtraClaims {
    #[serde(flatten)]
    values: HashMap<String, Value>,
}

impl AdditionalClaims for ExtraClaims {}

type ExtraIdToken = IdToken<
    ExtraClaims,
    CoreGenderClaim,
    CoreJweContentEncryptionAlgorithm,
    CoreJwsSigningAlgorithm,
    CoreJsonWebKeyType,
>;

/// Identity provider speaking OpenID Connect.
pub struct OidcProvider {
    client: CoreClient,
    scopes: Vec<String>,
}

impl OidcProvider {
    /// Discover the issuer and build a client for `settings`.
    ///
    /// Any failure here is fatal: the server must not start with a
    /// half-configured provider.
    pub async fn discover(settings: &OidcSettings) -> Result<Self, ProviderError> {
        let issuer = IssuerUrl::new(settings.issuer.clone())
            .map_err(|e| ProviderError::Discovery(e.to_string()))?;

        let metadata = tokio::time::timeout(
            settings.timeout,
            CoreProviderMetadata::discover_async(issuer, async_http_client),
        )
        .await
        .map_err(|_| ProviderError::Timeout {
            seconds: settings.timeout.as_secs(),
        })?
        .map_err(|e| ProviderError::Discovery(e.to_string()))?;

        let client = CoreClient::from_provider_metadata(
            metadata,
            ClientId::new(settings.client_id.clone()),
            Some(ClientSecret::new(settings.client_secret.clone())),
        )
        .set_redirect_uri(RedirectUrl::from_url(settings.callback_url.clone()));

        let scopes = request_scopes(&settings.policy.scopes());

        info!(
            issuer = %settings.issuer,
            scopes = ?scopes,
            "Discovered identity provider"
        );

        Ok(Self { client, scopes })
    }

    /// Scopes sent with each authorization request.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// The base scopes followed by any policy claim names not already present.
pub fn request_scopes(policy_scopes: &[String]) -> Vec<String> {
    let mut scopes: Vec<String> = BASE_SCOPES.iter().map(|s| s.to_string()).collect();
    for scope in policy_scopes {
        if !scopes.contains(scope) {
            scopes.push(scope.clone());
        }
    }
    scopes
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn authorization_url(&self, state: &str) -> Url {
        let state = state.to_string();
        let mut request = self.client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            move || CsrfToken::new(state),
            Nonce::new_random,
        );

        // `openid` is always added by the client itself.
        for scope in self.scopes.iter().filter(|s| s.as_str() != "openid") {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let (url, _state, _nonce) = request.url();
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, ProviderError> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| ProviderError::Exchange(e.to_string()))?;

        Ok(TokenSet {
            id_token: response.id_token().map(|token| token.to_string()),
        })
    }

    async fn verify(&self, token: &str) -> Result<VerifiedClaims, ProviderError> {
        let id_token: ExtraIdToken = token
            .parse()
            .map_err(|e| ProviderError::Verification(format!("malformed token: {}", e)))?;

        // The nonce is not tracked across the redirect; `state` binds the flow.
        let claims = id_token
            .claims(
                &self.client.id_token_verifier(),
                |_: Option<&Nonce>| -> Result<(), String> { Ok(()) },
            )
            .map_err(|e| ProviderError::Verification(e.to_string()))?;

        let value =
            serde_json::to_value(claims).map_err(|e| ProviderError::Verification(e.to_string()))?;

        let claims = match value {
            Value::Object(map) => VerifiedClaims::from_json(&map),
            _ => VerifiedClaims::new(),
        };

        debug!(claims = claims.len(), "Verified identity token");
        Ok(claims)
    }
}
