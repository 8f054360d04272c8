//! Authentication middleware.
//!
//! Every request under the protected routes passes through
//! [`auth_middleware`], which decides between three cases:
//!
//! ```text
//!                      ┌──────────────────────┐
//!   path == callback ─►│ check state, exchange│─► set `authentication`, 302 return-url
//!                      └──────────────────────┘
//!                      ┌──────────────────────┐
//!   no session ───────►│ store return-url and │─► 302 provider authorization URL
//!                      │ state                │
//!                      └──────────────────────┘
//!                      ┌──────────────────────┐
//!   session cookie ───►│ verify, match policy │─► next handler, or 401 + clear cookie
//!                      └──────────────────────┘
//! ```
//!
//! All session state lives in cookies; the server keeps none. Cookie values
//! are percent-encoded by the jar, so any path and query can be stored.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use rand::RngCore;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};
use url::form_urlencoded;

use crate::error::ProviderError;
use crate::server::ErrorResponse;

use super::claims::AuthorizationPolicy;
use super::provider::IdentityProvider;

/// Cookie holding the raw ID token.
pub const AUTH_COOKIE: &str = "authentication";

/// Cookie holding the path to return to after sign-in.
pub const RETURN_URL_COOKIE: &str = "return-url";

/// Cookie holding the state value sent to the provider.
pub const STATE_COOKIE: &str = "auth-state";

/// Lifetime of the sign-in cookies.
pub const SIGN_IN_COOKIE_TTL: time::Duration = time::Duration::minutes(60);

const REFRESH_HINT: &str = "Refresh to sign in again.";

// =============================================================================
// Errors
// =============================================================================

/// Reasons a request is refused by the middleware.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// Callback without a state cookie (expired or never started)
    MissingState,

    /// Callback state does not match the state cookie
    StateMismatch,

    /// Provider redirected back with an error instead of a code
    ProviderDenied {
        error: String,
        description: Option<String>,
    },

    /// Callback carries neither a code nor an error
    MissingCode,

    /// Code exchange failed or timed out
    Exchange(ProviderError),

    /// Token response had no ID token
    MissingIdToken,

    /// Session token failed verification
    Unverified(ProviderError),

    /// Session token is valid but its claims match no claim set
    Unauthorized,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingState => {
                write!(f, "Sign-in state is missing or has expired")
            }
            AuthError::StateMismatch => {
                write!(f, "Sign-in state does not match this browser")
            }
            AuthError::ProviderDenied { error, description } => match description {
                Some(description) => {
                    write!(f, "Identity provider refused sign-in: {}", description)
                }
                None => write!(f, "Identity provider refused sign-in: {}", error),
            },
            AuthError::MissingCode => {
                write!(f, "Authorization code missing from callback")
            }
            AuthError::Exchange(e) => write!(f, "{}", e),
            AuthError::MissingIdToken => {
                write!(f, "Identity provider returned no ID token")
            }
            AuthError::Unverified(e) => write!(f, "{}. {}", e, REFRESH_HINT),
            AuthError::Unauthorized => write!(
                f,
                "User does not have the claims required to read this book. {}",
                REFRESH_HINT
            ),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AuthError::MissingState => (StatusCode::BAD_REQUEST, "missing_state"),
            AuthError::StateMismatch => (StatusCode::BAD_REQUEST, "state_mismatch"),
            AuthError::ProviderDenied { .. } => (StatusCode::BAD_REQUEST, "provider_error"),
            AuthError::MissingCode => (StatusCode::BAD_REQUEST, "missing_code"),
            AuthError::Exchange(_) => (StatusCode::INTERNAL_SERVER_ERROR, "token_exchange_failed"),
            AuthError::MissingIdToken => (StatusCode::INTERNAL_SERVER_ERROR, "missing_id_token"),
            AuthError::Unverified(_) => (StatusCode::UNAUTHORIZED, "unverified"),
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Authentication failed: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Authentication failed: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// State
// =============================================================================

/// Everything the middleware needs, shared across requests.
#[derive(Clone)]
pub struct AuthState {
    provider: Arc<dyn IdentityProvider>,
    policy: Arc<AuthorizationPolicy>,
    callback_path: String,
    timeout: Duration,
}

impl AuthState {
    /// Create middleware state.
    ///
    /// `callback_path` is the path component of the redirect URL registered
    /// with the provider. Every provider call is bounded by `timeout`.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        policy: AuthorizationPolicy,
        callback_path: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            policy: Arc::new(policy),
            callback_path: callback_path.into(),
            timeout,
        }
    }

    pub fn callback_path(&self) -> &str {
        &self.callback_path
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

// =============================================================================
// Middleware
// =============================================================================

/// Axum middleware enforcing sign-in and the authorization policy.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, middleware, routing::get};
/// use epub_library::auth::{auth_middleware, AuthState};
///
/// let app = Router::new()
///     .route("/{*path}", get(content_handler))
///     .layer(middleware::from_fn_with_state(auth_state, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let uri = request.uri().clone();

    if uri.path() == auth.callback_path {
        return match complete_sign_in(&auth, jar, uri.query().unwrap_or("")).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        };
    }

    let Some(token) = jar.get(AUTH_COOKIE).map(|c| c.value().to_string()) else {
        return start_sign_in(&auth, jar, &uri);
    };

    match authorize(&auth, &token).await {
        Ok(()) => next.run(request).await,
        Err(e) => (jar.remove(removal(AUTH_COOKIE)), e).into_response(),
    }
}

/// Redirect to the provider, remembering where the user was going.
fn start_sign_in(auth: &AuthState, jar: CookieJar, uri: &Uri) -> Response {
    let state = generate_state();
    let return_url = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    debug!(return_url = return_url, "No session, redirecting to identity provider");

    let jar = jar
        .add(sign_in_cookie(RETURN_URL_COOKIE, return_url.to_string()))
        .add(sign_in_cookie(STATE_COOKIE, state.clone()));

    found(jar, auth.provider.authorization_url(&state).as_str())
}

/// Handle the provider's redirect back to the callback path.
async fn complete_sign_in(
    auth: &AuthState,
    jar: CookieJar,
    query: &str,
) -> Result<Response, AuthError> {
    let params = CallbackParams::parse(query);

    let expected = jar
        .get(STATE_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AuthError::MissingState)?;
    let provided = params.state.as_deref().unwrap_or("");
    if !bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        return Err(AuthError::StateMismatch);
    }

    if let Some(error) = params.error {
        return Err(AuthError::ProviderDenied {
            error,
            description: params.error_description,
        });
    }

    let code = params.code.ok_or(AuthError::MissingCode)?;

    let tokens = bounded(auth.timeout, auth.provider.exchange_code(&code))
        .await
        .map_err(AuthError::Exchange)?;
    let id_token = tokens.id_token.ok_or(AuthError::MissingIdToken)?;

    let return_url = jar
        .get(RETURN_URL_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|url| is_local_path(url))
        .unwrap_or_else(|| "/".to_string());

    info!(return_url = %return_url, "Sign-in completed");

    let jar = jar
        .add(
            Cookie::build((AUTH_COOKIE, id_token))
                .path("/")
                .http_only(true),
        )
        .remove(removal(RETURN_URL_COOKIE))
        .remove(removal(STATE_COOKIE));

    Ok(found(jar, &return_url))
}

/// Verify the session token and evaluate the policy.
async fn authorize(auth: &AuthState, token: &str) -> Result<(), AuthError> {
    let claims = bounded(auth.timeout, auth.provider.verify(token))
        .await
        .map_err(AuthError::Unverified)?;

    if !auth.policy.satisfies(&claims) {
        return Err(AuthError::Unauthorized);
    }

    debug!(claims = claims.len(), "Request authorized");
    Ok(())
}

/// Run a provider call, failing with [`ProviderError::Timeout`] after `limit`.
async fn bounded<T>(
    limit: Duration,
    call: impl std::future::Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| ProviderError::Timeout {
            seconds: limit.as_secs(),
        })?
}

// =============================================================================
// Helpers
// =============================================================================

/// Query parameters the provider may send to the callback.
#[derive(Debug, Default)]
struct CallbackParams {
    state: Option<String>,
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackParams {
    fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "state" => &mut params.state,
                "code" => &mut params.code,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }
        params
    }
}

/// 256 random bits, hex-encoded.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Whether `url` is a path on this server.
///
/// Protocol-relative (`//host`) and backslash forms are refused since
/// browsers resolve them to other origins.
pub fn is_local_path(url: &str) -> bool {
    url.starts_with('/')
        && !url.starts_with("//")
        && !url.starts_with("/\\")
        && url.chars().all(|c| c.is_ascii() && !c.is_ascii_control())
}

fn sign_in_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .max_age(SIGN_IN_COOKIE_TTL)
        .build()
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

fn found(jar: CookieJar, location: &str) -> Response {
    (
        StatusCode::FOUND,
        jar,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}
