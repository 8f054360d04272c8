//! OpenID Connect sign-in and claim-based authorization.
//!
//! ```text
//! ┌──────────────────┐    ┌──────────────────┐    ┌──────────────────┐
//! │  auth_middleware │───►│ IdentityProvider │    │AuthorizationPolicy│
//! │  (cookies, flow) │    │ (OidcProvider)   │    │  (claim sets)    │
//! └────────┬─────────┘    └──────────────────┘    └────────▲─────────┘
//!          │               verified claims                  │
//!          └────────────────────────────────────────────────┘
//! ```
//!
//! The provider is a trait so the middleware can be exercised without a
//! real issuer.

mod claims;
mod middleware;
mod oidc;
mod provider;

pub use claims::{satisfies, AuthorizationPolicy, ClaimSet, VerifiedClaims};
pub use middleware::{
    auth_middleware, generate_state, is_local_path, AuthError, AuthState, AUTH_COOKIE,
    RETURN_URL_COOKIE, SIGN_IN_COOKIE_TTL, STATE_COOKIE,
};
pub use oidc::{request_scopes, OidcProvider, BASE_SCOPES};
pub use provider::{IdentityProvider, TokenSet};
