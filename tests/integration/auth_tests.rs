//! Authentication integration tests.
//!
//! Tests verify:
//! - Requests without a session are redirected and never reach content
//! - The callback checks state before contacting the provider
//! - A completed sign-in sets the session cookie and returns to the book
//! - Sessions whose claims miss the policy are refused and cleared
//! - Provider timeouts fail the request instead of hanging

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tower::ServiceExt;

use epub_library::auth::{AUTH_COOKIE, RETURN_URL_COOKIE, STATE_COOKIE};

use super::test_utils::{
    body_bytes, body_json, example_policy, get, get_with_cookies, location, protected_router,
    removes_cookie, set_cookie, set_cookie_value, FakeProvider, AUTHORIZE_URL, CALLBACK_PATH,
};

const TIMEOUT: Duration = Duration::from_secs(2);

fn provider() -> Arc<FakeProvider> {
    Arc::new(
        FakeProvider::new()
            .with_code("good-code", Some("tok-admin"))
            .with_code("no-id-token", None)
            .with_user("tok-admin", &[("role", "admin"), ("sub", "1")])
            .with_user("tok-ops", &[("team", "ops"), ("level", "2")])
            .with_user("tok-ops-junior", &[("team", "ops"), ("level", "1")])
            .with_user("tok-guest", &[("sub", "3")]),
    )
}

fn callback(query: &str, cookies: &str) -> axum::http::Request<axum::body::Body> {
    get_with_cookies(&format!("{}?{}", CALLBACK_PATH, query), cookies)
}

// =============================================================================
// No Session
// =============================================================================

#[tokio::test]
async fn test_no_session_redirects_to_provider() {
    let provider = provider();
    let router = protected_router(provider.clone(), example_policy(), TIMEOUT);

    let response = router.oneshot(get("/ch1.xhtml?page=2")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = location(&response);
    assert!(location.starts_with(AUTHORIZE_URL));

    let state = set_cookie_value(&response, STATE_COOKIE).unwrap();
    assert_eq!(state.len(), 64);
    assert!(location.ends_with(&format!("state={}", state)));

    let return_url = set_cookie_value(&response, RETURN_URL_COOKIE).unwrap();
    assert_eq!(urlencoding::decode(&return_url).unwrap(), "/ch1.xhtml?page=2");

    for name in [STATE_COOKIE, RETURN_URL_COOKIE] {
        let cookie = set_cookie(&response, name).unwrap();
        assert!(cookie.contains("HttpOnly"), "{}", cookie);
        assert!(cookie.contains("Path=/"), "{}", cookie);
        assert!(cookie.contains("Max-Age=3600"), "{}", cookie);
    }

    // Content was never rendered and the provider was never asked
    assert!(body_bytes(response).await.is_empty());
    assert_eq!(provider.verify_calls(), 0);
    assert_eq!(provider.exchange_calls(), 0);
}

#[tokio::test]
async fn test_each_redirect_uses_fresh_state() {
    let router = protected_router(provider(), example_policy(), TIMEOUT);

    let first = router.clone().oneshot(get("/")).await.unwrap();
    let second = router.oneshot(get("/")).await.unwrap();

    assert_ne!(
        set_cookie_value(&first, STATE_COOKIE),
        set_cookie_value(&second, STATE_COOKIE)
    );
}

#[tokio::test]
async fn test_missing_entry_still_requires_sign_in() {
    let router = protected_router(provider(), example_policy(), TIMEOUT);
    let response = router.oneshot(get("/does-not-exist.xhtml")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_healthz_is_public_with_auth() {
    let provider = provider();
    let router = protected_router(provider.clone(), example_policy(), TIMEOUT);

    let response = router.oneshot(get("/healthz")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(set_cookie(&response, STATE_COOKIE).is_none());
    assert_eq!(provider.verify_calls(), 0);
}

// =============================================================================
// Callback
// =============================================================================

#[tokio::test]
async fn test_callback_without_state_cookie_is_rejected() {
    let provider = provider();
    let router = protected_router(provider.clone(), example_policy(), TIMEOUT);

    let response = router
        .oneshot(get(&format!("{}?code=good-code&state=abc", CALLBACK_PATH)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "missing_state");
    assert_eq!(provider.exchange_calls(), 0);
}

#[tokio::test]
async fn test_callback_with_mismatched_state_is_rejected() {
    let provider = provider();
    let router = protected_router(provider.clone(), example_policy(), TIMEOUT);

    let response = router
        .oneshot(callback("code=good-code&state=forged", "auth-state=expected"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "state_mismatch");
    assert_eq!(provider.exchange_calls(), 0);
}

#[tokio::test]
async fn test_callback_without_state_param_is_rejected() {
    let provider = provider();
    let router = protected_router(provider.clone(), example_policy(), TIMEOUT);

    let response = router
        .oneshot(callback("code=good-code", "auth-state=expected"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.exchange_calls(), 0);
}

#[tokio::test]
async fn test_callback_with_provider_error() {
    let provider = provider();
    let router = protected_router(provider.clone(), example_policy(), TIMEOUT);

    let response = router
        .oneshot(callback(
            "error=access_denied&error_description=User%20cancelled&state=s1",
            "auth-state=s1",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "provider_error");
    assert!(json["message"].as_str().unwrap().contains("User cancelled"));
    assert_eq!(provider.exchange_calls(), 0);
}

#[tokio::test]
async fn test_callback_without_code() {
    let router = protected_router(provider(), example_policy(), TIMEOUT);

    let response = router
        .oneshot(callback("state=s1", "auth-state=s1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "missing_code");
}

#[tokio::test]
async fn test_callback_success_sets_session_and_returns() {
    let provider = provider();
    let router = protected_router(provider.clone(), example_policy(), TIMEOUT);

    let cookies = format!(
        "auth-state=s1; return-url={}",
        urlencoding::encode("/ch1.xhtml?page=2")
    );
    let response = router
        .oneshot(callback("code=good-code&state=s1", &cookies))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/ch1.xhtml?page=2");

    let session = set_cookie(&response, AUTH_COOKIE).unwrap();
    assert!(session.starts_with("authentication=tok-admin"));
    assert!(session.contains("HttpOnly"));
    assert!(session.contains("Path=/"));
    assert!(!session.contains("Max-Age"));
    assert!(!session.contains("Expires"));

    assert!(removes_cookie(&response, RETURN_URL_COOKIE));
    assert!(removes_cookie(&response, STATE_COOKIE));
    assert_eq!(provider.exchange_calls(), 1);
}

#[tokio::test]
async fn test_callback_defaults_to_root() {
    let router = protected_router(provider(), example_policy(), TIMEOUT);

    let response = router
        .oneshot(callback("code=good-code&state=s1", "auth-state=s1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_callback_ignores_foreign_return_url() {
    let router = protected_router(provider(), example_policy(), TIMEOUT);

    for target in ["https://evil.example/", "//evil.example/x"] {
        let cookies = format!(
            "auth-state=s1; return-url={}",
            urlencoding::encode(target)
        );
        let response = router
            .clone()
            .oneshot(callback("code=good-code&state=s1", &cookies))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/", "{}", target);
    }
}

#[tokio::test]
async fn test_callback_exchange_failure() {
    let router = protected_router(provider(), example_policy(), TIMEOUT);

    let response = router
        .oneshot(callback("code=expired-code&state=s1", "auth-state=s1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie(&response, AUTH_COOKIE).is_none());

    let json = body_json(response).await;
    assert_eq!(json["error"], "token_exchange_failed");
    assert!(json["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to exchange token"));
}

#[tokio::test]
async fn test_callback_without_id_token() {
    let router = protected_router(provider(), example_policy(), TIMEOUT);

    let response = router
        .oneshot(callback("code=no-id-token&state=s1", "auth-state=s1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie(&response, AUTH_COOKIE).is_none());
    assert_eq!(body_json(response).await["error"], "missing_id_token");
}

#[tokio::test]
async fn test_callback_exchange_timeout() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_code("good-code", Some("tok-admin"))
            .with_delay(Duration::from_secs(5)),
    );
    let router = protected_router(provider, example_policy(), Duration::from_millis(50));

    let response = router
        .oneshot(callback("code=good-code&state=s1", "auth-state=s1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie(&response, AUTH_COOKIE).is_none());
}

// =============================================================================
// Authenticated Requests
// =============================================================================

#[tokio::test]
async fn test_matching_claims_reach_content() {
    let router = protected_router(provider(), example_policy(), TIMEOUT);

    let response = router
        .oneshot(get_with_cookies("/", "authentication=tok-admin"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response, AUTH_COOKIE).is_none());

    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(body.contains("name=\"viewport\""));
}

#[tokio::test]
async fn test_second_claim_set_reaches_content() {
    let router = protected_router(provider(), example_policy(), TIMEOUT);

    let response = router
        .oneshot(get_with_cookies("/css/book.css", "authentication=tok-ops"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_entry_after_sign_in_is_not_found() {
    let router = protected_router(provider(), example_policy(), TIMEOUT);

    let response = router
        .oneshot(get_with_cookies("/ch9.xhtml", "authentication=tok-admin"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_matching_claims_are_unauthorized() {
    let router = protected_router(provider(), example_policy(), TIMEOUT);

    for token in ["tok-ops-junior", "tok-guest"] {
        let response = router
            .clone()
            .oneshot(get_with_cookies("/", &format!("authentication={}", token)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", token);
        assert!(removes_cookie(&response, AUTH_COOKIE));

        let json = body_json(response).await;
        assert_eq!(json["error"], "unauthorized");
        assert!(json["message"]
            .as_str()
            .unwrap()
            .ends_with("Refresh to sign in again."));
    }
}

#[tokio::test]
async fn test_unverifiable_token_is_unauthorized() {
    let router = protected_router(provider(), example_policy(), TIMEOUT);

    let response = router
        .oneshot(get_with_cookies("/", "authentication=forged"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(removes_cookie(&response, AUTH_COOKIE));

    let json = body_json(response).await;
    assert_eq!(json["error"], "unverified");
    assert_eq!(
        json["message"],
        "Unable to verify user: signature mismatch. Refresh to sign in again."
    );
}

#[tokio::test]
async fn test_verification_timeout_is_unauthorized() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_user("tok-admin", &[("role", "admin")])
            .with_delay(Duration::from_secs(5)),
    );
    let router = protected_router(provider, example_policy(), Duration::from_millis(50));

    let response = router
        .oneshot(get_with_cookies("/", "authentication=tok-admin"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(removes_cookie(&response, AUTH_COOKIE));
}

// =============================================================================
// Full Flow
// =============================================================================

#[tokio::test]
async fn test_sign_in_round_trip() {
    let provider = provider();
    let router = protected_router(provider.clone(), example_policy(), TIMEOUT);

    // 1. Anonymous request is sent to the provider
    let response = router.clone().oneshot(get("/ch1.xhtml")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let state = set_cookie_value(&response, STATE_COOKIE).unwrap();
    let return_url = set_cookie_value(&response, RETURN_URL_COOKIE).unwrap();

    // 2. Provider redirects back with the same state
    let cookies = format!("auth-state={}; return-url={}", state, return_url);
    let response = router
        .clone()
        .oneshot(callback(
            &format!("code=good-code&state={}", state),
            &cookies,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/ch1.xhtml");
    let session = set_cookie_value(&response, AUTH_COOKIE).unwrap();

    // 3. The session cookie now opens the book
    let response = router
        .oneshot(get_with_cookies(
            "/ch1.xhtml",
            &format!("authentication={}", session),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(provider.exchange_calls(), 1);
    assert_eq!(provider.verify_calls(), 1);
}
