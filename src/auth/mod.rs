//! Admin authentication.
//!
//! Identity providers issue sessions, the guard turns a session into an admin
//! view, and `require_admin` protects the admin API.

mod guard;
mod provider;
mod sessions;

pub use guard::{AdminPage, AdminView, SessionGuard};
pub use provider::{AccountProvider, IdentityProvider, OpenProvider, SignInError, StaticProvider};
pub use sessions::SessionRegistry;

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{codes, ErrorResponse};

/// Alternative header carrying the session token.
pub const SESSION_HEADER: &str = "x-session-token";

/// Session token from `x-session-token` or `Authorization: Bearer`.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let direct = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(token) = direct {
        return Some(token.to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Reject admin requests that carry no live session.
pub async fn require_admin(guard: SessionGuard, request: Request, next: Next) -> Response {
    let token = session_token(request.headers()).unwrap_or_default();
    match guard.current(&token) {
        Some(session) => {
            tracing::debug!("Admin request by {}", session.identity);
            next.run(request).await
        }
        None => login_required_response(),
    }
}

/// Perform constant-time string comparison.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    a_bytes.ct_eq(b_bytes).into()
}

fn login_required_response() -> Response {
    let body = ErrorResponse::with_details(
        codes::LOGIN_REQUIRED,
        "অ্যাডমিন প্যানেলে প্রবেশ করতে লগইন করুন।".to_string(),
        None,
        0,
    );

    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare("short", "much-longer-key"));
    }

    #[test]
    fn test_constant_time_compare_empty() {
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("", "not-empty"));
    }

    #[test]
    fn test_session_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc"));

        headers.insert(SESSION_HEADER, HeaderValue::from_static("xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(session_token(&basic), None);
    }
}
