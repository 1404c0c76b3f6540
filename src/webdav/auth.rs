//! Front-side Basic-Auth (spec §6) and the non-root mount redirect.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::webdav::server::AppState;
use std::sync::Arc;

pub async fn basic_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(header_value) = request.headers().get(header::AUTHORIZATION) else {
        return unauthorized();
    };
    if !credentials_match(header_value, &state.config.auth_username, &state.config.auth_password) {
        return unauthorized();
    }
    next.run(request).await
}

fn credentials_match(header_value: &axum::http::HeaderValue, user: &str, pass: &str) -> bool {
    use base64::Engine;

    let Ok(value) = header_value.to_str() else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded_bytes) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded_bytes) else {
        return false;
    };
    let Some((given_user, given_pass)) = decoded.split_once(':') else {
        return false;
    };
    given_user == user && given_pass == pass
}

fn unauthorized() -> Response {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(header::WWW_AUTHENTICATE, "Basic realm=\"webdav-proxy\"")
        .body(Body::empty())
        .unwrap()
}

/// `GET /` and `GET ""` redirect to the configured mount path when it is
/// non-root (spec §6).
pub async fn redirect_to_mount(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Redirect::found(&state.config.mount_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn accepts_matching_basic_auth() {
        // "user:password" base64-encoded.
        let header = HeaderValue::from_static("Basic dXNlcjpwYXNzd29yZA==");
        assert!(credentials_match(&header, "user", "password"));
    }

    #[test]
    fn rejects_wrong_password() {
        let header = HeaderValue::from_static("Basic dXNlcjp3cm9uZw==");
        assert!(!credentials_match(&header, "user", "password"));
    }

    #[test]
    fn rejects_non_basic_scheme() {
        let header = HeaderValue::from_static("Bearer sometoken");
        assert!(!credentials_match(&header, "user", "password"));
    }
}
