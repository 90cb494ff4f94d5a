use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde_json::json;

use super::apikey::{hash_key, is_api_key, validate_key_format};
use super::session::SESSION_COOKIE;
use crate::server::AppState;
use crate::types::User;

/// Extractor that requires an authenticated, active user
pub struct RequireUser {
    pub user: User,
}

/// Extractor that requires a global admin
pub struct RequireAdmin {
    pub user: User,
}

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidKey,
    KeyExpired,
    InvalidSession,
    SessionExpired,
    AccountDisabled,
    NotAdmin,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidKey => (StatusCode::UNAUTHORIZED, "Invalid API key"),
            AuthError::KeyExpired => (StatusCode::UNAUTHORIZED, "API key expired"),
            AuthError::InvalidSession => (StatusCode::UNAUTHORIZED, "Invalid session"),
            AuthError::SessionExpired => (StatusCode::UNAUTHORIZED, "Session expired"),
            AuthError::AccountDisabled => (StatusCode::FORBIDDEN, "Account is disabled"),
            AuthError::NotAdmin => (StatusCode::FORBIDDEN, "Admin access required"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                "WWW-Authenticate",
                "Bearer realm=\"zettelkit\"".parse().unwrap(),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state)?;
        Ok(RequireUser { user })
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state)?;

        if !user.is_admin() {
            return Err(AuthError::NotAdmin);
        }

        Ok(RequireAdmin { user })
    }
}

/// Resolves the caller from an Authorization bearer API key or, failing
/// that, the session cookie.
fn authenticate(parts: &Parts, state: &Arc<AppState>) -> Result<User, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    if let Some(header) = auth_header {
        let Some(credential) = header.strip_prefix("Bearer ") else {
            return Err(AuthError::InvalidScheme);
        };
        if !is_api_key(credential) {
            return Err(AuthError::InvalidKey);
        }
        return authenticate_api_key(state, credential);
    }

    let jar = CookieJar::from_headers(&parts.headers);
    match jar.get(SESSION_COOKIE) {
        Some(cookie) => authenticate_session(state, cookie.value()),
        None => Err(AuthError::MissingAuth),
    }
}

fn authenticate_api_key(state: &Arc<AppState>, raw_key: &str) -> Result<User, AuthError> {
    validate_key_format(raw_key).map_err(|_| AuthError::InvalidKey)?;

    let key = state
        .store
        .get_api_key_by_hash(&hash_key(raw_key))
        .map_err(|_| AuthError::InternalError)?
        .ok_or(AuthError::InvalidKey)?;

    if let Some(expires_at) = &key.expires_at {
        if expires_at < &Utc::now() {
            return Err(AuthError::KeyExpired);
        }
    }

    let user = load_active_user(state, &key.user_id, AuthError::InvalidKey)?;

    // Touch last_used_at off the request path
    let store = state.store.clone();
    let key_id = key.id.clone();
    tokio::spawn(async move {
        if let Err(e) = store.update_api_key_last_used(&key_id) {
            tracing::warn!("Failed to update API key last_used_at: {e}");
        }
    });

    Ok(user)
}

fn authenticate_session(state: &Arc<AppState>, session_id: &str) -> Result<User, AuthError> {
    let session = state
        .store
        .get_session(session_id)
        .map_err(|_| AuthError::InternalError)?
        .ok_or(AuthError::InvalidSession)?;

    if session.expires_at < Utc::now() {
        // The sweeper would get to it eventually; drop it now so the cookie
        // stops working immediately
        if let Err(e) = state.store.delete_session(&session.id) {
            tracing::warn!("Failed to delete expired session: {e}");
        }
        return Err(AuthError::SessionExpired);
    }

    load_active_user(state, &session.user_id, AuthError::InvalidSession)
}

fn load_active_user(
    state: &Arc<AppState>,
    user_id: &str,
    missing: AuthError,
) -> Result<User, AuthError> {
    let user = state
        .store
        .get_user(user_id)
        .map_err(|_| AuthError::InternalError)?
        .ok_or(missing)?;

    if !user.active {
        return Err(AuthError::AccountDisabled);
    }

    Ok(user)
}
