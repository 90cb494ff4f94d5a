use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{RequireUser, build_session, clear_session_cookie, session_cookie};
use crate::server::AppState;
use crate::server::bootstrap::create_personal_space;
use crate::server::dto::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, UpdatePreferencesRequest,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{validate_email, validate_password, validate_username};
use crate::types::{GlobalRole, User};

/// Argon2 work happens off the async runtime.
pub(super) async fn hash_password(
    state: &Arc<AppState>,
    password: String,
) -> Result<String, ApiError> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || state.passwords.hash(&password))
        .await
        .map_err(|_| ApiError::internal("Failed to hash password"))?
        .api_err("Failed to hash password")
}

async fn verify_password(
    state: &Arc<AppState>,
    password: String,
    hash: String,
) -> Result<bool, ApiError> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || state.passwords.verify(&password, &hash))
        .await
        .map_err(|_| ApiError::internal("Failed to verify password"))?
        .api_err("Failed to verify password")
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_username(&req.username)?;
    validate_email(&req.email)?;
    validate_password(&req.password)?;

    if store
        .get_user_by_username(&req.username)
        .api_err("Failed to check username")?
        .is_some()
    {
        return Err(ApiError::conflict("Username already taken"));
    }
    if store
        .get_user_by_email(&req.email)
        .api_err("Failed to check email")?
        .is_some()
    {
        return Err(ApiError::conflict("Email already registered"));
    }

    let password_hash = hash_password(&state, req.password).await?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: req.username,
        email: req.email,
        password_hash,
        global_role: GlobalRole::User,
        active: true,
        preferences: None,
        created_at: now,
        updated_at: now,
    };

    match state.store.create_user(&user) {
        Ok(()) => {}
        Err(crate::error::Error::AlreadyExists) => {
            return Err(ApiError::conflict("Username or email already taken"));
        }
        Err(e) => return Err(e.into()),
    }

    create_personal_space(state.store.as_ref(), &user)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let Some(user) = store
        .get_user_by_username(&req.username)
        .api_err("Failed to look up user")?
    else {
        tracing::warn!("Login failed for {}: unknown username", req.username);
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    if !user.active {
        return Err(ApiError::forbidden("Account is inactive"));
    }

    let password_ok =
        verify_password(&state, req.password, user.password_hash.clone()).await?;
    if !password_ok {
        tracing::warn!("Login failed for {}: wrong password", req.username);
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let session = build_session(&user.id, state.config.session_ttl());
    state
        .store
        .create_session(&session)
        .api_err("Failed to create session")?;

    let jar = jar.add(session_cookie(&session.id));
    Ok((jar, Json(ApiResponse::success(user))))
}

pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    if let Some(cookie) = jar.get(crate::auth::SESSION_COOKIE) {
        if let Err(e) = state.store.delete_session(cookie.value()) {
            tracing::warn!("Failed to delete session on logout: {e}");
        }
    }
    let jar = jar.remove(clear_session_cookie());
    (jar, StatusCode::NO_CONTENT)
}

pub async fn me(auth: RequireUser) -> impl IntoResponse {
    Json(ApiResponse::success(auth.user))
}

pub async fn update_preferences(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdatePreferencesRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut user = store
        .get_user(&auth.user.id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    // Null clears; anything else is stored opaquely.
    user.preferences = if req.preferences.is_null() {
        None
    } else {
        Some(req.preferences)
    };
    store.update_user(&user).api_err("Failed to update user")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}

pub async fn change_password(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_password(&req.new_password)?;

    let mut user = store
        .get_user(&auth.user.id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    let current_ok = verify_password(
        &state,
        req.current_password,
        user.password_hash.clone(),
    )
    .await?;
    if !current_ok {
        return Err(ApiError::forbidden("Current password is incorrect"));
    }

    user.password_hash = hash_password(&state, req.new_password).await?;
    state
        .store
        .update_user(&user)
        .api_err("Failed to update user")?;

    Ok(StatusCode::NO_CONTENT)
}
