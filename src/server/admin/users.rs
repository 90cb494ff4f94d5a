use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{RequireAdmin, generate_password};
use crate::error::Error;
use crate::server::AppState;
use crate::server::auth::hash_password;
use crate::server::bootstrap::create_personal_space;
use crate::server::dto::{
    CreateUserRequest, CreateUserResponse, PaginationParams, UpdateUserRequest,
};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::server::validation::{
    parse_global_role, validate_email, validate_password, validate_username,
};
use crate::types::{GlobalRole, User};

pub async fn create_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_username(&req.username)?;
    validate_email(&req.email)?;
    let global_role = match req.global_role.as_deref() {
        Some(s) => parse_global_role(s)?,
        None => GlobalRole::User,
    };

    // When no password is supplied we generate one and return it in the
    // response, once.
    let (password, generated) = match req.password {
        Some(password) => {
            validate_password(&password)?;
            (password, false)
        }
        None => (generate_password(), true),
    };

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

    let password_hash = hash_password(&state, password.clone()).await?;
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: req.username,
        email: req.email,
        password_hash,
        global_role,
        active: true,
        preferences: None,
        created_at: now,
        updated_at: now,
    };
    match store.create_user(&user) {
        Ok(()) => {}
        Err(Error::AlreadyExists) => {
            return Err(ApiError::conflict("Username or email already taken"));
        }
        Err(e) => return Err(e.into()),
    }
    create_personal_space(store, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CreateUserResponse {
            user,
            password: generated.then_some(password),
        })),
    ))
}

pub async fn list_users(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let cursor = params.cursor.as_deref().unwrap_or("");

    let users = store
        .list_users(cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list users")?;
    let (users, next_cursor, has_more) =
        paginate(users, DEFAULT_PAGE_SIZE as usize, |u| u.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(users, next_cursor, has_more)))
}

pub async fn get_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let user = store
        .get_user(&id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}

pub async fn update_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut user = store
        .get_user(&id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    if let Some(email) = req.email {
        validate_email(&email)?;
        let taken = store
            .get_user_by_email(&email)
            .api_err("Failed to check email")?
            .is_some_and(|other| other.id != user.id);
        if taken {
            return Err(ApiError::conflict("Email already registered"));
        }
        user.email = email;
    }
    if let Some(ref role) = req.global_role {
        user.global_role = parse_global_role(role)?;
    }
    if let Some(active) = req.active {
        user.active = active;
    }
    if let Some(password) = req.password {
        validate_password(&password)?;
        user.password_hash = hash_password(&state, password).await?;
    }

    store.update_user(&user).api_err("Failed to update user")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}

pub async fn delete_user(
    admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    if id == admin.user.id {
        return Err(ApiError::conflict("You cannot delete your own account"));
    }
    if !store.delete_user(&id).api_err("Failed to delete user")? {
        return Err(ApiError::not_found("User not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
