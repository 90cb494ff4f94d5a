use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::{RequireUser, generate_key};
use crate::server::AppState;
use crate::server::dto::{CreateApiKeyRequest, CreateApiKeyResponse};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::ApiKey;

pub async fn create_api_key(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateApiKeyRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Key name cannot be empty"));
    }
    if let Some(days) = req.expires_in_days {
        if days <= 0 {
            return Err(ApiError::bad_request("expires_in_days must be positive"));
        }
    }

    let (raw_key, prefix, key_hash) = generate_key();
    let key = ApiKey {
        id: Uuid::new_v4().to_string(),
        user_id: auth.user.id.clone(),
        name: req.name,
        key_hash,
        prefix,
        scopes: req.scopes,
        created_at: Utc::now(),
        expires_at: req.expires_in_days.map(|d| Utc::now() + Duration::days(d)),
        last_used_at: None,
    };
    store.create_api_key(&key).api_err("Failed to create key")?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CreateApiKeyResponse {
            key: raw_key,
            metadata: key,
        })),
    ))
}

pub async fn list_api_keys(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let keys = state
        .store
        .list_user_api_keys(&auth.user.id)
        .api_err("Failed to list keys")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(keys)))
}

pub async fn get_api_key(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let key = state
        .store
        .get_api_key(&id)
        .api_err("Failed to get key")?
        .filter(|k| k.user_id == auth.user.id)
        .or_not_found("Key not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(key)))
}

pub async fn delete_api_key(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    store
        .get_api_key(&id)
        .api_err("Failed to get key")?
        .filter(|k| k.user_id == auth.user.id)
        .or_not_found("Key not found")?;

    store.delete_api_key(&id).api_err("Failed to delete key")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
