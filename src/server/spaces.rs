use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::access::{grant_role, require_role};
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{CreateSpaceRequest, UpdateSpaceRequest};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::{parse_space_type, unique_space_slug, validate_display_name};
use crate::store::Store;
use crate::types::{ResourceKind, Role, Space, SpaceType, User};

/// Looks up a space by id or slug. Soft-deleted spaces are visible only to
/// global admins; everyone else sees a 404.
pub fn fetch_space(store: &dyn Store, user: &User, id_or_slug: &str) -> Result<Space, ApiError> {
    let space = if Uuid::parse_str(id_or_slug).is_ok() {
        store
            .get_space_any(id_or_slug)
            .api_err("Failed to get space")?
    } else {
        store
            .get_space_by_slug(id_or_slug)
            .api_err("Failed to get space")?
    };
    match space {
        Some(space) if space.deleted_at.is_none() || user.is_admin() => Ok(space),
        _ => Err(ApiError::not_found("Space not found")),
    }
}

pub async fn create_space(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSpaceRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_display_name(&req.name, "Space")?;
    let space_type = match req.space_type.as_deref() {
        Some(s) => parse_space_type(s)?,
        None => SpaceType::Private,
    };

    let slug = unique_space_slug(store, &req.name)?;
    let now = Utc::now();
    let space = Space {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        slug,
        icon: req.icon,
        owner_id: Some(auth.user.id.clone()),
        space_type,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    store.create_space(&space).api_err("Failed to create space")?;
    grant_role(
        store,
        ResourceKind::Space,
        &space.id,
        &auth.user.id,
        Role::Owner,
    )?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(space))))
}

pub async fn list_spaces(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let spaces = state
        .store
        .list_spaces_for_user(&auth.user.id)
        .api_err("Failed to list spaces")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(spaces)))
}

pub async fn get_space(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let space = fetch_space(store, &auth.user, &id)?;
    require_role(
        store,
        &auth.user,
        ResourceKind::Space,
        &space.id,
        &space.id,
        Role::Viewer,
    )?;

    Ok::<_, ApiError>(Json(ApiResponse::success(space)))
}

pub async fn update_space(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSpaceRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut space = fetch_space(store, &auth.user, &id)?;
    if space.deleted_at.is_some() {
        return Err(ApiError::conflict("Space is deleted"));
    }
    require_role(
        store,
        &auth.user,
        ResourceKind::Space,
        &space.id,
        &space.id,
        Role::Admin,
    )?;

    if let Some(name) = req.name {
        validate_display_name(&name, "Space")?;
        // The slug is a stable identifier; renames do not touch it.
        space.name = name;
    }
    if let Some(icon) = req.icon {
        space.icon = if icon.is_empty() { None } else { Some(icon) };
    }
    if let Some(ref s) = req.space_type {
        space.space_type = parse_space_type(s)?;
    }

    store.update_space(&space).api_err("Failed to update space")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(space)))
}

pub async fn delete_space(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let space = fetch_space(store, &auth.user, &id)?;
    if space.deleted_at.is_some() {
        return Err(ApiError::conflict("Space is already deleted"));
    }
    require_role(
        store,
        &auth.user,
        ResourceKind::Space,
        &space.id,
        &space.id,
        Role::Owner,
    )?;

    store.delete_space(&space.id).api_err("Failed to delete space")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
