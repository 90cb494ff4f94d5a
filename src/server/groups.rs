use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{AddMemberRequest, CreateGroupRequest, UpdateGroupRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{parse_global_role, validate_display_name};
use crate::types::{GlobalRole, Group, User};

/// Group owners and site admins manage a group; everyone else just reads.
fn require_group_manager(group: &Group, user: &User) -> Result<(), ApiError> {
    if group.owner_id == user.id || user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only the group owner can do that"))
    }
}

pub async fn create_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGroupRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_display_name(&req.name, "Group")?;

    let global_role = match req.global_role.as_deref() {
        Some(s) => parse_global_role(s)?,
        None => GlobalRole::User,
    };
    if global_role != GlobalRole::User && !auth.user.is_admin() {
        return Err(ApiError::forbidden(
            "Only admins can create privileged groups",
        ));
    }

    let now = Utc::now();
    let group = Group {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        owner_id: auth.user.id.clone(),
        global_role,
        created_at: now,
        updated_at: now,
    };

    match store.create_group(&group) {
        Ok(()) => {}
        Err(crate::error::Error::AlreadyExists) => {
            return Err(ApiError::conflict("A group with that name already exists"));
        }
        Err(e) => return Err(e.into()),
    }
    store
        .add_group_member(&group.id, &auth.user.id)
        .api_err("Failed to add group member")?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(group))))
}

pub async fn list_groups(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let groups = state.store.list_groups().api_err("Failed to list groups")?;
    Ok::<_, ApiError>(Json(ApiResponse::success(groups)))
}

pub async fn get_group(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let group = state
        .store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(group)))
}

pub async fn update_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateGroupRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut group = store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;
    require_group_manager(&group, &auth.user)?;

    if let Some(name) = req.name {
        validate_display_name(&name, "Group")?;
        group.name = name;
    }
    if let Some(owner_id) = req.owner_id {
        store
            .get_user(&owner_id)
            .api_err("Failed to get user")?
            .or_not_found("User not found")?;
        group.owner_id = owner_id;
    }
    if let Some(role) = req.global_role {
        if !auth.user.is_admin() {
            return Err(ApiError::forbidden("Only admins can change group roles"));
        }
        group.global_role = parse_global_role(&role)?;
    }

    match store.update_group(&group) {
        Ok(()) => {}
        Err(crate::error::Error::AlreadyExists) => {
            return Err(ApiError::conflict("A group with that name already exists"));
        }
        Err(e) => return Err(e.into()),
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(group)))
}

pub async fn delete_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let group = store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;
    require_group_manager(&group, &auth.user)?;

    store
        .delete_group(&group.id)
        .api_err("Failed to delete group")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;

    let members = store
        .list_group_members(&id)
        .api_err("Failed to list members")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(members)))
}

pub async fn add_member(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let group = store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;
    require_group_manager(&group, &auth.user)?;

    store
        .get_user(&req.user_id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    store
        .add_group_member(&group.id, &req.user_id)
        .api_err("Failed to add member")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn remove_member(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let group = store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;
    require_group_manager(&group, &auth.user)?;

    let removed = store
        .remove_group_member(&group.id, &user_id)
        .api_err("Failed to remove member")?;
    if !removed {
        return Err(ApiError::not_found("User is not a member of this group"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
