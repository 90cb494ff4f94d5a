use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{GrantRequest, RevokeParams};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::spaces::fetch_space;
use crate::server::validation::parse_role;
use crate::store::Store;
use crate::types::{Permission, ResourceKind, Role, SpaceType, User};

/// A permission target, resolved to its containing space and creator.
struct ResourceRef {
    kind: ResourceKind,
    id: String,
    space_id: String,
    created_by: Option<String>,
}

fn resolve_resource(
    store: &dyn Store,
    user: &User,
    kind: ResourceKind,
    id: &str,
) -> Result<ResourceRef, ApiError> {
    match kind {
        ResourceKind::Space => {
            let space = fetch_space(store, user, id)?;
            Ok(ResourceRef {
                kind,
                space_id: space.id.clone(),
                created_by: space.owner_id,
                id: space.id,
            })
        }
        ResourceKind::Document => {
            let doc = store
                .get_document(id)
                .api_err("Failed to get document")?
                .or_not_found("Document not found")?;
            Ok(ResourceRef {
                kind,
                id: doc.id,
                space_id: doc.space_id,
                created_by: Some(doc.created_by),
            })
        }
        ResourceKind::Database => {
            let db = store
                .get_database(id)
                .api_err("Failed to get database")?
                .or_not_found("Database not found")?;
            Ok(ResourceRef {
                kind,
                id: db.id,
                space_id: db.space_id,
                created_by: Some(db.created_by),
            })
        }
        ResourceKind::Drawing => {
            let drawing = store
                .get_drawing(id)
                .api_err("Failed to get drawing")?
                .or_not_found("Drawing not found")?;
            Ok(ResourceRef {
                kind,
                id: drawing.id,
                space_id: drawing.space_id,
                created_by: Some(drawing.created_by),
            })
        }
    }
}

fn require_manager(
    store: &dyn Store,
    user: &User,
    resource: &ResourceRef,
) -> Result<(), ApiError> {
    let ok = crate::access::can_manage_permissions(
        store,
        user,
        resource.kind,
        &resource.id,
        &resource.space_id,
    )
    .api_err("Failed to check permissions")?;
    if ok {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "You cannot manage permissions on this resource",
        ))
    }
}

fn subject(req_user: Option<&str>, req_group: Option<&str>) -> Result<(Option<String>, Option<String>), ApiError> {
    match (req_user, req_group) {
        (Some(u), None) => Ok((Some(u.to_string()), None)),
        (None, Some(g)) => Ok((None, Some(g.to_string()))),
        _ => Err(ApiError::bad_request(
            "Provide exactly one of user_id or group_id",
        )),
    }
}

/// The owner of a personal or private space cannot be stripped of the space
/// itself or of content they created there. `new_role` is None on revoke.
fn check_owner_protection(
    store: &dyn Store,
    resource: &ResourceRef,
    target_user: &str,
    new_role: Option<Role>,
) -> Result<(), ApiError> {
    let Some(space) = store
        .get_space(&resource.space_id)
        .api_err("Failed to get space")?
    else {
        return Ok(());
    };
    if !matches!(space.space_type, SpaceType::Personal | SpaceType::Private) {
        return Ok(());
    }
    if space.owner_id.as_deref() != Some(target_user) {
        return Ok(());
    }
    let protected = match resource.kind {
        ResourceKind::Space => true,
        ResourceKind::Document | ResourceKind::Drawing => {
            resource.created_by.as_deref() == space.owner_id.as_deref()
        }
        ResourceKind::Database => false,
    };
    if !protected {
        return Ok(());
    }
    match new_role {
        None => Err(crate::error::Error::OwnerProtected.into()),
        Some(Role::Owner) => Ok(()),
        Some(_) => Err(crate::error::Error::OwnerRoleProtected.into()),
    }
}

async fn list_permissions(
    auth: RequireUser,
    state: Arc<AppState>,
    kind: ResourceKind,
    id: String,
) -> Result<Json<ApiResponse<Vec<Permission>>>, ApiError> {
    let store = state.store.as_ref();

    let resource = resolve_resource(store, &auth.user, kind, &id)?;
    require_manager(store, &auth.user, &resource)?;

    let perms = store
        .list_resource_permissions(kind, &resource.id)
        .api_err("Failed to list permissions")?;

    Ok(Json(ApiResponse::success(perms)))
}

async fn grant_permission(
    auth: RequireUser,
    state: Arc<AppState>,
    kind: ResourceKind,
    id: String,
    req: GrantRequest,
) -> Result<(StatusCode, Json<ApiResponse<Permission>>), ApiError> {
    let store = state.store.as_ref();

    let resource = resolve_resource(store, &auth.user, kind, &id)?;
    require_manager(store, &auth.user, &resource)?;

    let role = parse_role(&req.role)?;
    if kind == ResourceKind::Space && role == Role::Denied {
        return Err(ApiError::bad_request(
            "denied is not a valid space role; revoke the grant instead",
        ));
    }

    let (user_id, group_id) = subject(req.user_id.as_deref(), req.group_id.as_deref())?;
    if let Some(ref uid) = user_id {
        store
            .get_user(uid)
            .api_err("Failed to get user")?
            .or_not_found("User not found")?;
        check_owner_protection(store, &resource, uid, Some(role))?;
    }
    if let Some(ref gid) = group_id {
        store
            .get_group(gid)
            .api_err("Failed to get group")?
            .or_not_found("Group not found")?;
    }

    let now = Utc::now();
    let perm = store.upsert_permission(&Permission {
        id: Uuid::new_v4().to_string(),
        resource_kind: kind,
        resource_id: resource.id.clone(),
        user_id,
        group_id,
        role,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(perm))))
}

async fn revoke_permission(
    auth: RequireUser,
    state: Arc<AppState>,
    kind: ResourceKind,
    id: String,
    params: RevokeParams,
) -> Result<StatusCode, ApiError> {
    let store = state.store.as_ref();

    let resource = resolve_resource(store, &auth.user, kind, &id)?;
    require_manager(store, &auth.user, &resource)?;

    let (user_id, group_id) = subject(params.user_id.as_deref(), params.group_id.as_deref())?;
    if let Some(ref uid) = user_id {
        check_owner_protection(store, &resource, uid, None)?;
    }

    let removed = store
        .delete_permission(kind, &resource.id, user_id.as_deref(), group_id.as_deref())
        .api_err("Failed to revoke permission")?;
    if !removed {
        return Err(ApiError::not_found("Permission not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_space_permissions(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    list_permissions(auth, state, ResourceKind::Space, id).await
}

pub async fn grant_space_permission(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<GrantRequest>,
) -> impl IntoResponse {
    grant_permission(auth, state, ResourceKind::Space, id, req).await
}

pub async fn revoke_space_permission(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<RevokeParams>,
) -> impl IntoResponse {
    revoke_permission(auth, state, ResourceKind::Space, id, params).await
}

pub async fn list_document_permissions(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    list_permissions(auth, state, ResourceKind::Document, id).await
}

pub async fn grant_document_permission(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<GrantRequest>,
) -> impl IntoResponse {
    grant_permission(auth, state, ResourceKind::Document, id, req).await
}

pub async fn revoke_document_permission(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<RevokeParams>,
) -> impl IntoResponse {
    revoke_permission(auth, state, ResourceKind::Document, id, params).await
}

pub async fn list_database_permissions(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    list_permissions(auth, state, ResourceKind::Database, id).await
}

pub async fn grant_database_permission(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<GrantRequest>,
) -> impl IntoResponse {
    grant_permission(auth, state, ResourceKind::Database, id, req).await
}

pub async fn revoke_database_permission(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<RevokeParams>,
) -> impl IntoResponse {
    revoke_permission(auth, state, ResourceKind::Database, id, params).await
}

pub async fn list_drawing_permissions(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    list_permissions(auth, state, ResourceKind::Drawing, id).await
}

pub async fn grant_drawing_permission(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<GrantRequest>,
) -> impl IntoResponse {
    grant_permission(auth, state, ResourceKind::Drawing, id, req).await
}

pub async fn revoke_drawing_permission(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<RevokeParams>,
) -> impl IntoResponse {
    revoke_permission(auth, state, ResourceKind::Drawing, id, params).await
}
