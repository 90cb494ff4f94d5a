use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::access::{can_manage_permissions, grant_role, require_role};
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{CreateDrawingRequest, ListDrawingsParams, UpdateDrawingRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::spaces::fetch_space;
use crate::server::validation::validate_display_name;
use crate::store::Store;
use crate::types::{Drawing, ResourceKind, Role};

fn fetch_drawing(
    store: &dyn Store,
    auth: &RequireUser,
    id: &str,
    required: Role,
) -> Result<Drawing, ApiError> {
    let drawing = store
        .get_drawing(id)
        .api_err("Failed to get drawing")?
        .or_not_found("Drawing not found")?;
    require_role(
        store,
        &auth.user,
        ResourceKind::Drawing,
        &drawing.id,
        &drawing.space_id,
        required,
    )?;
    Ok(drawing)
}

pub async fn create_drawing(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDrawingRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_display_name(&req.name, "Drawing")?;

    let space = fetch_space(store, &auth.user, &req.space_id)?;
    if space.deleted_at.is_some() {
        return Err(ApiError::conflict("Space is deleted"));
    }
    require_role(
        store,
        &auth.user,
        ResourceKind::Space,
        &space.id,
        &space.id,
        Role::Editor,
    )?;

    if let Some(ref document_id) = req.document_id {
        let doc = store
            .get_document(document_id)
            .api_err("Failed to get document")?
            .or_not_found("Document not found")?;
        if doc.space_id != space.id {
            return Err(ApiError::bad_request("Document is in a different space"));
        }
    }

    let now = Utc::now();
    let drawing = Drawing {
        id: Uuid::new_v4().to_string(),
        space_id: space.id,
        document_id: req.document_id,
        name: req.name,
        elements: req.elements.unwrap_or_else(|| json!([])),
        app_state: req.app_state.unwrap_or_else(|| json!({})),
        files: req.files.unwrap_or_else(|| json!({})),
        thumbnail: None,
        created_by: auth.user.id.clone(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    store
        .create_drawing(&drawing)
        .api_err("Failed to create drawing")?;
    grant_role(
        store,
        ResourceKind::Drawing,
        &drawing.id,
        &auth.user.id,
        Role::Owner,
    )?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(drawing))))
}

pub async fn list_drawings(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListDrawingsParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let space = fetch_space(store, &auth.user, &params.space_id)?;
    require_role(
        store,
        &auth.user,
        ResourceKind::Space,
        &space.id,
        &space.id,
        Role::Viewer,
    )?;

    let drawings = store
        .list_space_drawings(&space.id)
        .api_err("Failed to list drawings")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(drawings)))
}

pub async fn get_drawing(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let drawing = fetch_drawing(store, &auth, &id, Role::Viewer)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(drawing)))
}

pub async fn update_drawing(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDrawingRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut drawing = fetch_drawing(store, &auth, &id, Role::Editor)?;

    if let Some(name) = req.name {
        validate_display_name(&name, "Drawing")?;
        drawing.name = name;
    }
    if let Some(elements) = req.elements {
        drawing.elements = elements;
    }
    if let Some(app_state) = req.app_state {
        drawing.app_state = app_state;
    }
    if let Some(files) = req.files {
        drawing.files = files;
    }
    if let Some(thumbnail) = req.thumbnail {
        drawing.thumbnail = if thumbnail.is_empty() {
            None
        } else {
            Some(thumbnail)
        };
    }

    store.update_drawing(&drawing)?;
    let drawing = store
        .get_drawing(&drawing.id)
        .api_err("Failed to get drawing")?
        .or_not_found("Drawing not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(drawing)))
}

/// Deleting is reserved for whoever could also manage the drawing's grants,
/// not every editor.
pub async fn delete_drawing(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let drawing = store
        .get_drawing(&id)
        .api_err("Failed to get drawing")?
        .or_not_found("Drawing not found")?;
    if !can_manage_permissions(
        store,
        &auth.user,
        ResourceKind::Drawing,
        &drawing.id,
        &drawing.space_id,
    )? {
        return Err(ApiError::forbidden("Only the owner can delete a drawing"));
    }

    if !store
        .delete_drawing(&drawing.id)
        .api_err("Failed to delete drawing")?
    {
        return Err(ApiError::not_found("Drawing not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
