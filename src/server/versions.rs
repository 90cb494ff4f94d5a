use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::access::require_role;
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{CreateVersionRequest, ListVersionsParams, ListVersionsResponse};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::store::Store;
use crate::types::{Document, ResourceKind, Role};

const VERSIONS_DEFAULT_LIMIT: i64 = 50;
const VERSIONS_LIMIT_CAP: i64 = 200;

fn fetch_versioned_document(
    store: &dyn Store,
    auth: &RequireUser,
    id: &str,
    required: Role,
) -> Result<Document, ApiError> {
    let doc = store
        .get_document(id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")?;
    require_role(
        store,
        &auth.user,
        ResourceKind::Document,
        &doc.id,
        &doc.space_id,
        required,
    )?;
    Ok(doc)
}

pub async fn list_versions(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ListVersionsParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let doc = fetch_versioned_document(store, &auth, &id, Role::Viewer)?;

    let limit = params
        .limit
        .unwrap_or(VERSIONS_DEFAULT_LIMIT)
        .clamp(1, VERSIONS_LIMIT_CAP);
    let offset = params.offset.unwrap_or(0).max(0);

    let versions = store
        .list_document_versions(&doc.id, limit, offset)
        .api_err("Failed to list versions")?;
    let total = store
        .count_document_versions(&doc.id)
        .api_err("Failed to count versions")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ListVersionsResponse {
        versions,
        total,
        limit,
        offset,
    })))
}

pub async fn get_version(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, version)): Path<(String, i64)>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let doc = fetch_versioned_document(store, &auth, &id, Role::Viewer)?;

    let version = store
        .get_document_version(&doc.id, version)
        .api_err("Failed to get version")?
        .or_not_found("Version not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(version)))
}

pub async fn create_version(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateVersionRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let doc = fetch_versioned_document(store, &auth, &id, Role::Editor)?;

    let version = store
        .create_document_version(&doc.id, req.description.as_deref(), &auth.user.id)
        .api_err("Failed to create version")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(version))))
}

/// Snapshots the current content first, so the restore itself can be undone.
pub async fn restore_version(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, version)): Path<(String, i64)>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let doc = fetch_versioned_document(store, &auth, &id, Role::Editor)?;

    let restored = store.restore_document_version(&doc.id, version, &auth.user.id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(restored)))
}
