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

use crate::access::{can_view, grant_role, require_role};
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{
    CreateDocumentRequest, GetDocumentParams, ListDocumentsParams, MoveDocumentRequest,
    PublicDocumentResponse, ReorderDocumentsRequest, SearchParams, SpaceSummary, TrashParams,
    UpdateDocumentRequest,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::spaces::fetch_space;
use crate::server::validation::{unique_document_slug, validate_display_name};
use crate::store::{DocumentContentUpdate, Store};
use crate::types::{Document, ResourceKind, Role};

const SEARCH_DEFAULT_LIMIT: i64 = 20;
const SEARCH_LIMIT_CAP: i64 = 50;
/// How many candidates to pull from the store before access filtering.
const SEARCH_SCAN_LIMIT: i64 = 200;

/// Looks up a live document by id, or by slug within `space_id`.
pub(crate) fn fetch_document(
    store: &dyn Store,
    id_or_slug: &str,
    space_id: Option<&str>,
) -> Result<Document, ApiError> {
    let doc = if Uuid::parse_str(id_or_slug).is_ok() {
        store
            .get_document(id_or_slug)
            .api_err("Failed to get document")?
    } else {
        let Some(space_id) = space_id else {
            return Err(ApiError::bad_request(
                "space_id is required to look up a document by slug",
            ));
        };
        store
            .get_document_by_slug(space_id, id_or_slug)
            .api_err("Failed to get document")?
    };
    doc.or_not_found("Document not found")
}

pub async fn create_document(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDocumentRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_display_name(&req.name, "Document")?;

    let space = fetch_space(store, &auth.user, &req.space_id)?;
    if space.deleted_at.is_some() {
        return Err(ApiError::conflict("Space is deleted"));
    }

    // Creating under a parent needs editor on the parent; at the root,
    // editor on the space.
    if let Some(ref parent_id) = req.parent_id {
        let parent = store
            .get_document(parent_id)
            .api_err("Failed to get parent")?
            .or_not_found("Parent document not found")?;
        if parent.space_id != space.id {
            return Err(ApiError::bad_request(
                "Parent document is in a different space",
            ));
        }
        require_role(
            store,
            &auth.user,
            ResourceKind::Document,
            &parent.id,
            &space.id,
            Role::Editor,
        )?;
    } else {
        require_role(
            store,
            &auth.user,
            ResourceKind::Space,
            &space.id,
            &space.id,
            Role::Editor,
        )?;
    }

    let slug = unique_document_slug(store, &space.id, &req.name)?;
    let now = Utc::now();
    let doc = Document {
        id: Uuid::new_v4().to_string(),
        space_id: space.id.clone(),
        parent_id: req.parent_id,
        name: req.name,
        slug,
        position: 0, // assigned by the store inside the inserting transaction
        public: false,
        content: req.content.unwrap_or_else(|| json!([])),
        config: req.config.unwrap_or_else(|| json!({})),
        meta: req.meta.unwrap_or_else(|| json!({})),
        created_by: auth.user.id.clone(),
        updated_by: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    let doc = store.create_document(&doc)?;
    grant_role(
        store,
        ResourceKind::Document,
        &doc.id,
        &auth.user.id,
        Role::Owner,
    )?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(doc))))
}

pub async fn list_documents(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListDocumentsParams>,
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

    let docs = match params.parent_id.as_deref() {
        None => store
            .list_space_documents(&space.id)
            .api_err("Failed to list documents")?,
        Some("") => store
            .list_child_documents(&space.id, None)
            .api_err("Failed to list documents")?,
        Some(parent_id) => store
            .list_child_documents(&space.id, Some(parent_id))
            .api_err("Failed to list documents")?,
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(docs)))
}

pub async fn get_document(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<GetDocumentParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let doc = fetch_document(store, &id, params.space_id.as_deref())?;
    require_role(
        store,
        &auth.user,
        ResourceKind::Document,
        &doc.id,
        &doc.space_id,
        Role::Viewer,
    )?;

    Ok::<_, ApiError>(Json(ApiResponse::success(doc)))
}

pub async fn update_document(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDocumentRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let doc = store
        .get_document(&id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")?;
    require_role(
        store,
        &auth.user,
        ResourceKind::Document,
        &doc.id,
        &doc.space_id,
        Role::Editor,
    )?;

    if let Some(ref name) = req.name {
        validate_display_name(name, "Document")?;
    }

    // Name, content, and config changes go through the versioned path so a
    // snapshot lands first; meta and the public flag are plain column writes.
    let versioned = req.name.is_some() || req.content.is_some() || req.config.is_some();
    let mut doc = if versioned {
        let update = DocumentContentUpdate {
            name: req.name.as_deref(),
            content: req.content.as_ref(),
            config: req.config.as_ref(),
            meta: req.meta.as_ref(),
        };
        store.update_document_content(&doc.id, &update, &auth.user.id)?
    } else {
        doc
    };

    let mut plain_write = false;
    if !versioned {
        if let Some(meta) = req.meta {
            doc.meta = meta;
            plain_write = true;
        }
    }
    if let Some(public) = req.public {
        doc.public = public;
        plain_write = true;
    }
    if plain_write {
        doc.updated_by = Some(auth.user.id.clone());
        store
            .update_document(&doc)
            .api_err("Failed to update document")?;
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(doc)))
}

pub async fn move_document(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<MoveDocumentRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let doc = store
        .get_document(&id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")?;
    require_role(
        store,
        &auth.user,
        ResourceKind::Document,
        &doc.id,
        &doc.space_id,
        Role::Editor,
    )?;

    if let Some(ref parent_id) = req.parent_id {
        let parent = store
            .get_document(parent_id)
            .api_err("Failed to get parent")?
            .or_not_found("Parent document not found")?;
        require_role(
            store,
            &auth.user,
            ResourceKind::Document,
            &parent.id,
            &parent.space_id,
            Role::Editor,
        )?;
    }

    let moved = store.move_document(&doc.id, req.parent_id.as_deref())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(moved)))
}

pub async fn reorder_documents(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReorderDocumentsRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let space = fetch_space(store, &auth.user, &req.space_id)?;
    require_role(
        store,
        &auth.user,
        ResourceKind::Space,
        &space.id,
        &space.id,
        Role::Editor,
    )?;

    let orders: Vec<(String, i64)> = req
        .orders
        .into_iter()
        .map(|o| (o.id, o.position))
        .collect();
    store
        .reorder_documents(&space.id, &orders)
        .api_err("Failed to reorder documents")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn delete_document(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let doc = store
        .get_document(&id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")?;
    require_role(
        store,
        &auth.user,
        ResourceKind::Document,
        &doc.id,
        &doc.space_id,
        Role::Editor,
    )?;

    store.delete_document(&doc.id)?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn restore_document(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let doc = store
        .get_document_any(&id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")?;
    require_role(
        store,
        &auth.user,
        ResourceKind::Space,
        &doc.space_id,
        &doc.space_id,
        Role::Editor,
    )?;

    let restored = store.restore_document(&doc.id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(restored)))
}

pub async fn list_trash(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrashParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let space = fetch_space(store, &auth.user, &params.space_id)?;
    require_role(
        store,
        &auth.user,
        ResourceKind::Space,
        &space.id,
        &space.id,
        Role::Editor,
    )?;

    let docs = store
        .list_deleted_documents(&space.id)
        .api_err("Failed to list trash")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(docs)))
}

pub async fn search_documents(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let query = params.q.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("Search query cannot be empty"));
    }
    let limit = params
        .limit
        .unwrap_or(SEARCH_DEFAULT_LIMIT)
        .clamp(1, SEARCH_LIMIT_CAP);

    let candidates = store
        .search_documents(query, params.space_id.as_deref(), SEARCH_SCAN_LIMIT)
        .api_err("Failed to search documents")?;

    let mut results = Vec::new();
    for doc in candidates {
        if can_view(
            store,
            &auth.user,
            ResourceKind::Document,
            &doc.id,
            &doc.space_id,
        )? {
            results.push(doc);
            if results.len() as i64 >= limit {
                break;
            }
        }
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(results)))
}

/// Unauthenticated read for shared links. Only documents that opted into
/// public sharing resolve here; everything else, including documents the
/// space type would let a signed-in caller read, is a 404 so the URL leaks
/// nothing about what exists.
pub async fn get_public_document(
    State(state): State<Arc<AppState>>,
    Path((space_id, id_or_slug)): Path<(String, String)>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let space = store
        .get_space(&space_id)
        .api_err("Failed to get space")?
        .or_not_found("Document not found")?;

    let doc = if Uuid::parse_str(&id_or_slug).is_ok() {
        store
            .get_document(&id_or_slug)
            .api_err("Failed to get document")?
    } else {
        store
            .get_document_by_slug(&space.id, &id_or_slug)
            .api_err("Failed to get document")?
    };
    let doc = doc
        .filter(|d| d.space_id == space.id && d.public)
        .or_not_found("Document not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(PublicDocumentResponse {
        document: doc,
        space: SpaceSummary {
            id: space.id,
            name: space.name,
            slug: space.slug,
        },
    })))
}
