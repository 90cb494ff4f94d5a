use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::access::require_role;
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{CreateCommentRequest, UpdateCommentRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::store::Store;
use crate::types::{Comment, Document, ResourceKind, Role};

fn fetch_commentable_document(
    store: &dyn Store,
    auth: &RequireUser,
    document_id: &str,
) -> Result<Document, ApiError> {
    let doc = store
        .get_document(document_id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")?;
    require_role(
        store,
        &auth.user,
        ResourceKind::Document,
        &doc.id,
        &doc.space_id,
        Role::Viewer,
    )?;
    Ok(doc)
}

pub async fn list_comments(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let doc = fetch_commentable_document(store, &auth, &id)?;
    let comments = store
        .list_document_comments(&doc.id)
        .api_err("Failed to list comments")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(comments)))
}

pub async fn create_comment(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateCommentRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let doc = fetch_commentable_document(store, &auth, &id)?;

    if req.content.trim().is_empty() {
        return Err(ApiError::bad_request("Comment content cannot be empty"));
    }
    if let Some(ref parent_id) = req.parent_id {
        let parent = store
            .get_comment(parent_id)
            .api_err("Failed to get parent comment")?
            .or_not_found("Parent comment not found")?;
        if parent.document_id != doc.id {
            return Err(ApiError::bad_request(
                "Parent comment is on a different document",
            ));
        }
    }

    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        document_id: doc.id,
        parent_id: req.parent_id,
        block_id: req.block_id,
        content: req.content,
        resolved: false,
        created_by: auth.user.id.clone(),
        created_at: now,
        updated_at: now,
    };
    store
        .create_comment(&comment)
        .api_err("Failed to create comment")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(comment))))
}

/// Editing the text is author-only; resolving is open to anyone who can view
/// the document.
pub async fn update_comment(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCommentRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut comment = store
        .get_comment(&id)
        .api_err("Failed to get comment")?
        .or_not_found("Comment not found")?;
    fetch_commentable_document(store, &auth, &comment.document_id)?;

    if let Some(content) = req.content {
        if comment.created_by != auth.user.id {
            return Err(ApiError::forbidden("Only the author can edit a comment"));
        }
        if content.trim().is_empty() {
            return Err(ApiError::bad_request("Comment content cannot be empty"));
        }
        comment.content = content;
    }
    if let Some(resolved) = req.resolved {
        comment.resolved = resolved;
    }

    store.update_comment(&comment)?;
    let comment = store
        .get_comment(&comment.id)
        .api_err("Failed to get comment")?
        .or_not_found("Comment not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(comment)))
}

pub async fn delete_comment(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let comment = store
        .get_comment(&id)
        .api_err("Failed to get comment")?
        .or_not_found("Comment not found")?;
    if comment.created_by != auth.user.id {
        return Err(ApiError::forbidden("Only the author can delete a comment"));
    }

    if !store
        .delete_comment(&comment.id)
        .api_err("Failed to delete comment")?
    {
        return Err(ApiError::not_found("Comment not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
