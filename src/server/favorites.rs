use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::access::require_role;
use crate::auth::RequireUser;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{CreateFavoriteRequest, UpdateFavoriteRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::store::Store;
use crate::types::{Favorite, ResourceKind, Role};

fn fetch_own_favorite(
    store: &dyn Store,
    auth: &RequireUser,
    id: &str,
) -> Result<Favorite, ApiError> {
    store
        .get_favorite(id)
        .api_err("Failed to get favorite")?
        .filter(|f| f.user_id == auth.user.id)
        .or_not_found("Favorite not found")
}

pub async fn list_favorites(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let favorites = store
        .list_user_favorites(&auth.user.id)
        .api_err("Failed to list favorites")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(favorites)))
}

pub async fn create_favorite(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateFavoriteRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let doc = store
        .get_document(&req.document_id)
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

    let favorite = match store.create_favorite(&auth.user.id, &doc.id, &doc.space_id) {
        Ok(favorite) => favorite,
        Err(Error::AlreadyExists) => {
            return Err(ApiError::conflict("Document is already a favorite"));
        }
        Err(e) => return Err(e.into()),
    };

    Ok((StatusCode::CREATED, Json(ApiResponse::success(favorite))))
}

/// Moves one favorite to a new position. Other favorites keep their
/// positions; the client orders ties by creation time.
pub async fn update_favorite(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFavoriteRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let favorite = fetch_own_favorite(store, &auth, &id)?;
    store
        .update_favorite_position(&favorite.id, req.position)
        .api_err("Failed to update favorite")?;
    let favorite = fetch_own_favorite(store, &auth, &id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(favorite)))
}

pub async fn delete_favorite(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let favorite = fetch_own_favorite(store, &auth, &id)?;
    if !store
        .delete_favorite(&favorite.id)
        .api_err("Failed to delete favorite")?
    {
        return Err(ApiError::not_found("Favorite not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
