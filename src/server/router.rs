use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use super::admin::admin_router;
use super::{
    apikeys, auth, comments, databases, documents, drawings, favorites, groups, permissions,
    spaces, versions,
};
use crate::auth::PasswordService;
use crate::config::ServerConfig;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: ServerConfig,
    pub passwords: PasswordService,
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/users/me/preferences", put(auth::update_preferences))
        .route("/users/me/password", put(auth::change_password))
        // API keys
        .route("/apikeys", get(apikeys::list_api_keys))
        .route("/apikeys", post(apikeys::create_api_key))
        .route("/apikeys/{id}", get(apikeys::get_api_key))
        .route("/apikeys/{id}", delete(apikeys::delete_api_key))
        // Groups
        .route("/groups", get(groups::list_groups))
        .route("/groups", post(groups::create_group))
        .route("/groups/{id}", get(groups::get_group))
        .route("/groups/{id}", patch(groups::update_group))
        .route("/groups/{id}", delete(groups::delete_group))
        .route("/groups/{id}/members", get(groups::list_members))
        .route("/groups/{id}/members", post(groups::add_member))
        .route(
            "/groups/{id}/members/{user_id}",
            delete(groups::remove_member),
        )
        // Spaces
        .route("/spaces", get(spaces::list_spaces))
        .route("/spaces", post(spaces::create_space))
        .route("/spaces/{id}", get(spaces::get_space))
        .route("/spaces/{id}", patch(spaces::update_space))
        .route("/spaces/{id}", delete(spaces::delete_space))
        .route(
            "/spaces/{id}/permissions",
            get(permissions::list_space_permissions),
        )
        .route(
            "/spaces/{id}/permissions",
            post(permissions::grant_space_permission),
        )
        .route(
            "/spaces/{id}/permissions",
            delete(permissions::revoke_space_permission),
        )
        // Documents
        .route("/documents", get(documents::list_documents))
        .route("/documents", post(documents::create_document))
        .route("/documents/search", get(documents::search_documents))
        .route("/documents/trash", get(documents::list_trash))
        .route("/documents/reorder", post(documents::reorder_documents))
        .route("/documents/{id}", get(documents::get_document))
        .route("/documents/{id}", patch(documents::update_document))
        .route("/documents/{id}", delete(documents::delete_document))
        .route("/documents/{id}/move", post(documents::move_document))
        .route("/documents/{id}/restore", post(documents::restore_document))
        .route(
            "/documents/{id}/database",
            get(databases::get_document_database),
        )
        .route("/documents/{id}/comments", get(comments::list_comments))
        .route("/documents/{id}/comments", post(comments::create_comment))
        .route("/documents/{id}/versions", get(versions::list_versions))
        .route("/documents/{id}/versions", post(versions::create_version))
        .route(
            "/documents/{id}/versions/{version}",
            get(versions::get_version),
        )
        .route(
            "/documents/{id}/versions/{version}/restore",
            post(versions::restore_version),
        )
        .route(
            "/documents/{id}/permissions",
            get(permissions::list_document_permissions),
        )
        .route(
            "/documents/{id}/permissions",
            post(permissions::grant_document_permission),
        )
        .route(
            "/documents/{id}/permissions",
            delete(permissions::revoke_document_permission),
        )
        // Public document sharing, no auth
        .route(
            "/public/{space_id}/{id_or_slug}",
            get(documents::get_public_document),
        )
        // Databases
        .route("/databases", get(databases::list_databases))
        .route("/databases", post(databases::create_database))
        .route("/databases/{id}", get(databases::get_database))
        .route("/databases/{id}", patch(databases::update_database))
        .route("/databases/{id}", delete(databases::delete_database))
        .route("/databases/{id}/views", post(databases::create_view))
        .route(
            "/databases/{id}/views/{view_id}",
            patch(databases::update_view),
        )
        .route(
            "/databases/{id}/views/{view_id}",
            delete(databases::delete_view),
        )
        .route("/databases/{id}/rows", get(databases::list_rows))
        .route("/databases/{id}/rows", post(databases::create_row))
        .route(
            "/databases/{id}/rows/bulk-delete",
            post(databases::bulk_delete_rows),
        )
        .route("/databases/{id}/rows/{row_id}", get(databases::get_row))
        .route("/databases/{id}/rows/{row_id}", patch(databases::update_row))
        .route(
            "/databases/{id}/rows/{row_id}",
            delete(databases::delete_row),
        )
        .route(
            "/databases/{id}/permissions",
            get(permissions::list_database_permissions),
        )
        .route(
            "/databases/{id}/permissions",
            post(permissions::grant_database_permission),
        )
        .route(
            "/databases/{id}/permissions",
            delete(permissions::revoke_database_permission),
        )
        // Drawings
        .route("/drawings", get(drawings::list_drawings))
        .route("/drawings", post(drawings::create_drawing))
        .route("/drawings/{id}", get(drawings::get_drawing))
        .route("/drawings/{id}", patch(drawings::update_drawing))
        .route("/drawings/{id}", delete(drawings::delete_drawing))
        .route(
            "/drawings/{id}/permissions",
            get(permissions::list_drawing_permissions),
        )
        .route(
            "/drawings/{id}/permissions",
            post(permissions::grant_drawing_permission),
        )
        .route(
            "/drawings/{id}/permissions",
            delete(permissions::revoke_drawing_permission),
        )
        // Comments
        .route("/comments/{id}", patch(comments::update_comment))
        .route("/comments/{id}", delete(comments::delete_comment))
        // Favorites
        .route("/favorites", get(favorites::list_favorites))
        .route("/favorites", post(favorites::create_favorite))
        .route("/favorites/{id}", patch(favorites::update_favorite))
        .route("/favorites/{id}", delete(favorites::delete_favorite))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1", api_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
