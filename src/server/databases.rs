use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::{Map, Value as JsonValue, json};
use uuid::Uuid;

use crate::access::{grant_role, require_role};
use crate::auth::RequireUser;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{
    BulkDeleteResponse, BulkDeleteRowsRequest, CreateDatabaseRequest, CreateRowRequest,
    CreateViewRequest, ListDatabasesParams, ListRowsParams, RowListResponse, UpdateDatabaseRequest,
    UpdateRowRequest, UpdateViewRequest,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::spaces::fetch_space;
use crate::server::validation::{
    parse_database_type, validate_display_name, validate_row_properties,
};
use crate::store::Store;
use crate::types::{
    Database, DatabaseRow, DatabaseType, Property, ResourceKind, Role, SortRule, View,
};

const ROWS_DEFAULT_LIMIT: i64 = 50;
const ROWS_LIMIT_CAP: i64 = 200;
const SEED_ROW_COUNT: usize = 3;

fn fetch_database(
    store: &dyn Store,
    auth: &RequireUser,
    id: &str,
    required: Role,
) -> Result<Database, ApiError> {
    let db = store
        .get_database(id)
        .api_err("Failed to get database")?
        .or_not_found("Database not found")?;
    require_role(
        store,
        &auth.user,
        ResourceKind::Database,
        &db.id,
        &db.space_id,
        required,
    )?;
    Ok(db)
}

/// New spreadsheets get a title and a date column, a table view, and a few
/// sample rows so the grid is not empty on first open. Document databases get
/// a title column and a list view only.
fn seed_schema(database_type: DatabaseType) -> (Vec<Property>, Vec<View>) {
    match database_type {
        DatabaseType::Spreadsheet => {
            let properties = vec![Property::new("Name", "title"), Property::new("Date", "date")];
            let views = vec![View::new("Table", "table")];
            (properties, views)
        }
        DatabaseType::Document => {
            let properties = vec![Property::new("Name", "title")];
            let views = vec![View::new("List", "list")];
            (properties, views)
        }
    }
}

fn seed_rows(db: &Database) -> Vec<DatabaseRow> {
    let Some(title) = db.title_property() else {
        return Vec::new();
    };
    let now = Utc::now();
    (1..=SEED_ROW_COUNT)
        .map(|n| {
            let mut properties = Map::new();
            properties.insert(title.id.clone(), json!(format!("Data {n}")));
            DatabaseRow {
                id: Uuid::new_v4().to_string(),
                database_id: db.id.clone(),
                properties: JsonValue::Object(properties),
                content: None,
                show_in_sidebar: false,
                created_by: db.created_by.clone(),
                created_at: now,
                updated_at: now,
                deleted_at: None,
            }
        })
        .collect()
}

pub async fn create_database(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDatabaseRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_display_name(&req.name, "Database")?;
    let database_type = match req.database_type.as_deref() {
        Some(s) => parse_database_type(s)?,
        None => DatabaseType::Spreadsheet,
    };

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
        if store
            .get_database_by_document(document_id)
            .api_err("Failed to check document")?
            .is_some()
        {
            return Err(ApiError::conflict("Document already has a database"));
        }
    }

    let (properties, views) = seed_schema(database_type);
    let default_view_id = views.first().map(|v| v.id.clone());
    let now = Utc::now();
    let db = Database {
        id: Uuid::new_v4().to_string(),
        space_id: space.id,
        document_id: req.document_id,
        database_type,
        name: req.name,
        properties,
        views,
        default_view_id,
        created_by: auth.user.id.clone(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    let rows = match database_type {
        DatabaseType::Spreadsheet => seed_rows(&db),
        DatabaseType::Document => Vec::new(),
    };
    store
        .create_database(&db, &rows)
        .api_err("Failed to create database")?;
    grant_role(
        store,
        ResourceKind::Database,
        &db.id,
        &auth.user.id,
        Role::Editor,
    )?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(db))))
}

pub async fn list_databases(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListDatabasesParams>,
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

    let databases = store
        .list_space_databases(&space.id)
        .api_err("Failed to list databases")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(databases)))
}

pub async fn get_database(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let db = fetch_database(store, &auth, &id, Role::Viewer)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(db)))
}

/// Looks up the inline database attached to a document.
pub async fn get_document_database(
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
        Role::Viewer,
    )?;

    let db = store
        .get_database_by_document(&doc.id)
        .api_err("Failed to get database")?
        .or_not_found("Document has no database")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(db)))
}

pub async fn update_database(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDatabaseRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut db = fetch_database(store, &auth, &id, Role::Editor)?;

    if let Some(name) = req.name {
        validate_display_name(&name, "Database")?;
        db.name = name;
    }
    if let Some(properties) = req.properties {
        db.properties = properties;
    }
    if let Some(view_id) = req.default_view_id {
        if db.view(&view_id).is_none() {
            return Err(ApiError::bad_request(
                "default_view_id does not match any view",
            ));
        }
        db.default_view_id = Some(view_id);
    }

    store
        .update_database(&db)
        .api_err("Failed to update database")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(db)))
}

pub async fn delete_database(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let db = fetch_database(store, &auth, &id, Role::Editor)?;
    if !store
        .delete_database(&db.id)
        .api_err("Failed to delete database")?
    {
        return Err(ApiError::not_found("Database not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn create_view(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateViewRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut db = fetch_database(store, &auth, &id, Role::Editor)?;

    validate_display_name(&req.name, "View")?;
    let view_type = req.view_type.as_deref().unwrap_or("table");
    let view = View::new(&req.name, view_type);
    db.views.push(view.clone());
    store
        .update_database(&db)
        .api_err("Failed to create view")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(view))))
}

pub async fn update_view(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, view_id)): Path<(String, String)>,
    Json(req): Json<UpdateViewRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut db = fetch_database(store, &auth, &id, Role::Editor)?;

    let view = db
        .views
        .iter_mut()
        .find(|v| v.id == view_id)
        .ok_or_else(|| ApiError::not_found("View not found"))?;

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(ApiError::bad_request("View name cannot be empty"));
        }
        view.name = name;
    }
    if let Some(view_type) = req.view_type {
        if view_type.trim().is_empty() {
            return Err(ApiError::bad_request("View type cannot be empty"));
        }
        view.view_type = view_type;
    }
    // An explicit empty filter clears it; an absent field leaves it alone.
    if let Some(filter) = req.filter {
        view.filter = if filter.is_empty() { None } else { Some(filter) };
    }
    if let Some(sort) = req.sort {
        view.sort = sort;
    }
    if let Some(columns) = req.columns {
        view.columns = Some(columns);
    }
    if let Some(hidden) = req.hidden_columns {
        view.hidden_columns = Some(hidden);
    }
    let view = view.clone();

    store
        .update_database(&db)
        .api_err("Failed to update view")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(view)))
}

pub async fn delete_view(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, view_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut db = fetch_database(store, &auth, &id, Role::Editor)?;

    let index = db
        .views
        .iter()
        .position(|v| v.id == view_id)
        .ok_or_else(|| ApiError::not_found("View not found"))?;
    if db.views.len() == 1 {
        return Err(Error::LastView.into());
    }
    db.views.remove(index);
    if db.default_view_id.as_deref() == Some(view_id.as_str()) {
        db.default_view_id = db.views.first().map(|v| v.id.clone());
    }

    store
        .update_database(&db)
        .api_err("Failed to delete view")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn list_rows(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ListRowsParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let db = fetch_database(store, &auth, &id, Role::Viewer)?;

    let limit = params
        .limit
        .unwrap_or(ROWS_DEFAULT_LIMIT)
        .clamp(1, ROWS_LIMIT_CAP);
    let offset = params.offset.unwrap_or(0).max(0);

    // A view id compiles that view's filter and sort into the query.
    let (filter, sort): (_, &[SortRule]) = match params.view_id.as_deref() {
        Some(view_id) => {
            let view = db.view(view_id).or_not_found("View not found")?;
            (view.filter.as_ref(), &view.sort)
        }
        None => (None, &[]),
    };

    let rows = store
        .list_rows(&db.id, filter, sort, limit, offset)
        .api_err("Failed to list rows")?;
    let total_count = store
        .count_rows(&db.id, None)
        .api_err("Failed to count rows")?;
    let filtered_count = if filter.is_some() {
        store
            .count_rows(&db.id, filter)
            .api_err("Failed to count rows")?
    } else {
        total_count
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(RowListResponse {
        rows,
        total_count,
        filtered_count,
        limit,
        offset,
    })))
}

pub async fn create_row(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateRowRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let db = fetch_database(store, &auth, &id, Role::Editor)?;

    let properties = req.properties.unwrap_or_else(|| json!({}));
    validate_row_properties(&db, &properties)?;

    let now = Utc::now();
    let row = DatabaseRow {
        id: Uuid::new_v4().to_string(),
        database_id: db.id,
        properties,
        content: req.content,
        show_in_sidebar: req.show_in_sidebar.unwrap_or(false),
        created_by: auth.user.id.clone(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    store.create_row(&row).api_err("Failed to create row")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(row))))
}

fn fetch_row(store: &dyn Store, db: &Database, row_id: &str) -> Result<DatabaseRow, ApiError> {
    store
        .get_row(row_id)
        .api_err("Failed to get row")?
        .filter(|r| r.database_id == db.id)
        .or_not_found("Row not found")
}

pub async fn get_row(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, row_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let db = fetch_database(store, &auth, &id, Role::Viewer)?;
    let row = fetch_row(store, &db, &row_id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(row)))
}

pub async fn update_row(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, row_id)): Path<(String, String)>,
    Json(req): Json<UpdateRowRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let db = fetch_database(store, &auth, &id, Role::Editor)?;
    let mut row = fetch_row(store, &db, &row_id)?;

    if let Some(incoming) = req.properties {
        validate_row_properties(&db, &incoming)?;
        let JsonValue::Object(incoming) = incoming else {
            return Err(ApiError::bad_request("properties must be an object"));
        };
        let mut merged = match row.properties {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in incoming {
            if value.is_null() {
                merged.remove(&key);
            } else {
                merged.insert(key, value);
            }
        }
        row.properties = JsonValue::Object(merged);
    }
    if let Some(content) = req.content {
        row.content = if content.is_null() { None } else { Some(content) };
    }
    if let Some(show) = req.show_in_sidebar {
        row.show_in_sidebar = show;
    }

    store.update_row(&row)?;
    let row = fetch_row(store, &db, &row_id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(row)))
}

pub async fn delete_row(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, row_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let db = fetch_database(store, &auth, &id, Role::Editor)?;
    let row = fetch_row(store, &db, &row_id)?;
    if !store.delete_row(&row.id).api_err("Failed to delete row")? {
        return Err(ApiError::not_found("Row not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

/// Deletes the listed rows in one statement. Ids outside this database are
/// ignored, which also makes retries harmless.
pub async fn bulk_delete_rows(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<BulkDeleteRowsRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let db = fetch_database(store, &auth, &id, Role::Editor)?;
    let deleted = store
        .delete_rows(&db.id, &req.row_ids)
        .api_err("Failed to delete rows")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(BulkDeleteResponse { deleted })))
}
