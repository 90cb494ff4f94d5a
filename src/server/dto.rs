use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::types::{
    ApiKey, Document, DocumentVersion, FilterConfig, Property, SortRule, User,
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePreferencesRequest {
    pub preferences: JsonValue,
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires_in_days: Option<i64>,
}

/// The plaintext key is returned exactly once, here.
#[derive(Debug, Serialize)]
pub struct CreateApiKeyResponse {
    pub key: String,
    pub metadata: ApiKey,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub global_role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub global_role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSpaceRequest {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub space_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSpaceRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub space_type: Option<String>,
}

/// Grant to exactly one subject: user_id XOR group_id.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RevokeParams {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub space_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub content: Option<JsonValue>,
    #[serde(default)]
    pub config: Option<JsonValue>,
    #[serde(default)]
    pub meta: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Option<JsonValue>,
    #[serde(default)]
    pub config: Option<JsonValue>,
    #[serde(default)]
    pub meta: Option<JsonValue>,
    #[serde(default)]
    pub public: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MoveDocumentRequest {
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentOrder {
    pub id: String,
    pub position: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReorderDocumentsRequest {
    pub space_id: String,
    pub orders: Vec<DocumentOrder>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListDocumentsParams {
    pub space_id: String,
    /// Absent lists the whole space; empty string lists root documents.
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GetDocumentParams {
    /// Required when the path identifier is a slug rather than an id.
    #[serde(default)]
    pub space_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrashParams {
    pub space_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub space_id: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SpaceSummary {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct PublicDocumentResponse {
    #[serde(flatten)]
    pub document: Document,
    pub space: SpaceSummary,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateVersionRequest {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListVersionsParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListVersionsResponse {
    pub versions: Vec<DocumentVersion>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateDatabaseRequest {
    pub space_id: String,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub database_type: Option<String>,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDatabaseRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: Option<Vec<Property>>,
    #[serde(default)]
    pub default_view_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListDatabasesParams {
    pub space_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateViewRequest {
    pub name: String,
    #[serde(default)]
    pub view_type: Option<String>,
}

/// Per-field update rules: `name`/`view_type` replace when provided; `filter`
/// and `sort` distinguish absent (unchanged) from empty (clear) from
/// populated (replace); column lists replace when provided.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateViewRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub view_type: Option<String>,
    #[serde(default)]
    pub filter: Option<FilterConfig>,
    #[serde(default)]
    pub sort: Option<Vec<SortRule>>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub hidden_columns: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateRowRequest {
    #[serde(default)]
    pub properties: Option<JsonValue>,
    #[serde(default)]
    pub content: Option<JsonValue>,
    #[serde(default)]
    pub show_in_sidebar: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRowRequest {
    /// Merged key-by-key into the stored properties; a null value removes
    /// the key.
    #[serde(default)]
    pub properties: Option<JsonValue>,
    #[serde(default)]
    pub content: Option<JsonValue>,
    #[serde(default)]
    pub show_in_sidebar: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRowsParams {
    #[serde(default)]
    pub view_id: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RowListResponse {
    pub rows: Vec<crate::types::DatabaseRow>,
    pub total_count: i64,
    pub filtered_count: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRowsRequest {
    pub row_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateDrawingRequest {
    pub space_id: String,
    #[serde(default)]
    pub document_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub elements: Option<JsonValue>,
    #[serde(default)]
    pub app_state: Option<JsonValue>,
    #[serde(default)]
    pub files: Option<JsonValue>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDrawingRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub elements: Option<JsonValue>,
    #[serde(default)]
    pub app_state: Option<JsonValue>,
    #[serde(default)]
    pub files: Option<JsonValue>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListDrawingsParams {
    pub space_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub block_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCommentRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub resolved: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFavoriteRequest {
    pub document_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFavoriteRequest {
    pub position: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    /// Omitted means the server generates one and returns it once.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub global_role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub global_role: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub cursor: Option<String>,
}
