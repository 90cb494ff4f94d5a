mod filter;
mod schema;
mod sqlite;

pub use filter::row_matches_filter;
pub use sqlite::SqliteStore;

use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::types::*;

/// Number of versions retained per document; older ones are hard-deleted.
pub const VERSION_RETENTION: i64 = 50;

/// Fields of a document content update. Absent fields are left unchanged.
#[derive(Debug, Default)]
pub struct DocumentContentUpdate<'a> {
    pub name: Option<&'a str>,
    pub content: Option<&'a JsonValue>,
    pub config: Option<&'a JsonValue>,
    pub meta: Option<&'a JsonValue>,
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>>;
    fn update_user(&self, user: &User) -> Result<()>;
    fn delete_user(&self, id: &str) -> Result<bool>;
    fn count_users(&self) -> Result<i64>;

    // Group operations
    fn create_group(&self, group: &Group) -> Result<()>;
    fn get_group(&self, id: &str) -> Result<Option<Group>>;
    fn get_group_by_name(&self, name: &str) -> Result<Option<Group>>;
    fn list_groups(&self) -> Result<Vec<Group>>;
    fn update_group(&self, group: &Group) -> Result<()>;
    fn delete_group(&self, id: &str) -> Result<bool>;
    fn add_group_member(&self, group_id: &str, user_id: &str) -> Result<()>;
    fn remove_group_member(&self, group_id: &str, user_id: &str) -> Result<bool>;
    fn list_group_members(&self, group_id: &str) -> Result<Vec<User>>;
    fn list_user_groups(&self, user_id: &str) -> Result<Vec<Group>>;

    // Session operations
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session(&self, id: &str) -> Result<Option<Session>>;
    fn delete_session(&self, id: &str) -> Result<bool>;
    fn purge_expired_sessions(&self) -> Result<usize>;

    // API key operations
    fn create_api_key(&self, key: &ApiKey) -> Result<()>;
    fn get_api_key(&self, id: &str) -> Result<Option<ApiKey>>;
    fn get_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>>;
    fn list_user_api_keys(&self, user_id: &str) -> Result<Vec<ApiKey>>;
    fn delete_api_key(&self, id: &str) -> Result<bool>;
    fn update_api_key_last_used(&self, id: &str) -> Result<()>;

    // Space operations
    fn create_space(&self, space: &Space) -> Result<()>;
    fn get_space(&self, id: &str) -> Result<Option<Space>>;
    fn get_space_any(&self, id: &str) -> Result<Option<Space>>;
    fn get_space_by_slug(&self, slug: &str) -> Result<Option<Space>>;
    fn list_spaces_for_user(&self, user_id: &str) -> Result<Vec<Space>>;
    fn update_space(&self, space: &Space) -> Result<()>;
    fn delete_space(&self, id: &str) -> Result<bool>;

    // Permission operations
    fn get_user_permission(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        user_id: &str,
    ) -> Result<Option<Permission>>;
    fn list_group_roles_for_user(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        user_id: &str,
    ) -> Result<Vec<Role>>;
    fn list_resource_permissions(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> Result<Vec<Permission>>;
    fn upsert_permission(&self, perm: &Permission) -> Result<Permission>;
    fn delete_permission(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        user_id: Option<&str>,
        group_id: Option<&str>,
    ) -> Result<bool>;

    // Document operations
    fn create_document(&self, doc: &Document) -> Result<Document>;
    fn get_document(&self, id: &str) -> Result<Option<Document>>;
    fn get_document_any(&self, id: &str) -> Result<Option<Document>>;
    fn get_document_by_slug(&self, space_id: &str, slug: &str) -> Result<Option<Document>>;
    fn list_child_documents(
        &self,
        space_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<Document>>;
    fn list_space_documents(&self, space_id: &str) -> Result<Vec<Document>>;
    fn update_document(&self, doc: &Document) -> Result<()>;
    fn update_document_content(
        &self,
        id: &str,
        update: &DocumentContentUpdate,
        updated_by: &str,
    ) -> Result<Document>;
    fn move_document(&self, id: &str, new_parent_id: Option<&str>) -> Result<Document>;
    fn reorder_documents(&self, space_id: &str, orders: &[(String, i64)]) -> Result<()>;
    fn delete_document(&self, id: &str) -> Result<()>;
    fn restore_document(&self, id: &str) -> Result<Document>;
    fn list_deleted_documents(&self, space_id: &str) -> Result<Vec<Document>>;
    fn search_documents(
        &self,
        query: &str,
        space_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Document>>;

    // Document version operations
    fn create_document_version(
        &self,
        document_id: &str,
        description: Option<&str>,
        created_by: &str,
    ) -> Result<DocumentVersion>;
    fn get_document_version(
        &self,
        document_id: &str,
        version: i64,
    ) -> Result<Option<DocumentVersion>>;
    fn list_document_versions(
        &self,
        document_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DocumentVersion>>;
    fn count_document_versions(&self, document_id: &str) -> Result<i64>;
    fn restore_document_version(
        &self,
        document_id: &str,
        version: i64,
        restored_by: &str,
    ) -> Result<Document>;

    // Database operations
    fn create_database(&self, db: &Database, seed_rows: &[DatabaseRow]) -> Result<()>;
    fn get_database(&self, id: &str) -> Result<Option<Database>>;
    fn get_database_by_document(&self, document_id: &str) -> Result<Option<Database>>;
    fn list_space_databases(&self, space_id: &str) -> Result<Vec<Database>>;
    fn update_database(&self, db: &Database) -> Result<()>;
    fn delete_database(&self, id: &str) -> Result<bool>;

    // Database row operations
    fn create_row(&self, row: &DatabaseRow) -> Result<()>;
    fn get_row(&self, id: &str) -> Result<Option<DatabaseRow>>;
    fn list_rows(
        &self,
        database_id: &str,
        filter: Option<&FilterConfig>,
        sort: &[SortRule],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DatabaseRow>>;
    fn count_rows(&self, database_id: &str, filter: Option<&FilterConfig>) -> Result<i64>;
    fn update_row(&self, row: &DatabaseRow) -> Result<()>;
    fn delete_row(&self, id: &str) -> Result<bool>;
    fn delete_rows(&self, database_id: &str, ids: &[String]) -> Result<usize>;

    // Drawing operations
    fn create_drawing(&self, drawing: &Drawing) -> Result<()>;
    fn get_drawing(&self, id: &str) -> Result<Option<Drawing>>;
    fn list_space_drawings(&self, space_id: &str) -> Result<Vec<Drawing>>;
    fn update_drawing(&self, drawing: &Drawing) -> Result<()>;
    fn delete_drawing(&self, id: &str) -> Result<bool>;

    // Comment operations
    fn create_comment(&self, comment: &Comment) -> Result<()>;
    fn get_comment(&self, id: &str) -> Result<Option<Comment>>;
    fn list_document_comments(&self, document_id: &str) -> Result<Vec<Comment>>;
    fn update_comment(&self, comment: &Comment) -> Result<()>;
    fn delete_comment(&self, id: &str) -> Result<bool>;

    // Favorite operations
    fn create_favorite(&self, user_id: &str, document_id: &str, space_id: &str)
    -> Result<Favorite>;
    fn get_favorite(&self, id: &str) -> Result<Option<Favorite>>;
    fn list_user_favorites(&self, user_id: &str) -> Result<Vec<Favorite>>;
    fn update_favorite_position(&self, id: &str, position: i64) -> Result<()>;
    fn delete_favorite(&self, id: &str) -> Result<bool>;

    fn close(&self) -> Result<()>;
}
