use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::filter::{compile_filter, compile_sort};
use super::schema::SCHEMA;
use super::{DocumentContentUpdate, Store, VERSION_RETENTION};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Opaque JSON blobs (content, config, meta, row properties) are read
/// leniently: corrupt text is logged and surfaced as null rather than
/// failing the whole query.
fn parse_json(s: &str) -> JsonValue {
    serde_json::from_str(s).unwrap_or_else(|e| {
        tracing::error!("Invalid JSON in database: {}", e);
        JsonValue::Null
    })
}

fn json_text(value: &JsonValue) -> String {
    value.to_string()
}

/// Typed JSON columns (schema properties, views, scopes) are read strictly;
/// corrupt text is a conversion failure.
fn typed_json<T: serde::de::DeserializeOwned>(idx: usize, s: &str) -> rusqlite::Result<T> {
    serde_json::from_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_enum<T>(
    idx: usize,
    s: &str,
    parse: fn(&str) -> Option<T>,
    what: &str,
) -> rusqlite::Result<T> {
    parse(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid {what}: {s}").into(),
        )
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation)
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, global_role, active, preferences, created_at, updated_at";

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        global_role: parse_enum(4, &row.get::<_, String>(4)?, GlobalRole::parse, "global role")?,
        active: row.get(5)?,
        preferences: row.get::<_, Option<String>>(6)?.map(|s| parse_json(&s)),
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

const GROUP_COLUMNS: &str = "id, name, owner_id, global_role, created_at, updated_at";

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        global_role: parse_enum(3, &row.get::<_, String>(3)?, GlobalRole::parse, "global role")?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

const SESSION_COLUMNS: &str = "id, user_id, created_at, expires_at";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        created_at: parse_datetime(&row.get::<_, String>(2)?),
        expires_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

const API_KEY_COLUMNS: &str =
    "id, user_id, name, key_hash, prefix, scopes, created_at, expires_at, last_used_at";

fn row_to_api_key(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApiKey> {
    Ok(ApiKey {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        key_hash: row.get(3)?,
        prefix: row.get(4)?,
        scopes: typed_json(5, &row.get::<_, String>(5)?)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        expires_at: row.get::<_, Option<String>>(7)?.map(|s| parse_datetime(&s)),
        last_used_at: row.get::<_, Option<String>>(8)?.map(|s| parse_datetime(&s)),
    })
}

const SPACE_COLUMNS: &str =
    "id, name, slug, icon, owner_id, space_type, created_at, updated_at, deleted_at";

fn row_to_space(row: &rusqlite::Row<'_>) -> rusqlite::Result<Space> {
    Ok(Space {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        icon: row.get(3)?,
        owner_id: row.get(4)?,
        space_type: parse_enum(5, &row.get::<_, String>(5)?, SpaceType::parse, "space type")?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
        deleted_at: row.get::<_, Option<String>>(8)?.map(|s| parse_datetime(&s)),
    })
}

const PERMISSION_COLUMNS: &str =
    "id, resource_kind, resource_id, user_id, group_id, role, created_at, updated_at, deleted_at";

fn row_to_permission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Permission> {
    Ok(Permission {
        id: row.get(0)?,
        resource_kind: parse_enum(
            1,
            &row.get::<_, String>(1)?,
            ResourceKind::parse,
            "resource kind",
        )?,
        resource_id: row.get(2)?,
        user_id: row.get(3)?,
        group_id: row.get(4)?,
        role: parse_enum(5, &row.get::<_, String>(5)?, Role::parse, "role")?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
        deleted_at: row.get::<_, Option<String>>(8)?.map(|s| parse_datetime(&s)),
    })
}

const DOCUMENT_COLUMNS: &str = "id, space_id, parent_id, name, slug, position, public, content, \
     config, meta, created_by, updated_by, created_at, updated_at, deleted_at";

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        space_id: row.get(1)?,
        parent_id: row.get(2)?,
        name: row.get(3)?,
        slug: row.get(4)?,
        position: row.get(5)?,
        public: row.get(6)?,
        content: parse_json(&row.get::<_, String>(7)?),
        config: parse_json(&row.get::<_, String>(8)?),
        meta: parse_json(&row.get::<_, String>(9)?),
        created_by: row.get(10)?,
        updated_by: row.get(11)?,
        created_at: parse_datetime(&row.get::<_, String>(12)?),
        updated_at: parse_datetime(&row.get::<_, String>(13)?),
        deleted_at: row.get::<_, Option<String>>(14)?.map(|s| parse_datetime(&s)),
    })
}

const VERSION_COLUMNS: &str =
    "id, document_id, version, name, content, config, description, created_by, created_at";

fn row_to_version(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentVersion> {
    Ok(DocumentVersion {
        id: row.get(0)?,
        document_id: row.get(1)?,
        version: row.get(2)?,
        name: row.get(3)?,
        content: parse_json(&row.get::<_, String>(4)?),
        config: parse_json(&row.get::<_, String>(5)?),
        description: row.get(6)?,
        created_by: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

const DATABASE_COLUMNS: &str = "id, space_id, document_id, database_type, name, properties, \
     views, default_view_id, created_by, created_at, updated_at, deleted_at";

fn row_to_database(row: &rusqlite::Row<'_>) -> rusqlite::Result<Database> {
    Ok(Database {
        id: row.get(0)?,
        space_id: row.get(1)?,
        document_id: row.get(2)?,
        database_type: parse_enum(
            3,
            &row.get::<_, String>(3)?,
            DatabaseType::parse,
            "database type",
        )?,
        name: row.get(4)?,
        properties: typed_json(5, &row.get::<_, String>(5)?)?,
        views: typed_json(6, &row.get::<_, String>(6)?)?,
        default_view_id: row.get(7)?,
        created_by: row.get(8)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
        deleted_at: row.get::<_, Option<String>>(11)?.map(|s| parse_datetime(&s)),
    })
}

const ROW_COLUMNS: &str = "id, database_id, properties, content, show_in_sidebar, created_by, \
     created_at, updated_at, deleted_at";

fn row_to_db_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DatabaseRow> {
    Ok(DatabaseRow {
        id: row.get(0)?,
        database_id: row.get(1)?,
        properties: parse_json(&row.get::<_, String>(2)?),
        content: row.get::<_, Option<String>>(3)?.map(|s| parse_json(&s)),
        show_in_sidebar: row.get(4)?,
        created_by: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
        deleted_at: row.get::<_, Option<String>>(8)?.map(|s| parse_datetime(&s)),
    })
}

const DRAWING_COLUMNS: &str = "id, space_id, document_id, name, elements, app_state, files, \
     thumbnail, created_by, created_at, updated_at, deleted_at";

fn row_to_drawing(row: &rusqlite::Row<'_>) -> rusqlite::Result<Drawing> {
    Ok(Drawing {
        id: row.get(0)?,
        space_id: row.get(1)?,
        document_id: row.get(2)?,
        name: row.get(3)?,
        elements: parse_json(&row.get::<_, String>(4)?),
        app_state: parse_json(&row.get::<_, String>(5)?),
        files: parse_json(&row.get::<_, String>(6)?),
        thumbnail: row.get(7)?,
        created_by: row.get(8)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
        deleted_at: row.get::<_, Option<String>>(11)?.map(|s| parse_datetime(&s)),
    })
}

const COMMENT_COLUMNS: &str =
    "id, document_id, parent_id, block_id, content, resolved, created_by, created_at, updated_at";

fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        document_id: row.get(1)?,
        parent_id: row.get(2)?,
        block_id: row.get(3)?,
        content: row.get(4)?,
        resolved: row.get(5)?,
        created_by: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

const FAVORITE_COLUMNS: &str = "id, user_id, document_id, space_id, position, created_at";

fn row_to_favorite(row: &rusqlite::Row<'_>) -> rusqlite::Result<Favorite> {
    Ok(Favorite {
        id: row.get(0)?,
        user_id: row.get(1)?,
        document_id: row.get(2)?,
        space_id: row.get(3)?,
        position: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

/// Fetches a document by id inside an open transaction, deleted or not.
fn query_document(conn: &Connection, id: &str) -> Result<Option<Document>> {
    conn.query_row(
        &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
        params![id],
        row_to_document,
    )
    .optional()
    .map_err(Error::from)
}

/// Next position at the tail of a sibling group.
fn next_position(conn: &Connection, space_id: &str, parent_id: Option<&str>) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM documents
         WHERE space_id = ?1 AND parent_id IS ?2 AND deleted_at IS NULL",
        params![space_id, parent_id],
        |row| row.get(0),
    )
    .map_err(Error::from)
}

/// Writes a snapshot of the document's current (name, content, config) with
/// the next version number for that document.
fn snapshot_document(
    conn: &Connection,
    doc: &Document,
    description: Option<&str>,
    created_by: &str,
) -> Result<DocumentVersion> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) + 1 FROM document_versions WHERE document_id = ?1",
        params![doc.id],
        |row| row.get(0),
    )?;

    let version = DocumentVersion {
        id: Uuid::new_v4().to_string(),
        document_id: doc.id.clone(),
        version: next,
        name: doc.name.clone(),
        content: doc.content.clone(),
        config: doc.config.clone(),
        description: description.map(String::from),
        created_by: created_by.to_string(),
        created_at: Utc::now(),
    };

    conn.execute(
        "INSERT INTO document_versions (id, document_id, version, name, content, config, description, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            version.id,
            version.document_id,
            version.version,
            version.name,
            json_text(&version.content),
            json_text(&version.config),
            version.description,
            version.created_by,
            format_datetime(&version.created_at),
        ],
    )?;
    Ok(version)
}

/// Hard-deletes versions beyond the retention cap, newest first.
fn prune_document_versions(conn: &Connection, document_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM document_versions WHERE document_id = ?1 AND id IN (
             SELECT id FROM document_versions WHERE document_id = ?1
             ORDER BY version DESC, created_at DESC LIMIT -1 OFFSET ?2)",
        params![document_id, VERSION_RETENTION],
    )?;
    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, username, email, password_hash, global_role, active, preferences, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user.id,
                user.username,
                user.email,
                user.password_hash,
                user.global_role.as_str(),
                user.active,
                user.preferences.as_ref().map(json_text),
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![cursor, limit], row_to_user)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "UPDATE users SET username = ?1, email = ?2, password_hash = ?3, global_role = ?4,
             active = ?5, preferences = ?6, updated_at = ?7 WHERE id = ?8",
            params![
                user.username,
                user.email,
                user.password_hash,
                user.global_role.as_str(),
                user.active,
                user.preferences.as_ref().map(json_text),
                format_datetime(&Utc::now()),
                user.id,
            ],
        );
        match result {
            Ok(0) => Err(Error::NotFound),
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_user(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn count_users(&self) -> Result<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    // Group operations

    fn create_group(&self, group: &Group) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO groups (id, name, owner_id, global_role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                group.id,
                group.name,
                group.owner_id,
                group.global_role.as_str(),
                format_datetime(&group.created_at),
                format_datetime(&group.updated_at),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    fn get_group(&self, id: &str) -> Result<Option<Group>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?1"),
            params![id],
            row_to_group,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_group_by_name(&self, name: &str) -> Result<Option<Group>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE name = ?1"),
            params![name],
            row_to_group,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_groups(&self) -> Result<Vec<Group>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("SELECT {GROUP_COLUMNS} FROM groups ORDER BY name"))?;

        let rows = stmt.query_map([], row_to_group)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_group(&self, group: &Group) -> Result<()> {
        let result = self.conn().execute(
            "UPDATE groups SET name = ?1, owner_id = ?2, global_role = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                group.name,
                group.owner_id,
                group.global_role.as_str(),
                format_datetime(&Utc::now()),
                group.id,
            ],
        );
        match result {
            Ok(0) => Err(Error::NotFound),
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_group(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM groups WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn add_group_member(&self, group_id: &str, user_id: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO group_members (group_id, user_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (group_id, user_id) DO NOTHING",
            params![group_id, user_id, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }

    fn remove_group_member(&self, group_id: &str, user_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group_id, user_id],
        )?;
        Ok(rows > 0)
    }

    fn list_group_members(&self, group_id: &str) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT u.{} FROM users u
             JOIN group_members gm ON gm.user_id = u.id
             WHERE gm.group_id = ?1 ORDER BY u.username",
            USER_COLUMNS.replace(", ", ", u.")
        ))?;

        let rows = stmt.query_map(params![group_id], row_to_user)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_user_groups(&self, user_id: &str) -> Result<Vec<Group>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT g.{} FROM groups g
             JOIN group_members gm ON gm.group_id = g.id
             WHERE gm.user_id = ?1 ORDER BY g.name",
            GROUP_COLUMNS.replace(", ", ", g.")
        ))?;

        let rows = stmt.query_map(params![user_id], row_to_group)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Session operations

    fn create_session(&self, session: &Session) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id,
                session.user_id,
                format_datetime(&session.created_at),
                format_datetime(&session.expires_at),
            ],
        )?;
        Ok(())
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
            params![id],
            row_to_session,
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn purge_expired_sessions(&self) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM sessions WHERE datetime(expires_at) <= datetime(?1)",
            params![format_datetime(&Utc::now())],
        )?;
        Ok(rows)
    }

    // API key operations

    fn create_api_key(&self, key: &ApiKey) -> Result<()> {
        self.conn().execute(
            "INSERT INTO api_keys (id, user_id, name, key_hash, prefix, scopes, created_at, expires_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                key.id,
                key.user_id,
                key.name,
                key.key_hash,
                key.prefix,
                serde_json::to_string(&key.scopes).unwrap_or_else(|_| "[]".to_string()),
                format_datetime(&key.created_at),
                key.expires_at.as_ref().map(format_datetime),
                key.last_used_at.as_ref().map(format_datetime),
            ],
        )?;
        Ok(())
    }

    fn get_api_key(&self, id: &str) -> Result<Option<ApiKey>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE id = ?1"),
            params![id],
            row_to_api_key,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE key_hash = ?1"),
            params![key_hash],
            row_to_api_key,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_user_api_keys(&self, user_id: &str) -> Result<Vec<ApiKey>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE user_id = ?1 ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map(params![user_id], row_to_api_key)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_api_key(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM api_keys WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_api_key_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE api_keys SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Space operations

    fn create_space(&self, space: &Space) -> Result<()> {
        self.conn().execute(
            "INSERT INTO spaces (id, name, slug, icon, owner_id, space_type, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                space.id,
                space.name,
                space.slug,
                space.icon,
                space.owner_id,
                space.space_type.as_str(),
                format_datetime(&space.created_at),
                format_datetime(&space.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_space(&self, id: &str) -> Result<Option<Space>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE id = ?1 AND deleted_at IS NULL"),
            params![id],
            row_to_space,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_space_any(&self, id: &str) -> Result<Option<Space>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE id = ?1"),
            params![id],
            row_to_space,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_space_by_slug(&self, slug: &str) -> Result<Option<Space>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE slug = ?1 AND deleted_at IS NULL"),
            params![slug],
            row_to_space,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_spaces_for_user(&self, user_id: &str) -> Result<Vec<Space>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SPACE_COLUMNS} FROM spaces s WHERE s.deleted_at IS NULL AND (
                 s.owner_id = ?1
                 OR s.space_type = 'public'
                 OR EXISTS (
                     SELECT 1 FROM permissions p
                     WHERE p.resource_kind = 'space' AND p.resource_id = s.id
                       AND p.deleted_at IS NULL AND p.role != 'denied'
                       AND (p.user_id = ?1 OR p.group_id IN (
                           SELECT group_id FROM group_members WHERE user_id = ?1))))
             ORDER BY s.name"
        ))?;

        let rows = stmt.query_map(params![user_id], row_to_space)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_space(&self, space: &Space) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE spaces SET name = ?1, slug = ?2, icon = ?3, owner_id = ?4, space_type = ?5,
             updated_at = ?6 WHERE id = ?7 AND deleted_at IS NULL",
            params![
                space.name,
                space.slug,
                space.icon,
                space.owner_id,
                space.space_type.as_str(),
                format_datetime(&Utc::now()),
                space.id,
            ],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_space(&self, id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE spaces SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(rows > 0)
    }

    // Permission operations

    fn get_user_permission(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        user_id: &str,
    ) -> Result<Option<Permission>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {PERMISSION_COLUMNS} FROM permissions
                 WHERE resource_kind = ?1 AND resource_id = ?2 AND user_id = ?3
                   AND deleted_at IS NULL"
            ),
            params![kind.as_str(), resource_id, user_id],
            row_to_permission,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_group_roles_for_user(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        user_id: &str,
    ) -> Result<Vec<Role>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT p.role FROM permissions p
             JOIN group_members gm ON gm.group_id = p.group_id
             WHERE p.resource_kind = ?1 AND p.resource_id = ?2 AND gm.user_id = ?3
               AND p.deleted_at IS NULL",
        )?;

        let rows = stmt.query_map(params![kind.as_str(), resource_id, user_id], |row| {
            let role: String = row.get(0)?;
            parse_enum(0, &role, Role::parse, "role")
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_resource_permissions(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> Result<Vec<Permission>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions
             WHERE resource_kind = ?1 AND resource_id = ?2 AND deleted_at IS NULL
             ORDER BY created_at"
        ))?;

        let rows = stmt.query_map(params![kind.as_str(), resource_id], row_to_permission)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn upsert_permission(&self, perm: &Permission) -> Result<Permission> {
        let (subject_column, subject_id) = match (&perm.user_id, &perm.group_id) {
            (Some(user_id), None) => ("user_id", user_id.as_str()),
            (None, Some(group_id)) => ("group_id", group_id.as_str()),
            _ => {
                return Err(Error::BadRequest(
                    "exactly one of user_id or group_id must be set".to_string(),
                ));
            }
        };

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = format_datetime(&Utc::now());

        // Prefer the live row; otherwise revive the most recently revoked one.
        let existing: Option<String> = tx
            .query_row(
                &format!(
                    "SELECT id FROM permissions
                     WHERE resource_kind = ?1 AND resource_id = ?2 AND {subject_column} = ?3
                     ORDER BY deleted_at IS NOT NULL, updated_at DESC LIMIT 1"
                ),
                params![perm.resource_kind.as_str(), perm.resource_id, subject_id],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE permissions SET role = ?1, deleted_at = NULL, updated_at = ?2 WHERE id = ?3",
                    params![perm.role.as_str(), now, id],
                )?;
                id
            }
            None => {
                let insert = tx.execute(
                    "INSERT INTO permissions (id, resource_kind, resource_id, user_id, group_id, role, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    params![
                        perm.id,
                        perm.resource_kind.as_str(),
                        perm.resource_id,
                        perm.user_id,
                        perm.group_id,
                        perm.role.as_str(),
                        now,
                    ],
                );
                match insert {
                    Ok(_) => perm.id.clone(),
                    Err(e) if is_unique_violation(&e) => {
                        // A concurrent writer inserted the row first; take it over.
                        let id: String = tx.query_row(
                            &format!(
                                "SELECT id FROM permissions
                                 WHERE resource_kind = ?1 AND resource_id = ?2 AND {subject_column} = ?3
                                   AND deleted_at IS NULL"
                            ),
                            params![perm.resource_kind.as_str(), perm.resource_id, subject_id],
                            |row| row.get(0),
                        )?;
                        tx.execute(
                            "UPDATE permissions SET role = ?1, updated_at = ?2 WHERE id = ?3",
                            params![perm.role.as_str(), now, id],
                        )?;
                        id
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let saved = tx
            .query_row(
                &format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = ?1"),
                params![id],
                row_to_permission,
            )
            .optional()?
            .ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok(saved)
    }

    fn delete_permission(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        user_id: Option<&str>,
        group_id: Option<&str>,
    ) -> Result<bool> {
        let (subject_column, subject_id) = match (user_id, group_id) {
            (Some(user_id), None) => ("user_id", user_id),
            (None, Some(group_id)) => ("group_id", group_id),
            _ => {
                return Err(Error::BadRequest(
                    "exactly one of user_id or group_id must be set".to_string(),
                ));
            }
        };

        let rows = self.conn().execute(
            &format!(
                "UPDATE permissions SET deleted_at = ?1, updated_at = ?1
                 WHERE resource_kind = ?2 AND resource_id = ?3 AND {subject_column} = ?4
                   AND deleted_at IS NULL"
            ),
            params![format_datetime(&Utc::now()), kind.as_str(), resource_id, subject_id],
        )?;
        Ok(rows > 0)
    }

    // Document operations

    fn create_document(&self, doc: &Document) -> Result<Document> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let position = next_position(&tx, &doc.space_id, doc.parent_id.as_deref())?;
        tx.execute(
            "INSERT INTO documents (id, space_id, parent_id, name, slug, position, public, content, config, meta, created_by, updated_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                doc.id,
                doc.space_id,
                doc.parent_id,
                doc.name,
                doc.slug,
                position,
                doc.public,
                json_text(&doc.content),
                json_text(&doc.config),
                json_text(&doc.meta),
                doc.created_by,
                doc.updated_by,
                format_datetime(&doc.created_at),
                format_datetime(&doc.updated_at),
            ],
        )?;
        tx.commit()?;

        Ok(Document {
            position,
            ..doc.clone()
        })
    }

    fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1 AND deleted_at IS NULL"
            ),
            params![id],
            row_to_document,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_document_any(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.conn();
        query_document(&conn, id)
    }

    fn get_document_by_slug(&self, space_id: &str, slug: &str) -> Result<Option<Document>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents
                 WHERE space_id = ?1 AND slug = ?2 AND deleted_at IS NULL"
            ),
            params![space_id, slug],
            row_to_document,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_child_documents(
        &self,
        space_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<Document>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE space_id = ?1 AND parent_id IS ?2 AND deleted_at IS NULL
             ORDER BY position ASC, created_at ASC"
        ))?;

        let rows = stmt.query_map(params![space_id, parent_id], row_to_document)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_space_documents(&self, space_id: &str) -> Result<Vec<Document>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE space_id = ?1 AND deleted_at IS NULL
             ORDER BY position ASC, created_at ASC"
        ))?;

        let rows = stmt.query_map(params![space_id], row_to_document)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_document(&self, doc: &Document) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE documents SET name = ?1, slug = ?2, public = ?3, meta = ?4, updated_by = ?5,
             updated_at = ?6 WHERE id = ?7 AND deleted_at IS NULL",
            params![
                doc.name,
                doc.slug,
                doc.public,
                json_text(&doc.meta),
                doc.updated_by,
                format_datetime(&Utc::now()),
                doc.id,
            ],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn update_document_content(
        &self,
        id: &str,
        update: &DocumentContentUpdate,
        updated_by: &str,
    ) -> Result<Document> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let current = query_document(&tx, id)?
            .filter(|d| d.deleted_at.is_none())
            .ok_or(Error::NotFound)?;

        // Snapshot the pre-update state in the same transaction. A snapshot
        // failure must not abort the caller's write.
        if let Err(e) = snapshot_document(&tx, &current, Some("Auto-save"), updated_by) {
            tracing::warn!(document_id = %id, "auto-save snapshot failed: {e}");
        }

        tx.execute(
            "UPDATE documents SET
                 name = COALESCE(?1, name),
                 content = COALESCE(?2, content),
                 config = COALESCE(?3, config),
                 meta = COALESCE(?4, meta),
                 updated_by = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                update.name,
                update.content.map(json_text),
                update.config.map(json_text),
                update.meta.map(json_text),
                updated_by,
                format_datetime(&Utc::now()),
                id,
            ],
        )?;

        prune_document_versions(&tx, id)?;
        let updated = query_document(&tx, id)?.ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok(updated)
    }

    fn move_document(&self, id: &str, new_parent_id: Option<&str>) -> Result<Document> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let doc = query_document(&tx, id)?
            .filter(|d| d.deleted_at.is_none())
            .ok_or(Error::NotFound)?;

        if let Some(parent_id) = new_parent_id {
            if parent_id == id {
                return Err(Error::BadRequest(
                    "a document cannot be its own parent".to_string(),
                ));
            }
            let parent = query_document(&tx, parent_id)?
                .filter(|d| d.deleted_at.is_none())
                .ok_or(Error::NotFound)?;
            if parent.space_id != doc.space_id {
                return Err(Error::BadRequest(
                    "target parent must be in the same space".to_string(),
                ));
            }

            // Walk up from the target parent; reaching the moved document
            // means the target is one of its descendants.
            let mut cursor = parent.parent_id.clone();
            let mut depth = 0;
            while let Some(ancestor_id) = cursor {
                if ancestor_id == id {
                    return Err(Error::BadRequest(
                        "cannot move a document under its own descendant".to_string(),
                    ));
                }
                depth += 1;
                if depth > 256 {
                    return Err(Error::BadRequest("document tree too deep".to_string()));
                }
                cursor = tx
                    .query_row(
                        "SELECT parent_id FROM documents WHERE id = ?1",
                        params![ancestor_id],
                        |row| row.get::<_, Option<String>>(0),
                    )
                    .optional()?
                    .flatten();
            }
        }

        let position = next_position(&tx, &doc.space_id, new_parent_id)?;
        tx.execute(
            "UPDATE documents SET parent_id = ?1, position = ?2, updated_at = ?3 WHERE id = ?4",
            params![new_parent_id, position, format_datetime(&Utc::now()), id],
        )?;

        let updated = query_document(&tx, id)?.ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok(updated)
    }

    fn reorder_documents(&self, space_id: &str, orders: &[(String, i64)]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = format_datetime(&Utc::now());

        for (id, position) in orders {
            tx.execute(
                "UPDATE documents SET position = ?1, updated_at = ?2
                 WHERE id = ?3 AND space_id = ?4 AND deleted_at IS NULL",
                params![position, now, id, space_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_document(&self, id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        query_document(&tx, id)?
            .filter(|d| d.deleted_at.is_none())
            .ok_or(Error::NotFound)?;

        let children: i64 = tx.query_row(
            "SELECT COUNT(*) FROM documents WHERE parent_id = ?1 AND deleted_at IS NULL",
            params![id],
            |row| row.get(0),
        )?;
        if children > 0 {
            return Err(Error::HasChildren);
        }

        tx.execute(
            "UPDATE documents SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn restore_document(&self, id: &str) -> Result<Document> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let doc = query_document(&tx, id)?.ok_or(Error::NotFound)?;
        if doc.deleted_at.is_none() {
            return Err(Error::Conflict("document is not deleted".to_string()));
        }

        // A missing or soft-deleted parent reparents the document to root.
        let mut parent_id = doc.parent_id.clone();
        if let Some(pid) = &parent_id {
            let parent_live = query_document(&tx, pid)?.filter(|p| p.deleted_at.is_none());
            if parent_live.is_none() {
                parent_id = None;
            }
        }

        let position = next_position(&tx, &doc.space_id, parent_id.as_deref())?;
        tx.execute(
            "UPDATE documents SET deleted_at = NULL, parent_id = ?1, position = ?2, updated_at = ?3
             WHERE id = ?4",
            params![parent_id, position, format_datetime(&Utc::now()), id],
        )?;

        let restored = query_document(&tx, id)?.ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok(restored)
    }

    fn list_deleted_documents(&self, space_id: &str) -> Result<Vec<Document>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE space_id = ?1 AND deleted_at IS NOT NULL
             ORDER BY deleted_at DESC"
        ))?;

        let rows = stmt.query_map(params![space_id], row_to_document)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn search_documents(
        &self,
        query: &str,
        space_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Document>> {
        let conn = self.conn();
        let needle = query.to_ascii_lowercase();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE deleted_at IS NULL
               AND (?1 IS NULL OR space_id = ?1)
               AND (instr(lower(name), ?2) > 0 OR instr(lower(CAST(content AS TEXT)), ?2) > 0)
             ORDER BY updated_at DESC LIMIT ?3"
        ))?;

        let rows = stmt.query_map(params![space_id, needle, limit], row_to_document)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Document version operations

    fn create_document_version(
        &self,
        document_id: &str,
        description: Option<&str>,
        created_by: &str,
    ) -> Result<DocumentVersion> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let doc = query_document(&tx, document_id)?
            .filter(|d| d.deleted_at.is_none())
            .ok_or(Error::NotFound)?;

        let version = snapshot_document(&tx, &doc, description, created_by)?;
        prune_document_versions(&tx, document_id)?;
        tx.commit()?;
        Ok(version)
    }

    fn get_document_version(
        &self,
        document_id: &str,
        version: i64,
    ) -> Result<Option<DocumentVersion>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {VERSION_COLUMNS} FROM document_versions
                 WHERE document_id = ?1 AND version = ?2"
            ),
            params![document_id, version],
            row_to_version,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_document_versions(
        &self,
        document_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DocumentVersion>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM document_versions
             WHERE document_id = ?1
             ORDER BY version DESC, created_at DESC LIMIT ?2 OFFSET ?3"
        ))?;

        let rows = stmt.query_map(params![document_id, limit, offset], row_to_version)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_document_versions(&self, document_id: &str) -> Result<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM document_versions WHERE document_id = ?1",
            params![document_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn restore_document_version(
        &self,
        document_id: &str,
        version: i64,
        restored_by: &str,
    ) -> Result<Document> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let doc = query_document(&tx, document_id)?
            .filter(|d| d.deleted_at.is_none())
            .ok_or(Error::NotFound)?;

        let target = tx
            .query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM document_versions
                     WHERE document_id = ?1 AND version = ?2"
                ),
                params![document_id, version],
                row_to_version,
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        let label = format!("Before restore to version {version}");
        snapshot_document(&tx, &doc, Some(&label), restored_by)?;

        tx.execute(
            "UPDATE documents SET name = ?1, content = ?2, config = ?3, updated_by = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                target.name,
                json_text(&target.content),
                json_text(&target.config),
                restored_by,
                format_datetime(&Utc::now()),
                document_id,
            ],
        )?;

        prune_document_versions(&tx, document_id)?;
        let updated = query_document(&tx, document_id)?.ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok(updated)
    }

    // Database operations

    fn create_database(&self, db: &Database, seed_rows: &[DatabaseRow]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO databases (id, space_id, document_id, database_type, name, properties, views, default_view_id, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                db.id,
                db.space_id,
                db.document_id,
                db.database_type.as_str(),
                db.name,
                serde_json::to_string(&db.properties).unwrap_or_else(|_| "[]".to_string()),
                serde_json::to_string(&db.views).unwrap_or_else(|_| "[]".to_string()),
                db.default_view_id,
                db.created_by,
                format_datetime(&db.created_at),
                format_datetime(&db.updated_at),
            ],
        )?;

        for row in seed_rows {
            tx.execute(
                "INSERT INTO database_rows (id, database_id, properties, content, show_in_sidebar, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.id,
                    row.database_id,
                    json_text(&row.properties),
                    row.content.as_ref().map(json_text),
                    row.show_in_sidebar,
                    row.created_by,
                    format_datetime(&row.created_at),
                    format_datetime(&row.updated_at),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_database(&self, id: &str) -> Result<Option<Database>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {DATABASE_COLUMNS} FROM databases WHERE id = ?1 AND deleted_at IS NULL"
            ),
            params![id],
            row_to_database,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_database_by_document(&self, document_id: &str) -> Result<Option<Database>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {DATABASE_COLUMNS} FROM databases
                 WHERE document_id = ?1 AND deleted_at IS NULL"
            ),
            params![document_id],
            row_to_database,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_space_databases(&self, space_id: &str) -> Result<Vec<Database>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DATABASE_COLUMNS} FROM databases
             WHERE space_id = ?1 AND deleted_at IS NULL ORDER BY created_at"
        ))?;

        let rows = stmt.query_map(params![space_id], row_to_database)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_database(&self, db: &Database) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE databases SET name = ?1, properties = ?2, views = ?3, default_view_id = ?4,
             document_id = ?5, updated_at = ?6 WHERE id = ?7 AND deleted_at IS NULL",
            params![
                db.name,
                serde_json::to_string(&db.properties).unwrap_or_else(|_| "[]".to_string()),
                serde_json::to_string(&db.views).unwrap_or_else(|_| "[]".to_string()),
                db.default_view_id,
                db.document_id,
                format_datetime(&Utc::now()),
                db.id,
            ],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_database(&self, id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE databases SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(rows > 0)
    }

    // Database row operations

    fn create_row(&self, row: &DatabaseRow) -> Result<()> {
        self.conn().execute(
            "INSERT INTO database_rows (id, database_id, properties, content, show_in_sidebar, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.id,
                row.database_id,
                json_text(&row.properties),
                row.content.as_ref().map(json_text),
                row.show_in_sidebar,
                row.created_by,
                format_datetime(&row.created_at),
                format_datetime(&row.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_row(&self, id: &str) -> Result<Option<DatabaseRow>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {ROW_COLUMNS} FROM database_rows WHERE id = ?1 AND deleted_at IS NULL"
            ),
            params![id],
            row_to_db_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_rows(
        &self,
        database_id: &str,
        filter: Option<&FilterConfig>,
        sort: &[SortRule],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DatabaseRow>> {
        let conn = self.conn();
        let mut sql = format!(
            "SELECT {ROW_COLUMNS} FROM database_rows WHERE database_id = ? AND deleted_at IS NULL"
        );
        let mut sql_params: Vec<SqlValue> = vec![SqlValue::Text(database_id.to_string())];

        if let Some(compiled) = filter.and_then(compile_filter) {
            sql.push_str(" AND ");
            sql.push_str(&compiled.clause);
            sql_params.extend(compiled.params);
        }

        let (order, order_params) = compile_sort(sort);
        sql.push_str(&order);
        sql_params.extend(order_params);

        sql.push_str(" LIMIT ? OFFSET ?");
        sql_params.push(SqlValue::Integer(limit));
        sql_params.push(SqlValue::Integer(offset));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(sql_params.iter()), row_to_db_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_rows(&self, database_id: &str, filter: Option<&FilterConfig>) -> Result<i64> {
        let conn = self.conn();
        let mut sql =
            "SELECT COUNT(*) FROM database_rows WHERE database_id = ? AND deleted_at IS NULL"
                .to_string();
        let mut sql_params: Vec<SqlValue> = vec![SqlValue::Text(database_id.to_string())];

        if let Some(compiled) = filter.and_then(compile_filter) {
            sql.push_str(" AND ");
            sql.push_str(&compiled.clause);
            sql_params.extend(compiled.params);
        }

        let count: i64 = conn.query_row(&sql, params_from_iter(sql_params.iter()), |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    fn update_row(&self, row: &DatabaseRow) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE database_rows SET properties = ?1, content = ?2, show_in_sidebar = ?3, updated_at = ?4
             WHERE id = ?5 AND deleted_at IS NULL",
            params![
                json_text(&row.properties),
                row.content.as_ref().map(json_text),
                row.show_in_sidebar,
                format_datetime(&Utc::now()),
                row.id,
            ],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_row(&self, id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE database_rows SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(rows > 0)
    }

    fn delete_rows(&self, database_id: &str, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE database_rows SET deleted_at = ?, updated_at = ?
             WHERE database_id = ? AND deleted_at IS NULL AND id IN ({placeholders})"
        );

        let now = format_datetime(&Utc::now());
        let mut sql_params: Vec<SqlValue> = vec![
            SqlValue::Text(now.clone()),
            SqlValue::Text(now),
            SqlValue::Text(database_id.to_string()),
        ];
        sql_params.extend(ids.iter().map(|id| SqlValue::Text(id.clone())));

        let rows = self
            .conn()
            .execute(&sql, params_from_iter(sql_params.iter()))?;
        Ok(rows)
    }

    // Drawing operations

    fn create_drawing(&self, drawing: &Drawing) -> Result<()> {
        self.conn().execute(
            "INSERT INTO drawings (id, space_id, document_id, name, elements, app_state, files, thumbnail, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                drawing.id,
                drawing.space_id,
                drawing.document_id,
                drawing.name,
                json_text(&drawing.elements),
                json_text(&drawing.app_state),
                json_text(&drawing.files),
                drawing.thumbnail,
                drawing.created_by,
                format_datetime(&drawing.created_at),
                format_datetime(&drawing.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_drawing(&self, id: &str) -> Result<Option<Drawing>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {DRAWING_COLUMNS} FROM drawings WHERE id = ?1 AND deleted_at IS NULL"),
            params![id],
            row_to_drawing,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_space_drawings(&self, space_id: &str) -> Result<Vec<Drawing>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DRAWING_COLUMNS} FROM drawings
             WHERE space_id = ?1 AND deleted_at IS NULL ORDER BY created_at"
        ))?;

        let rows = stmt.query_map(params![space_id], row_to_drawing)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_drawing(&self, drawing: &Drawing) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE drawings SET name = ?1, elements = ?2, app_state = ?3, files = ?4,
             thumbnail = ?5, document_id = ?6, updated_at = ?7 WHERE id = ?8 AND deleted_at IS NULL",
            params![
                drawing.name,
                json_text(&drawing.elements),
                json_text(&drawing.app_state),
                json_text(&drawing.files),
                drawing.thumbnail,
                drawing.document_id,
                format_datetime(&Utc::now()),
                drawing.id,
            ],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_drawing(&self, id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE drawings SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(rows > 0)
    }

    // Comment operations

    fn create_comment(&self, comment: &Comment) -> Result<()> {
        self.conn().execute(
            "INSERT INTO comments (id, document_id, parent_id, block_id, content, resolved, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                comment.id,
                comment.document_id,
                comment.parent_id,
                comment.block_id,
                comment.content,
                comment.resolved,
                comment.created_by,
                format_datetime(&comment.created_at),
                format_datetime(&comment.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
            params![id],
            row_to_comment,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_document_comments(&self, document_id: &str) -> Result<Vec<Comment>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments
             WHERE document_id = ?1 ORDER BY created_at ASC"
        ))?;

        let rows = stmt.query_map(params![document_id], row_to_comment)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_comment(&self, comment: &Comment) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE comments SET content = ?1, resolved = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                comment.content,
                comment.resolved,
                format_datetime(&Utc::now()),
                comment.id,
            ],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_comment(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Favorite operations

    fn create_favorite(
        &self,
        user_id: &str,
        document_id: &str,
        space_id: &str,
    ) -> Result<Favorite> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM favorites WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        let favorite = Favorite {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            document_id: document_id.to_string(),
            space_id: space_id.to_string(),
            position,
            created_at: Utc::now(),
        };

        let insert = tx.execute(
            "INSERT INTO favorites (id, user_id, document_id, space_id, position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                favorite.id,
                favorite.user_id,
                favorite.document_id,
                favorite.space_id,
                favorite.position,
                format_datetime(&favorite.created_at),
            ],
        );
        match insert {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(Error::AlreadyExists),
            Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(favorite)
    }

    fn get_favorite(&self, id: &str) -> Result<Option<Favorite>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {FAVORITE_COLUMNS} FROM favorites WHERE id = ?1"),
            params![id],
            row_to_favorite,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_user_favorites(&self, user_id: &str) -> Result<Vec<Favorite>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FAVORITE_COLUMNS} FROM favorites
             WHERE user_id = ?1 ORDER BY position ASC, created_at ASC"
        ))?;

        let rows = stmt.query_map(params![user_id], row_to_favorite)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_favorite_position(&self, id: &str, position: i64) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE favorites SET position = ?1 WHERE id = ?2",
            params![position, id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_favorite(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM favorites WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
