use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use crate::auth::MIN_PASSWORD_LENGTH;
use crate::server::response::ApiError;
use crate::store::Store;
use crate::types::{Database, DatabaseType, GlobalRole, Role, SpaceType};

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 32;
const MAX_EMAIL_LEN: usize = 255;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_DISPLAY_NAME_LEN: usize = 200;
const MAX_SLUG_ATTEMPTS: u32 = 100;

pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.len() < MIN_USERNAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Username cannot exceed {MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::bad_request(
            "Username can only contain alphanumeric characters, hyphens, and underscores",
        ));
    }
    if username.starts_with('-') || username.starts_with('_') {
        return Err(ApiError::bad_request(
            "Username cannot start with a hyphen or underscore",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.len() > MAX_EMAIL_LEN {
        return Err(ApiError::bad_request(format!(
            "Email cannot exceed {MAX_EMAIL_LEN} characters"
        )));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ApiError::bad_request("Invalid email address"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(' ') {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password cannot exceed {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Display names (spaces, groups, documents, databases, drawings) are free
/// text, just bounded and non-blank.
pub fn validate_display_name(name: &str, entity: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request(format!(
            "{entity} name cannot be empty"
        )));
    }
    if name.len() > MAX_DISPLAY_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "{entity} name cannot exceed {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    Ok(())
}

pub fn parse_role(s: &str) -> Result<Role, ApiError> {
    Role::parse(s).ok_or_else(|| ApiError::bad_request(format!("Invalid role: {s}")))
}

pub fn parse_global_role(s: &str) -> Result<GlobalRole, ApiError> {
    GlobalRole::parse(s).ok_or_else(|| ApiError::bad_request(format!("Invalid global role: {s}")))
}

pub fn parse_space_type(s: &str) -> Result<SpaceType, ApiError> {
    SpaceType::parse(s).ok_or_else(|| ApiError::bad_request(format!("Invalid space type: {s}")))
}

pub fn parse_database_type(s: &str) -> Result<DatabaseType, ApiError> {
    DatabaseType::parse(s)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid database type: {s}")))
}

/// Lowercases, maps runs of non-alphanumeric characters to single hyphens,
/// and trims. Names that slug to nothing become "untitled".
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_hyphen = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("untitled");
    }
    slug
}

/// Appends `-2`, `-3`, ... until the slug is free among live spaces.
pub fn unique_space_slug(store: &dyn Store, name: &str) -> crate::error::Result<String> {
    let base = slugify(name);
    let mut slug = base.clone();
    for n in 2..MAX_SLUG_ATTEMPTS {
        if store.get_space_by_slug(&slug)?.is_none() {
            return Ok(slug);
        }
        slug = format!("{base}-{n}");
    }
    Err(crate::error::Error::Conflict(format!(
        "could not allocate a unique slug for \"{base}\""
    )))
}

/// Same suffix scheme, scoped to one space's live documents.
pub fn unique_document_slug(
    store: &dyn Store,
    space_id: &str,
    name: &str,
) -> crate::error::Result<String> {
    let base = slugify(name);
    let mut slug = base.clone();
    for n in 2..MAX_SLUG_ATTEMPTS {
        if store.get_document_by_slug(space_id, &slug)?.is_none() {
            return Ok(slug);
        }
        slug = format!("{base}-{n}");
    }
    Err(crate::error::Error::Conflict(format!(
        "could not allocate a unique slug for \"{base}\""
    )))
}

fn is_numeric_string(s: &str) -> bool {
    !s.trim().is_empty() && s.trim().parse::<f64>().is_ok()
}

fn is_date_string(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Checks typed cells against the database schema. Cells for unknown
/// properties and free-form property types pass through untouched; null
/// always passes (it clears the cell).
pub fn validate_row_properties(db: &Database, properties: &JsonValue) -> Result<(), ApiError> {
    let Some(map) = properties.as_object() else {
        return Err(ApiError::bad_request("Row properties must be an object"));
    };
    for (key, value) in map {
        let Some(prop) = db.properties.iter().find(|p| p.id == *key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let ok = match prop.property_type.as_str() {
            "number" => value.is_number() || value.as_str().is_some_and(is_numeric_string),
            "checkbox" => value.is_boolean(),
            "date" => value.as_str().is_some_and(is_date_string),
            "select" => value.is_string(),
            "multi_select" => value
                .as_array()
                .is_some_and(|items| items.iter().all(JsonValue::is_string)),
            _ => true,
        };
        if !ok {
            return Err(ApiError::bad_request(format!(
                "Invalid value for {} property \"{}\"",
                prop.property_type, prop.name
            )));
        }
    }
    Ok(())
}
