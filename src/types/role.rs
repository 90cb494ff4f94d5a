use std::fmt;

use serde::{Deserialize, Serialize};

/// Role is the per-resource access level carried by a permission row.
///
/// The ordering is total: `denied < viewer < editor < admin < owner`.
/// `denied` never satisfies a requirement; it exists so an explicit grant can
/// override anything a principal would otherwise inherit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Denied,
    Viewer,
    Editor,
    Admin,
    Owner,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "denied" => Some(Role::Denied),
            "viewer" => Some(Role::Viewer),
            "editor" => Some(Role::Editor),
            "admin" => Some(Role::Admin),
            "owner" => Some(Role::Owner),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Denied => "denied",
            Role::Viewer => "viewer",
            Role::Editor => "editor",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Returns true if this role grants at least the required level.
    /// `denied` satisfies nothing, including a requirement of `denied`.
    #[must_use]
    pub fn satisfies(self, required: Role) -> bool {
        self != Role::Denied && self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account-wide role. Global admins bypass per-resource permission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalRole {
    Admin,
    User,
    Guest,
}

impl GlobalRole {
    pub fn parse(s: &str) -> Option<GlobalRole> {
        match s {
            "admin" => Some(GlobalRole::Admin),
            "user" => Some(GlobalRole::User),
            "guest" => Some(GlobalRole::Guest),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            GlobalRole::Admin => "admin",
            GlobalRole::User => "user",
            GlobalRole::Guest => "guest",
        }
    }
}

impl fmt::Display for GlobalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four resource kinds a permission row can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Space,
    Document,
    Database,
    Drawing,
}

impl ResourceKind {
    pub fn parse(s: &str) -> Option<ResourceKind> {
        match s {
            "space" => Some(ResourceKind::Space),
            "document" => Some(ResourceKind::Document),
            "database" => Some(ResourceKind::Database),
            "drawing" => Some(ResourceKind::Drawing),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Space => "space",
            ResourceKind::Document => "document",
            ResourceKind::Database => "database",
            ResourceKind::Drawing => "drawing",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Space visibility type. Public spaces grant implicit viewer access to every
/// principal, including unauthenticated ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceType {
    Personal,
    Private,
    Restricted,
    Public,
}

impl SpaceType {
    pub fn parse(s: &str) -> Option<SpaceType> {
        match s {
            "personal" => Some(SpaceType::Personal),
            "private" => Some(SpaceType::Private),
            "restricted" => Some(SpaceType::Restricted),
            "public" => Some(SpaceType::Public),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SpaceType::Personal => "personal",
            SpaceType::Private => "private",
            SpaceType::Restricted => "restricted",
            SpaceType::Public => "public",
        }
    }
}

impl fmt::Display for SpaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database flavor. Spreadsheets open as a table of rows; document databases
/// treat each row as a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Spreadsheet,
    Document,
}

impl DatabaseType {
    pub fn parse(s: &str) -> Option<DatabaseType> {
        match s {
            "spreadsheet" => Some(DatabaseType::Spreadsheet),
            "document" => Some(DatabaseType::Document),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            DatabaseType::Spreadsheet => "spreadsheet",
            DatabaseType::Document => "document",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
