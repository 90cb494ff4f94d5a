use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("invalid key format")]
    InvalidKeyFormat,

    #[error("key expired")]
    KeyExpired,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("document has child documents")]
    HasChildren,

    #[error("a database must keep at least one view")]
    LastView,

    #[error("cannot remove the space owner")]
    OwnerProtected,

    #[error("cannot change the space owner's role")]
    OwnerRoleProtected,
}

pub type Result<T> = std::result::Result<T, Error>;
