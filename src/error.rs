use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("cannot delete resource: {0}")]
    DeleteResource(String),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("manifest {path}: {reason}")]
    Manifest { path: String, reason: String },

    #[error("secret {path}/{key}: {reason}")]
    Secret {
        path: String,
        key: String,
        reason: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("invalid token format")]
    InvalidTokenFormat,

    #[error("token expired")]
    TokenExpired,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl Error {
    pub fn manifest(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Manifest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn secret(path: impl Into<String>, key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Secret {
            path: path.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
