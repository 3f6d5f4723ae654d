use crate::domain::PhotoStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("unsupported file type for {name}: .{extension}")]
    UnsupportedType { name: String, extension: String },

    #[error("{name} is too large: {size} bytes (limit {max})")]
    TooLarge { name: String, size: u64, max: u64 },

    #[error("cannot decode {name}: {detail}")]
    CorruptImage { name: String, detail: String },

    #[error("storage failure at {path}: {detail}")]
    Storage { path: String, detail: String },

    #[error("processing budget exceeded for {name}")]
    ProcessingTimeout { name: String },

    #[error("session not found: {0}")]
    SessionNotFound(i64),

    #[error("photo not found: {0}")]
    PhotoNotFound(i64),

    #[error("session {0} is not accepting uploads")]
    SessionNotActive(i64),

    #[error("session {0} still has photos, pass cascade to delete them too")]
    SessionHasPhotos(i64),

    #[error("illegal status transition: {from} -> {to}")]
    InvalidTransition { from: PhotoStatus, to: PhotoStatus },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("access denied ({0})")]
    AccessDenied(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
