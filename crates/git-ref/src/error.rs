use std::path::PathBuf;

use git_hash::ObjectId;

/// Error types for reference operations.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    #[error("invalid ref name: {0}")]
    InvalidName(String),

    #[error("ref not found: {0}")]
    NotFound(String),

    #[error("ref already exists: {0}")]
    AlreadyExists(String),

    #[error("symbolic ref loop detected: {0}")]
    SymrefLoop(String),

    #[error(
        "path collision: '{name}' cannot coexist with '{conflict}' (one is a path-prefix of the other)"
    )]
    PathCollision { name: String, conflict: String },

    #[error("corrupt packed-refs file: {0}")]
    CorruptPackedRefs(String),

    #[error("corrupt loose ref '{name}': {reason}")]
    CorruptLooseRef { name: String, reason: String },

    #[error("object database failure while peeling {oid}: {reason}")]
    ObjectDbFailure { oid: ObjectId, reason: String },

    #[error("lock file error: {0}")]
    Lock(#[from] git_utils::LockError),

    #[error("{0}")]
    Util(#[from] git_utils::UtilError),

    #[error("I/O error on {path}: {source}")]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] git_hash::HashError),
}
