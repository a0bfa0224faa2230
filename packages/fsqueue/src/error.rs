//! Error taxonomy for queue operations.

use std::io;
use std::path::{Path, PathBuf};

use queue_core::{JobId, JobState, NameError, OwnerId};

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Missing queue root or missing property.
    #[error("not found: {}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("permission denied: {}", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A transition found its destination name already taken.
    #[error("job {id} already exists in {state}")]
    StateConflict { id: JobId, state: JobState },

    /// The job directory was no longer where its handle said it was.
    #[error("job {id} is no longer at {}", path.display())]
    Vanished { id: JobId, path: PathBuf },

    #[error("liveness of owner {owner} is indeterminate: {source}")]
    IndeterminateLiveness {
        owner: OwnerId,
        #[source]
        source: io::Error,
    },

    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    #[error("invalid queue config: {0}")]
    InvalidConfig(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl QueueError {
    /// Classify an I/O error on `path` by its kind.
    pub(crate) fn from_io(path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => QueueError::NotFound { path, source },
            io::ErrorKind::PermissionDenied => QueueError::PermissionDenied { path, source },
            _ => QueueError::Io { path, source },
        }
    }

    /// True for errors that mean "this thing does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::NotFound { .. })
    }
}
