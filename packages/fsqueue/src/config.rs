//! Queue configuration.

use std::path::PathBuf;

use queue_core::OwnerId;

use crate::error::{QueueError, Result};

const DEFAULT_ROOT: &str = "./data/queue";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Base directory of the queue. Must exist before the queue is opened.
    pub root: PathBuf,
    /// Owner slot to claim jobs into; defaults to this process's id.
    pub owner: Option<OwnerId>,
}

impl QueueConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            owner: None,
        }
    }

    /// Use a synthetic owner id instead of the process id.
    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `FSQUEUE_ROOT` (default: `./data/queue`)
    /// - `FSQUEUE_OWNER_ID` (optional; a positive pid-sized integer)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`QueueConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let root = lookup("FSQUEUE_ROOT")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));

        let owner = match lookup("FSQUEUE_OWNER_ID").and_then(non_empty) {
            Some(raw) => Some(OwnerId::parse(&raw).map_err(|e| {
                QueueError::InvalidConfig(format!("FSQUEUE_OWNER_ID: {e}"))
            })?),
            None => None,
        };

        Ok(Self { root, owner })
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
