//! Job handles and their state transitions.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use queue_core::{JobId, JobState};
use serde::Serialize;
use serde::de::DeserializeOwned;
use storage::RenameError;

use crate::error::{QueueError, Result};
use crate::layout::Layout;
use crate::property::Properties;

/// A handle to one job directory.
///
/// The filesystem is the source of truth: the handle only remembers where it
/// last put the job. Transitions consume no in-memory state and update the
/// remembered location only when the rename succeeded.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    location: PathBuf,
    layout: Arc<Layout>,
}

impl Job {
    pub(crate) fn new(id: JobId, location: PathBuf, layout: Arc<Layout>) -> Self {
        Self {
            id,
            location,
            layout,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Absolute path of the job directory as of the last transition.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// State implied by the directory the job was last moved into.
    pub fn state(&self) -> Option<JobState> {
        self.layout.classify(&self.location)
    }

    /// When the job directory was last modified, if it can be read.
    pub fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.location).and_then(|m| m.modified()).ok()
    }

    /// Property store view of this job's directory.
    pub fn properties(&self) -> Properties {
        Properties::new(self.location.clone(), self.layout.clone())
    }

    /// Read property `key`.
    pub fn get(&self, key: &str) -> Result<Bytes> {
        self.properties().get(key)
    }

    /// Atomically replace property `key` with `data`.
    pub fn set(&self, key: &str, data: impl AsRef<[u8]>) -> Result<()> {
        self.properties().set(key, data)
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.properties().get_json(key)
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.properties().set_json(key, value)
    }

    /// Names of the properties set on this job.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.properties().keys()
    }

    /// Move the job from staging to submittable, making it visible to workers.
    pub fn submit(&mut self) -> Result<()> {
        self.move_to(JobState::Submittable)
    }

    /// Move the job to completed.
    pub fn finish(&mut self) -> Result<()> {
        self.move_to(JobState::Completed)
    }

    /// Move the job to failed.
    pub fn fail(&mut self) -> Result<()> {
        self.move_to(JobState::Failed)
    }

    fn move_to(&mut self, state: JobState) -> Result<()> {
        let dest = self.layout.dir_for(state).join(&self.id);
        match storage::rename(&self.location, &dest) {
            Ok(()) => {
                tracing::debug!(job = %self.id, %state, "moved job");
                self.location = dest;
                Ok(())
            }
            Err(RenameError::DestinationExists(_)) => Err(QueueError::StateConflict {
                id: self.id.clone(),
                state,
            }),
            Err(RenameError::SourceMissing(_)) => Err(QueueError::Vanished {
                id: self.id.clone(),
                path: self.location.clone(),
            }),
            Err(RenameError::Io(e)) => {
                tracing::warn!(job = %self.id, %state, error = %e, "failed to move job");
                Err(QueueError::from_io(&self.location, e))
            }
        }
    }
}
