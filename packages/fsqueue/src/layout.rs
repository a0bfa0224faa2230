//! On-disk directory layout of a queue.

use std::path::{Path, PathBuf};

use queue_core::{JobState, OwnerId};

/// Paths of the fixed subdirectories under a queue root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Layout {
    root: PathBuf,
}

impl Layout {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn staging(&self) -> PathBuf {
        self.root.join(JobState::STAGING_DIR)
    }

    pub(crate) fn submittable(&self) -> PathBuf {
        self.root.join(JobState::SUBMITTABLE_DIR)
    }

    pub(crate) fn owned(&self) -> PathBuf {
        self.root.join(JobState::OWNED_DIR)
    }

    pub(crate) fn owner_slot(&self, owner: OwnerId) -> PathBuf {
        self.owned().join(owner.to_string())
    }

    /// Directory that holds jobs in `state`.
    pub(crate) fn dir_for(&self, state: JobState) -> PathBuf {
        match state {
            JobState::Owned { owner } => self.owner_slot(owner),
            other => self.root.join(other.dir_name()),
        }
    }

    /// The directories created on open, in creation order.
    pub(crate) fn fixed_dirs(&self) -> [PathBuf; 5] {
        [
            self.staging(),
            self.submittable(),
            self.owned(),
            self.dir_for(JobState::Completed),
            self.dir_for(JobState::Failed),
        ]
    }

    /// Work out the state of a job from the directory containing it.
    pub(crate) fn classify(&self, location: &Path) -> Option<JobState> {
        let parent = location.parent()?;
        if parent.parent() == Some(self.owned().as_path()) {
            let name = parent.file_name()?.to_str()?;
            return OwnerId::parse(name).ok().map(|owner| JobState::Owned { owner });
        }
        if parent.parent() != Some(self.root.as_path()) {
            return None;
        }
        match parent.file_name()?.to_str()? {
            JobState::STAGING_DIR => Some(JobState::Staging),
            JobState::SUBMITTABLE_DIR => Some(JobState::Submittable),
            JobState::COMPLETED_DIR => Some(JobState::Completed),
            JobState::FAILED_DIR => Some(JobState::Failed),
            _ => None,
        }
    }
}
