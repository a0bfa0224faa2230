//! Opening a queue and the operations that act on the queue as a whole.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use queue_core::{JobId, JobState, OwnerId, QueueStats, validate_component};
use rand::seq::IndexedRandom;
use storage::{LivenessCheck, RenameError, SignalCheck};

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::job::Job;
use crate::layout::Layout;

/// A handle to a queue directory, bound to one owner slot.
///
/// Cloning is cheap; clones share the layout and the liveness check.
#[derive(Clone)]
pub struct Queue {
    layout: Arc<Layout>,
    owner: OwnerId,
    liveness: Arc<dyn LivenessCheck>,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("root", &self.layout.root())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl Queue {
    /// Open the queue at `root` as this process.
    ///
    /// `root` must already exist. The fixed subdirectories and this process's
    /// owner slot are created if missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with(QueueConfig::new(root))
    }

    pub fn open_with(config: QueueConfig) -> Result<Self> {
        let owner = config.owner.unwrap_or_else(OwnerId::current);
        let layout = Layout::new(config.root);

        let meta = std::fs::metadata(layout.root())
            .map_err(|e| QueueError::from_io(layout.root(), e))?;
        if !meta.is_dir() {
            return Err(QueueError::Io {
                path: layout.root().to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotADirectory,
                    "queue root is not a directory",
                ),
            });
        }

        for dir in layout
            .fixed_dirs()
            .into_iter()
            .chain(std::iter::once(layout.owner_slot(owner)))
        {
            storage::ensure_dir(&dir).map_err(|e| QueueError::from_io(&dir, e))?;
        }

        tracing::debug!(root = %layout.root().display(), %owner, "opened queue");
        Ok(Self {
            layout: Arc::new(layout),
            owner,
            liveness: Arc::new(SignalCheck),
        })
    }

    /// Replace the liveness check used by the rescue sweep.
    pub fn with_liveness(mut self, check: impl LivenessCheck + 'static) -> Self {
        self.liveness = Arc::new(check);
        self
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// The owner this handle claims jobs for.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Path of this handle's owner slot.
    pub fn owner_slot(&self) -> PathBuf {
        self.layout.owner_slot(self.owner)
    }

    /// Directory holding jobs in `state`.
    pub fn dir_for(&self, state: JobState) -> PathBuf {
        self.layout.dir_for(state)
    }

    pub(crate) fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    pub(crate) fn liveness(&self) -> &dyn LivenessCheck {
        self.liveness.as_ref()
    }

    /// Create a new job in staging named `<prefix>-<random>`.
    ///
    /// An empty prefix yields a bare random name. The job is private to the
    /// caller until [`Job::submit`] is called.
    pub fn create_job(&self, prefix: &str) -> Result<Job> {
        let name_prefix = if prefix.is_empty() {
            String::new()
        } else {
            validate_component(prefix)?;
            format!("{prefix}-")
        };
        let staging = self.layout.staging();
        let location = storage::create_unique_dir(&staging, &name_prefix)
            .map_err(|e| QueueError::from_io(&staging, e))?;

        let Some(id) = location
            .file_name()
            .and_then(|n| JobId::parse(n).ok())
        else {
            return Err(QueueError::Io {
                path: location,
                source: std::io::Error::other("allocated job directory has an unusable name"),
            });
        };

        tracing::debug!(job = %id, "created job");
        Ok(Job::new(id, location, self.layout.clone()))
    }

    /// Claim one submittable job for this owner.
    ///
    /// Returns `Ok(None)` when nothing is submittable. Jobs are picked at
    /// random; losing a race for a job to another worker just means picking
    /// again from a fresh listing. If the owner slot has disappeared it is
    /// recreated once before giving up.
    pub fn take(&self) -> Result<Option<Job>> {
        let submittable = self.layout.submittable();
        let slot = self.owner_slot();
        let mut rng = rand::rng();
        let mut slot_restored = false;

        loop {
            let names = self.list_ids(&submittable)?;
            let Some(id) = names.choose(&mut rng) else {
                return Ok(None);
            };

            let from = submittable.join(id);
            let to = slot.join(id);
            match storage::rename(&from, &to) {
                Ok(()) => {
                    tracing::debug!(job = %id, owner = %self.owner, "took job");
                    return Ok(Some(Job::new(id.clone(), to, self.layout.clone())));
                }
                Err(RenameError::SourceMissing(_)) => {
                    tracing::trace!(job = %id, "job claimed by another worker, retrying");
                    continue;
                }
                Err(RenameError::DestinationExists(_)) => {
                    return Err(QueueError::StateConflict {
                        id: id.clone(),
                        state: JobState::Owned { owner: self.owner },
                    });
                }
                // The source is still there, so the missing piece is our slot.
                Err(RenameError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                    if slot_restored {
                        return Err(QueueError::Io { path: to, source: e });
                    }
                    tracing::warn!(slot = %slot.display(), "owner slot missing, recreating it");
                    storage::ensure_dir(&slot).map_err(|e| QueueError::from_io(&slot, e))?;
                    slot_restored = true;
                }
                Err(RenameError::Io(e)) => return Err(QueueError::from_io(&to, e)),
            }
        }
    }

    /// Ids of the jobs currently in `state`.
    pub fn list(&self, state: JobState) -> Result<Vec<JobId>> {
        let mut ids = self.list_ids(&self.layout.dir_for(state))?;
        ids.sort();
        Ok(ids)
    }

    /// Count job directories in every state.
    pub fn stats(&self) -> Result<QueueStats> {
        let mut stats = QueueStats {
            staging: count_dirs(&self.layout.staging())?,
            submittable: count_dirs(&self.layout.submittable())?,
            completed: count_dirs(&self.layout.dir_for(JobState::Completed))?,
            failed: count_dirs(&self.layout.dir_for(JobState::Failed))?,
            ..Default::default()
        };

        let owned = self.layout.owned();
        for name in storage::list_names(&owned).map_err(|e| QueueError::from_io(&owned, e))? {
            let slot = owned.join(&name);
            if !slot.is_dir() {
                continue;
            }
            stats.owners += 1;
            match count_dirs(&slot) {
                Ok(n) => stats.owned += n,
                // Slot removed by a concurrent sweep.
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(stats)
    }

    /// Job ids found in `dir`. Names are taken as they are on disk.
    pub(crate) fn list_ids(&self, dir: &Path) -> Result<Vec<JobId>> {
        let names = storage::list_names(dir).map_err(|e| QueueError::from_io(dir, e))?;
        Ok(names
            .into_iter()
            .filter_map(|name| match JobId::parse(name) {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "skipping entry");
                    None
                }
            })
            .collect())
    }
}

fn count_dirs(dir: &Path) -> Result<u64> {
    let entries = std::fs::read_dir(dir).map_err(|e| QueueError::from_io(dir, e))?;
    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(|e| QueueError::from_io(dir, e))?;
        if entry.file_type().is_ok_and(|t| t.is_dir()) {
            count += 1;
        }
    }
    Ok(count)
}
