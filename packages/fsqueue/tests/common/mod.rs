#![allow(dead_code)]

use std::collections::HashSet;
use std::io;
use std::path::Path;

use fsqueue::{Liveness, LivenessCheck, OwnerId, Queue, QueueConfig, QueueError};
use tempfile::TempDir;

/// A fresh queue in its own temp directory, opened as this process.
pub fn open_queue() -> Result<(TempDir, Queue), QueueError> {
    let dir = tempfile::tempdir().map_err(|e| QueueError::Io {
        path: std::env::temp_dir(),
        source: e,
    })?;
    let queue = Queue::open(dir.path())?;
    Ok((dir, queue))
}

/// Open a second handle on `root` with a synthetic owner id.
pub fn open_as(root: &Path, pid: u32) -> Result<Queue, QueueError> {
    let owner = OwnerId::new(pid).map_err(|e| QueueError::InvalidConfig(e.to_string()))?;
    Queue::open_with(QueueConfig::new(root).with_owner(owner))
}

/// Liveness check with a fixed answer per pid.
#[derive(Debug, Default, Clone)]
pub struct FakeLiveness {
    pub alive: HashSet<u32>,
    pub indeterminate: HashSet<u32>,
}

impl FakeLiveness {
    pub fn alive(pids: &[u32]) -> Self {
        Self {
            alive: pids.iter().copied().collect(),
            indeterminate: HashSet::new(),
        }
    }

    pub fn with_indeterminate(mut self, pid: u32) -> Self {
        self.indeterminate.insert(pid);
        self
    }
}

impl LivenessCheck for FakeLiveness {
    fn check(&self, pid: u32) -> io::Result<Liveness> {
        if self.indeterminate.contains(&pid) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        if self.alive.contains(&pid) {
            Ok(Liveness::Alive)
        } else {
            Ok(Liveness::Dead)
        }
    }
}

/// Create a bare job directory, the way an external submitter or a crashed
/// worker would have left it.
pub fn plant_job(dir: &Path, name: impl AsRef<Path>) -> io::Result<()> {
    std::fs::create_dir_all(dir.join(name))
}
