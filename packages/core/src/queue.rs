//! Queue-level domain types: job owners, statistics and sweep reports.

use serde::{Deserialize, Serialize};

use crate::JobId;

/// Error returned when an `owned/` entry is not a usable process identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0:?} does not look like a process id")]
pub struct OwnerIdError(pub String);

/// Identifier of a worker process; names its slot under `owned/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(u32);

impl OwnerId {
    /// Identifier of the calling process.
    pub fn current() -> Self {
        Self(std::process::id())
    }

    /// Build an owner id from a raw process id.
    ///
    /// Zero and values that do not fit a signed pid are rejected, since
    /// signalling them would address a process group instead of one process.
    pub fn new(pid: u32) -> Result<Self, OwnerIdError> {
        if pid == 0 || i32::try_from(pid).is_err() {
            return Err(OwnerIdError(pid.to_string()));
        }
        Ok(Self(pid))
    }

    /// Parse an owner id from a slot directory name.
    pub fn parse(s: &str) -> Result<Self, OwnerIdError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OwnerIdError(s.to_string()));
        }
        let pid: u32 = s.parse().map_err(|_| OwnerIdError(s.to_string()))?;
        Self::new(pid).map_err(|_| OwnerIdError(s.to_string()))
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OwnerId {
    type Err = OwnerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Snapshot of how many job directories sit in each state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    /// Jobs still being prepared.
    pub staging: u64,
    /// Jobs waiting for a worker.
    pub submittable: u64,
    /// Jobs held by some worker, summed over all owner slots.
    pub owned: u64,
    /// Number of owner slots under `owned/`.
    pub owners: u64,
    pub completed: u64,
    pub failed: u64,
}

impl QueueStats {
    /// Jobs that still need work (submittable + owned).
    pub fn active(&self) -> u64 {
        self.submittable + self.owned
    }

    /// Jobs that reached a terminal state.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.processed();
        if total == 0 {
            None
        } else {
            Some((self.completed as f64 / total as f64) * 100.0)
        }
    }
}

/// A job returned to `submittable/` by the rescue sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescuedJob {
    pub owner: OwnerId,
    pub job_id: JobId,
}

/// Outcome of one pass of the dead-worker rescue sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RescueReport {
    /// Owner slots whose name parsed as a process id.
    pub owners_examined: u64,
    /// Owners found alive and left untouched.
    pub owners_alive: u64,
    /// Owners whose liveness could not be determined; treated as alive.
    pub owners_indeterminate: u64,
    /// Entries under `owned/` that are not process ids.
    pub entries_skipped: u64,
    /// Dead owners whose slot was emptied and removed.
    pub recovered_owners: Vec<OwnerId>,
    /// Jobs moved back to `submittable/`.
    pub rescued: Vec<RescuedJob>,
    /// Jobs that could not be moved; they stay in the dead owner's slot.
    pub failures: u64,
    /// Dead owners whose slot could not be removed.
    pub slots_left: u64,
}

impl RescueReport {
    pub fn jobs_rescued(&self) -> usize {
        self.rescued.len()
    }

    /// True if the sweep changed nothing on disk.
    pub fn is_noop(&self) -> bool {
        self.rescued.is_empty() && self.recovered_owners.is_empty()
    }
}
