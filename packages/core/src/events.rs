//! Event types emitted by the worker runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, OwnerId, RescueReport};

/// Events describing job movements observed by this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    // Job events
    /// A worker claimed a job.
    JobTaken {
        job_id: JobId,
        owner: OwnerId,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A job moved to completed.
    JobFinished {
        job_id: JobId,
        worker_id: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job moved to failed.
    JobFailed {
        job_id: JobId,
        worker_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    // Rescue events
    /// A job was moved from a dead owner's slot back to submittable.
    JobRescued {
        job_id: JobId,
        owner: OwnerId,
        timestamp: DateTime<Utc>,
    },
    /// A dead owner's slot was emptied and removed.
    OwnerRecovered {
        owner: OwnerId,
        timestamp: DateTime<Utc>,
    },
    /// A rescue sweep finished.
    SweepCompleted {
        report: RescueReport,
        timestamp: DateTime<Utc>,
    },

    // Worker events
    WorkerStarted {
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    WorkerStopped {
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl QueueEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            QueueEvent::JobTaken { timestamp, .. }
            | QueueEvent::JobFinished { timestamp, .. }
            | QueueEvent::JobFailed { timestamp, .. }
            | QueueEvent::JobRescued { timestamp, .. }
            | QueueEvent::OwnerRecovered { timestamp, .. }
            | QueueEvent::SweepCompleted { timestamp, .. }
            | QueueEvent::WorkerStarted { timestamp, .. }
            | QueueEvent::WorkerStopped { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            QueueEvent::JobTaken { job_id, .. }
            | QueueEvent::JobFinished { job_id, .. }
            | QueueEvent::JobFailed { job_id, .. }
            | QueueEvent::JobRescued { job_id, .. } => Some(job_id),
            _ => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            QueueEvent::JobTaken {
                job_id, worker_id, ..
            } => format!("Job {job_id} taken by {worker_id}"),
            QueueEvent::JobFinished {
                job_id,
                duration_ms,
                ..
            } => format!("Job {job_id} completed in {duration_ms}ms"),
            QueueEvent::JobFailed { job_id, error, .. } => {
                format!("Job {job_id} failed: {error}")
            }
            QueueEvent::JobRescued { job_id, owner, .. } => {
                format!("Job {job_id} rescued from dead owner {owner}")
            }
            QueueEvent::OwnerRecovered { owner, .. } => format!("Owner {owner} recovered"),
            QueueEvent::SweepCompleted { report, .. } => format!(
                "Sweep rescued {} jobs from {} owners",
                report.jobs_rescued(),
                report.recovered_owners.len()
            ),
            QueueEvent::WorkerStarted { worker_id, .. } => format!("Worker {worker_id} started"),
            QueueEvent::WorkerStopped { worker_id, .. } => format!("Worker {worker_id} stopped"),
        }
    }
}
