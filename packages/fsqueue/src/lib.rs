//! A crash-tolerant job queue kept entirely in a directory tree.
//!
//! Job state is the directory a job lives in, and every state change is an
//! atomic rename:
//!
//! ```text
//! <root>/staging/        created by CreateJob, private to the creator
//! <root>/submittable/    visible to every worker
//! <root>/owned/<pid>/    claimed by the worker process <pid>
//! <root>/completed/      finished
//! <root>/failed/         failed
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use fsqueue::Queue;
//!
//! # fn main() -> fsqueue::Result<()> {
//! let queue = Queue::open("/var/spool/jobs")?;
//!
//! let mut job = queue.create_job("build")?;
//! job.set("target", b"release")?;
//! job.submit()?;
//!
//! if let Some(mut job) = queue.take()? {
//!     let target = job.get("target")?;
//!     job.set("progress", format!("building {}", String::from_utf8_lossy(&target)))?;
//!     job.finish()?;
//! }
//!
//! queue.rescue_dead_jobs()?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod job;
mod layout;
mod property;
mod queue;
mod rescue;

pub use config::QueueConfig;
pub use error::{QueueError, Result};
pub use job::Job;
pub use property::Properties;
pub use queue::Queue;

/// Re-export the shared domain types.
pub use queue_core::{JobId, JobState, OwnerId, QueueStats, RescueReport, RescuedJob};
/// Re-export the liveness capability so callers can supply their own check.
pub use storage::{Liveness, LivenessCheck, SignalCheck};
