//! Core domain types for the filesystem job queue.
//!
//! This crate contains shared types used across all packages:
//! - JobId and JobState for job directories
//! - OwnerId, QueueStats and RescueReport for the queue as a whole
//! - Events for the worker runtime

mod events;
mod job;
mod queue;

pub use events::QueueEvent;
pub use job::{JobId, JobState, NameError, validate_component, validate_os_component};
pub use queue::{OwnerId, OwnerIdError, QueueStats, RescueReport, RescuedJob};
