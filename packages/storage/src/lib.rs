//! Filesystem primitives the job queue is built on.
//!
//! Everything the queue guarantees comes from a handful of operations:
//! - atomic rename that refuses to replace an existing destination
//! - creation of uniquely named directories and files
//! - directory listing
//! - checking whether a process is still alive
//!
//! The queue never locks anything; these calls are the whole concurrency story.

mod fs;
mod liveness;

pub use fs::{RenameError, create_unique_dir, create_unique_file, ensure_dir, list_names, rename};
pub use liveness::{Liveness, LivenessCheck, SignalCheck};

/// Re-export so callers can name the handle returned by [`create_unique_file`].
pub use tempfile::NamedTempFile;
