//! Actor system for the job queue.
//!
//! This crate runs workers against a [`fsqueue::Queue`] using Ractor actors.
//!
//! # Architecture
//!
//! - `Supervisor` - Top-level actor that owns the workers and the sweeper
//! - `WorkerActor` - Takes jobs from the queue and runs their handlers
//! - `SweeperActor` - Periodically returns jobs held by dead processes
//!
//! # Usage
//!
//! ```ignore
//! use actors::{JobHandlerRegistry, RuntimeConfig, SupervisorMessage, job_handler, start_supervisor};
//!
//! let mut handlers = JobHandlerRegistry::new();
//! handlers.register(job_handler!("echo", |job| {
//!     let msg = job.get_string("message").map_err(|e| e.to_string())?;
//!     tracing::info!("echo: {}", msg);
//!     Ok(())
//! }));
//!
//! let (supervisor, handle) = start_supervisor(queue, handlers, RuntimeConfig::default()).await?;
//! supervisor.send_message(SupervisorMessage::Shutdown)?;
//! ```

mod config;
mod handler;
mod messages;
mod supervisor;
mod sweeper_actor;
mod worker_actor;

pub use config::RuntimeConfig;
pub use handler::{
    FnHandler, HandlerFuture, HandlerResult, JobContext, JobHandler, JobHandlerRegistry, boxed,
};
pub use messages::{ActorError, SupervisorMessage, SweeperMessage, WorkerMessage, WorkerStats};
pub use supervisor::{Supervisor, SupervisorArgs, start_supervisor};
pub use sweeper_actor::{SweeperActor, SweeperArgs};
pub use worker_actor::{ERROR_PROPERTY, WorkerActor, WorkerArgs};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
