//! Message types for actor communication.

use fsqueue::{QueueStats, RescueReport};
use queue_core::QueueEvent;
use ractor::RpcReplyPort;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Counters kept by each worker actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub worker_id: String,
    pub completed: u64,
    pub failed: u64,
    /// Jobs whose final move could not be made; they stay in the owner slot.
    pub stranded: u64,
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Try to take and process one job.
    Poll,

    /// Get this worker's counters.
    GetStats { reply: RpcReplyPort<WorkerStats> },

    /// Shutdown the worker.
    Shutdown,
}

/// Messages for the SweeperActor.
#[derive(Debug)]
pub enum SweeperMessage {
    /// Periodic tick: run the rescue sweep.
    Sweep,

    /// Run the rescue sweep now and reply with its report.
    SweepNow {
        reply: RpcReplyPort<Result<RescueReport, String>>,
    },

    /// Shutdown the sweeper.
    Shutdown,
}

/// Messages for the Supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Count jobs per state.
    GetStats {
        reply: RpcReplyPort<Result<QueueStats, String>>,
    },

    /// Collect counters from every worker.
    GetWorkerStats { reply: RpcReplyPort<Vec<WorkerStats>> },

    /// Run a rescue sweep immediately.
    SweepNow {
        reply: RpcReplyPort<Result<RescueReport, String>>,
    },

    /// Subscribe to events.
    Subscribe {
        reply: RpcReplyPort<broadcast::Receiver<QueueEvent>>,
    },

    /// Shutdown all workers and the sweeper.
    Shutdown,
}

/// Error type for actor operations.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("invalid runtime config: {0}")]
    InvalidConfig(String),
}
