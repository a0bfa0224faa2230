//! Supervisor actor that owns the workers and the rescue sweeper.

use std::sync::Arc;
use std::time::Duration;

use fsqueue::Queue;
use queue_core::QueueEvent;
use ractor::{Actor, ActorProcessingErr, ActorRef, SupervisionEvent};
use tokio::sync::broadcast;

use crate::config::RuntimeConfig;
use crate::handler::JobHandlerRegistry;
use crate::messages::{SupervisorMessage, SweeperMessage, WorkerMessage};
use crate::sweeper_actor::{SweeperActor, SweeperArgs};
use crate::worker_actor::{WorkerActor, WorkerArgs};

const CHILD_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// State for the supervisor actor.
pub struct SupervisorState {
    queue: Queue,
    /// Event broadcaster.
    event_tx: broadcast::Sender<QueueEvent>,
    workers: Vec<ActorRef<WorkerMessage>>,
    sweeper: ActorRef<SweeperMessage>,
}

/// Supervisor arguments.
pub struct SupervisorArgs {
    pub queue: Queue,
    pub handlers: JobHandlerRegistry,
    pub config: RuntimeConfig,
}

/// Supervisor actor that manages the worker pool for one queue.
pub struct Supervisor;

impl Actor for Supervisor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = SupervisorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            root = %args.queue.root().display(),
            owner = %args.queue.owner(),
            workers = args.config.workers,
            handlers = ?args.handlers.kinds(),
            "Starting job queue supervisor"
        );

        let (event_tx, _) = broadcast::channel(1024);
        let handlers = Arc::new(args.handlers);

        let (sweeper, _handle) = Actor::spawn_linked(
            None,
            SweeperActor,
            SweeperArgs {
                queue: args.queue.clone(),
                interval: args.config.sweep_interval,
                event_tx: Some(event_tx.clone()),
            },
            myself.get_cell(),
        )
        .await
        .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn sweeper: {}", e)))?;

        let mut workers = Vec::new();
        for n in 1..=args.config.workers {
            let worker_args = WorkerArgs {
                worker_id: format!("{}-worker-{}", args.queue.owner(), n),
                queue: args.queue.clone(),
                handlers: handlers.clone(),
                poll_interval: args.config.poll_interval,
                job_timeout: args.config.job_timeout,
                event_tx: Some(event_tx.clone()),
            };
            let (worker, _handle) =
                Actor::spawn_linked(None, WorkerActor, worker_args, myself.get_cell())
                    .await
                    .map_err(|e| {
                        ActorProcessingErr::from(format!("Failed to spawn worker: {}", e))
                    })?;
            workers.push(worker);
        }

        Ok(SupervisorState {
            queue: args.queue,
            event_tx,
            workers,
            sweeper,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::GetStats { reply } => {
                let queue = state.queue.clone();
                let stats = tokio::task::spawn_blocking(move || queue.stats())
                    .await?
                    .map_err(|e| e.to_string());
                let _ = reply.send(stats);
            }

            SupervisorMessage::GetWorkerStats { reply } => {
                let mut all = Vec::with_capacity(state.workers.len());
                for worker in &state.workers {
                    let result = ractor::rpc::call(
                        worker,
                        |reply| WorkerMessage::GetStats { reply },
                        Some(CHILD_RPC_TIMEOUT),
                    )
                    .await;
                    if let Ok(ractor::rpc::CallResult::Success(stats)) = result {
                        all.push(stats);
                    }
                }
                let _ = reply.send(all);
            }

            SupervisorMessage::SweepNow { reply } => {
                // Forward the reply port so the sweeper answers the caller directly.
                if let Err(e) = state
                    .sweeper
                    .send_message(SweeperMessage::SweepNow { reply })
                {
                    tracing::warn!("Failed to reach sweeper: {}", e);
                }
            }

            SupervisorMessage::Subscribe { reply } => {
                let _ = reply.send(state.event_tx.subscribe());
            }

            SupervisorMessage::Shutdown => {
                tracing::info!("Shutting down supervisor");
                for worker in &state.workers {
                    let _ = worker.send_message(WorkerMessage::Shutdown);
                }
                let _ = state.sweeper.send_message(SweeperMessage::Shutdown);
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                tracing::debug!(
                    "Child actor {} terminated: {:?}",
                    cell.get_id(),
                    reason
                );
                state.workers.retain(|w| w.get_id() != cell.get_id());
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                // Any job the worker held stays in the owner slot until this
                // process exits and a sweep returns it.
                tracing::warn!("Child actor {} failed: {}", cell.get_id(), error);
                state.workers.retain(|w| w.get_id() != cell.get_id());
            }
            _ => {}
        }
        Ok(())
    }
}

/// Start the supervisor for `queue` with the given handlers.
pub async fn start_supervisor(
    queue: Queue,
    handlers: JobHandlerRegistry,
    config: RuntimeConfig,
) -> Result<(ActorRef<SupervisorMessage>, tokio::task::JoinHandle<()>), ractor::SpawnErr> {
    let args = SupervisorArgs {
        queue,
        handlers,
        config,
    };
    let (actor, handle) = Actor::spawn(None, Supervisor, args).await?;

    Ok((actor, handle))
}
