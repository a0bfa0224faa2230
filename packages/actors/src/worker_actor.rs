//! Worker actor that takes jobs from the queue and runs their handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use fsqueue::{Job, Queue};
use queue_core::QueueEvent;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::handler::{HandlerResult, JobContext, JobHandlerRegistry};
use crate::messages::{WorkerMessage, WorkerStats};

/// Property a failed job's error message is written to.
pub const ERROR_PROPERTY: &str = "error";

/// State for the worker actor.
pub struct WorkerActorState {
    pub worker_id: String,
    queue: Queue,
    handlers: Arc<JobHandlerRegistry>,
    event_tx: Option<broadcast::Sender<QueueEvent>>,
    job_timeout: Duration,
    stats: WorkerStats,
    poll_gate: PollGate,
    ticker: Option<JoinHandle<()>>,
}

impl WorkerActorState {
    fn emit(&self, event: QueueEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }

    async fn poll(&mut self) -> Result<(), ActorProcessingErr> {
        let queue = self.queue.clone();
        match tokio::task::spawn_blocking(move || queue.take()).await? {
            Ok(Some(job)) => self.process(job).await?,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(worker = %self.worker_id, error = %e, "take failed");
            }
        }
        Ok(())
    }

    /// Run the handler for a taken job, then finish or fail it.
    async fn process(&mut self, job: Job) -> Result<(), ActorProcessingErr> {
        let job_id = job.id().clone();
        self.emit(QueueEvent::JobTaken {
            job_id: job_id.clone(),
            owner: self.queue.owner(),
            worker_id: self.worker_id.clone(),
            timestamp: Utc::now(),
        });

        let started = Instant::now();
        let outcome: HandlerResult = match self.handlers.get(&job_id.kind()) {
            Some(handler) => {
                let ctx = JobContext::new(job_id.clone(), job.properties());
                match tokio::time::timeout(self.job_timeout, handler.handle(ctx)).await {
                    Ok(result) => result,
                    Err(_) => Err("Job timed out".into()),
                }
            }
            None => Err(format!("No handler for job kind: {}", job_id.kind())),
        };
        let duration_ms = elapsed_ms(started.elapsed());

        let failure = outcome.as_ref().err().cloned();
        let moved = tokio::task::spawn_blocking(move || {
            let mut job = job;
            match failure {
                None => job.finish(),
                Some(message) => {
                    if let Err(e) = job.set(ERROR_PROPERTY, message) {
                        tracing::warn!(job = %job.id(), error = %e, "failed to record job error");
                    }
                    job.fail()
                }
            }
        })
        .await?;

        if let Err(e) = moved {
            // The job stays in our slot; a sweep returns it once this process exits.
            tracing::warn!(job = %job_id, worker = %self.worker_id, error = %e, "could not move finished job");
            self.stats.stranded += 1;
            return Ok(());
        }

        match outcome {
            Ok(()) => {
                tracing::info!(job = %job_id, worker = %self.worker_id, duration_ms, "job completed");
                self.stats.completed += 1;
                self.emit(QueueEvent::JobFinished {
                    job_id,
                    worker_id: self.worker_id.clone(),
                    duration_ms,
                    timestamp: Utc::now(),
                });
            }
            Err(error) => {
                tracing::warn!(job = %job_id, worker = %self.worker_id, %error, "job failed");
                self.stats.failed += 1;
                self.emit(QueueEvent::JobFailed {
                    job_id,
                    worker_id: self.worker_id.clone(),
                    error,
                    timestamp: Utc::now(),
                });
            }
        }
        Ok(())
    }
}

/// Keeps at most one `Poll` in the mailbox, so a long job does not leave a
/// backlog of polls behind it.
#[derive(Debug, Clone, Default)]
struct PollGate(Arc<AtomicBool>);

impl PollGate {
    /// Claim the right to send a poll; false while one is outstanding.
    fn arm(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    fn release(&self) {
        self.0.store(false, Ordering::Release);
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub queue: Queue,
    pub handlers: Arc<JobHandlerRegistry>,
    pub poll_interval: Duration,
    pub job_timeout: Duration,
    pub event_tx: Option<broadcast::Sender<QueueEvent>>,
}

/// Worker actor that polls the queue for jobs.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);

        // Start the poll loop; ticks are dropped while a poll is queued or running.
        let myself_clone = myself.clone();
        let poll_interval = args.poll_interval;
        let poll_gate = PollGate::default();
        let gate = poll_gate.clone();
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !gate.arm() {
                    continue;
                }
                if myself_clone.send_message(WorkerMessage::Poll).is_err() {
                    break;
                }
            }
        });

        let state = WorkerActorState {
            stats: WorkerStats {
                worker_id: args.worker_id.clone(),
                ..Default::default()
            },
            worker_id: args.worker_id,
            queue: args.queue,
            handlers: args.handlers,
            event_tx: args.event_tx,
            job_timeout: args.job_timeout,
            poll_gate,
            ticker: Some(ticker),
        };
        state.emit(QueueEvent::WorkerStarted {
            worker_id: state.worker_id.clone(),
            timestamp: Utc::now(),
        });
        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => {
                let result = state.poll().await;
                state.poll_gate.release();
                result?;
            }

            WorkerMessage::GetStats { reply } => {
                let _ = reply.send(state.stats.clone());
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker: {}", state.worker_id);
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        state.emit(QueueEvent::WorkerStopped {
            worker_id: state.worker_id.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
