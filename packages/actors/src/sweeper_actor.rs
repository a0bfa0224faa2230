//! Sweeper actor that periodically rescues jobs from dead workers.

use std::time::Duration;

use chrono::Utc;
use fsqueue::{Queue, RescueReport};
use queue_core::QueueEvent;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::messages::SweeperMessage;

/// State for the sweeper actor.
pub struct SweeperState {
    queue: Queue,
    event_tx: Option<broadcast::Sender<QueueEvent>>,
    ticker: Option<JoinHandle<()>>,
}

impl SweeperState {
    async fn sweep(&mut self) -> Result<RescueReport, String> {
        let queue = self.queue.clone();
        let report = tokio::task::spawn_blocking(move || queue.rescue_dead_jobs())
            .await
            .map_err(|e| format!("sweep task failed: {e}"))?
            .map_err(|e| e.to_string())?;

        if let Some(ref tx) = self.event_tx {
            let now = Utc::now();
            for rescued in &report.rescued {
                let _ = tx.send(QueueEvent::JobRescued {
                    job_id: rescued.job_id.clone(),
                    owner: rescued.owner,
                    timestamp: now,
                });
            }
            for owner in &report.recovered_owners {
                let _ = tx.send(QueueEvent::OwnerRecovered {
                    owner: *owner,
                    timestamp: now,
                });
            }
            let _ = tx.send(QueueEvent::SweepCompleted {
                report: report.clone(),
                timestamp: now,
            });
        }

        Ok(report)
    }
}

/// Sweeper actor arguments.
pub struct SweeperArgs {
    pub queue: Queue,
    pub interval: Duration,
    pub event_tx: Option<broadcast::Sender<QueueEvent>>,
}

/// Runs the dead-worker rescue sweep on a timer.
pub struct SweeperActor;

impl Actor for SweeperActor {
    type Msg = SweeperMessage;
    type State = SweeperState;
    type Arguments = SweeperArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting rescue sweeper every {:?}", args.interval);

        // First tick after one full period; callers wanting a startup sweep send SweepNow.
        let myself_clone = myself.clone();
        let period = args.interval;
        let ticker = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if myself_clone.send_message(SweeperMessage::Sweep).is_err() {
                    break;
                }
            }
        });

        Ok(SweeperState {
            queue: args.queue,
            event_tx: args.event_tx,
            ticker: Some(ticker),
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SweeperMessage::Sweep => {
                if let Err(e) = state.sweep().await {
                    tracing::warn!("Rescue sweep failed: {}", e);
                }
            }

            SweeperMessage::SweepNow { reply } => {
                let _ = reply.send(state.sweep().await);
            }

            SweeperMessage::Shutdown => {
                tracing::info!("Shutting down rescue sweeper");
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
        Ok(())
    }
}
