//! Worker process for a filesystem job queue.
//!
//! Configuration comes from the environment; see `QueueConfig::from_env` and
//! `RuntimeConfig::from_env`. Log verbosity follows `RUST_LOG`.

use std::time::Duration;

use actors::{JobHandlerRegistry, RuntimeConfig, SupervisorMessage, job_handler, start_supervisor};
use fsqueue::{Queue, QueueConfig};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

/// Register the demo handlers.
fn demo_handlers() -> JobHandlerRegistry {
    let mut handlers = JobHandlerRegistry::new();

    // Echo: copies `message` to `output`.
    handlers.register(job_handler!("echo", |job| {
        let message = job.get_string("message").map_err(|e| e.to_string())?;
        tracing::info!("Echo job {}: {}", job.id, message);
        job.set("output", message).map_err(|e| e.to_string())
    }));

    // Sleep: sleeps `seconds` (default 5), checkpointing progress in `slept`
    // so a rescued job resumes where it stopped.
    handlers.register(job_handler!("sleep", |job| {
        let seconds = job
            .get_string("seconds")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(5);
        let mut slept = job
            .get_string("slept")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0);
        tracing::info!("Sleeping for {} seconds ({} already done)", seconds, slept);
        while slept < seconds {
            tokio::time::sleep(Duration::from_secs(1)).await;
            slept += 1;
            job.set("slept", slept.to_string())
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }));

    // Fail: fails unless `fail` is set to "false".
    handlers.register(job_handler!("fail", |job| {
        let should_fail = job
            .get_string("fail")
            .map(|s| s.trim() != "false")
            .unwrap_or(true);
        if should_fail {
            Err("Intentional failure".to_string())
        } else {
            Ok(())
        }
    }));

    handlers
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let queue_config = QueueConfig::from_env()?;
    let runtime_config = RuntimeConfig::from_env()?;

    std::fs::create_dir_all(&queue_config.root)?;
    let queue = Queue::open_with(queue_config)?;
    tracing::info!(
        root = %queue.root().display(),
        owner = %queue.owner(),
        "Opened job queue"
    );

    let (supervisor, handle) = start_supervisor(queue, demo_handlers(), runtime_config).await?;

    let (tx, rx) = actors::concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::Subscribe { reply: tx.into() })?;
    let mut events = rx.await?;
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(at = %event.timestamp(), "{}", event.description()),
                Err(RecvError::Lagged(n)) => tracing::debug!("Event log skipped {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Return jobs left behind by workers that died while this one was down.
    match startup_sweep(&supervisor).await {
        Ok(report) if !report.is_noop() => tracing::info!(
            rescued = report.jobs_rescued(),
            owners = report.recovered_owners.len(),
            "Startup sweep rescued jobs"
        ),
        Ok(_) => {}
        Err(e) => tracing::warn!("Startup sweep failed: {}", e),
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal");

    supervisor.send_message(SupervisorMessage::Shutdown)?;
    handle.await?;

    tracing::info!("Worker stopped");
    Ok(())
}

async fn startup_sweep(
    supervisor: &actors::ActorRef<SupervisorMessage>,
) -> Result<fsqueue::RescueReport, String> {
    let (tx, rx) = actors::concurrency::oneshot();
    supervisor
        .send_message(SupervisorMessage::SweepNow { reply: tx.into() })
        .map_err(|e| e.to_string())?;
    match tokio::time::timeout(Duration::from_secs(60), rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err("sweeper dropped the reply".to_string()),
        Err(_) => Err("timed out".to_string()),
    }
}
