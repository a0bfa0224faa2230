#![allow(clippy::disallowed_methods)]

mod common;

use std::time::Duration;

use actors::{
    ERROR_PROPERTY, JobHandlerRegistry, RuntimeConfig, SupervisorMessage, WorkerStats,
    job_handler, start_supervisor,
};
use fsqueue::{JobState, Queue, QueueStats, RescueReport};
use queue_core::QueueEvent;

use common::{
    FakeLiveness, TestResult, call, fast_config, open_queue, read_property, submit, wait_for_state,
    within,
};

fn echo_handlers() -> JobHandlerRegistry {
    let mut handlers = JobHandlerRegistry::new();
    handlers.register(job_handler!("echo", |job| {
        let message = job.get_string("message").map_err(|e| e.to_string())?;
        job.set("output", message.to_uppercase())
            .map_err(|e| e.to_string())
    }));
    handlers.register(job_handler!("broken", |job| {
        Err(format!("cannot handle {}", job.id))
    }));
    handlers.register(job_handler!("slow", |_job| {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }));
    handlers
}

async fn stop(
    supervisor: actors::ActorRef<SupervisorMessage>,
    handle: tokio::task::JoinHandle<()>,
) -> TestResult {
    supervisor.send_message(SupervisorMessage::Shutdown)?;
    within(handle).await??;
    Ok(())
}

#[tokio::test]
async fn worker_completes_job() -> TestResult {
    let (_dir, queue) = open_queue()?;
    let id = submit(&queue, "echo", &[("message", "hello")])?;

    let (supervisor, handle) = start_supervisor(queue.clone(), echo_handlers(), fast_config(2)).await?;
    wait_for_state(&queue, JobState::Completed, &id).await?;

    assert_eq!(read_property(&queue, JobState::Completed, &id, "output")?, "HELLO");
    assert!(queue.list(JobState::Submittable)?.is_empty());
    assert!(queue.list(JobState::Owned { owner: queue.owner() })?.is_empty());

    let workers: Vec<WorkerStats> =
        call(&supervisor, |reply| SupervisorMessage::GetWorkerStats { reply }).await?;
    assert_eq!(workers.len(), 2);
    assert_eq!(workers.iter().map(|w| w.completed).sum::<u64>(), 1);

    stop(supervisor, handle).await
}

#[tokio::test]
async fn failing_handler_moves_job_to_failed() -> TestResult {
    let (_dir, queue) = open_queue()?;
    let id = submit(&queue, "broken", &[])?;

    let (supervisor, handle) = start_supervisor(queue.clone(), echo_handlers(), fast_config(1)).await?;
    wait_for_state(&queue, JobState::Failed, &id).await?;

    let error = read_property(&queue, JobState::Failed, &id, ERROR_PROPERTY)?;
    assert_eq!(error, format!("cannot handle {id}"));

    stop(supervisor, handle).await
}

#[tokio::test]
async fn job_without_handler_fails() -> TestResult {
    let (_dir, queue) = open_queue()?;
    let id = submit(&queue, "unknown", &[])?;

    let (supervisor, handle) = start_supervisor(queue.clone(), echo_handlers(), fast_config(1)).await?;
    wait_for_state(&queue, JobState::Failed, &id).await?;

    let error = read_property(&queue, JobState::Failed, &id, ERROR_PROPERTY)?;
    assert!(error.contains("No handler for job kind: unknown"));

    stop(supervisor, handle).await
}

#[tokio::test]
async fn slow_job_times_out() -> TestResult {
    let (_dir, queue) = open_queue()?;
    let id = submit(&queue, "slow", &[])?;

    let config = RuntimeConfig {
        job_timeout: Duration::from_millis(100),
        ..fast_config(1)
    };
    let (supervisor, handle) = start_supervisor(queue.clone(), echo_handlers(), config).await?;
    wait_for_state(&queue, JobState::Failed, &id).await?;

    let error = read_property(&queue, JobState::Failed, &id, ERROR_PROPERTY)?;
    assert_eq!(error, "Job timed out");

    stop(supervisor, handle).await
}

#[tokio::test]
async fn subscribers_see_job_lifecycle() -> TestResult {
    let (_dir, queue) = open_queue()?;

    let (supervisor, handle) = start_supervisor(queue.clone(), echo_handlers(), fast_config(1)).await?;
    let mut events = call(&supervisor, |reply| SupervisorMessage::Subscribe { reply }).await?;

    let id = submit(&queue, "echo", &[("message", "events")])?;

    let mut taken = false;
    let finished = within(async {
        loop {
            match events.recv().await {
                Ok(QueueEvent::JobTaken { job_id, .. }) if job_id == id => taken = true,
                Ok(QueueEvent::JobFinished { job_id, .. }) if job_id == id => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
    })
    .await?;
    assert!(taken);
    assert!(finished);

    stop(supervisor, handle).await
}

#[tokio::test]
async fn sweep_now_returns_jobs_of_dead_owner() -> TestResult {
    let (dir, queue) = open_queue()?;
    let queue = queue.with_liveness(FakeLiveness::alive(&[std::process::id()]));

    // Plant a job directly in a dead owner's slot, as a crashed worker leaves it.
    let job = queue.create_job("echo")?;
    job.set("message", "rescued")?;
    let id = job.id().clone();
    let dead_slot = dir.path().join("owned").join("999999");
    std::fs::create_dir_all(&dead_slot)?;
    std::fs::rename(job.location(), dead_slot.join(&id))?;
    drop(job);

    let (supervisor, handle) = start_supervisor(queue.clone(), echo_handlers(), fast_config(1)).await?;

    let report: RescueReport = call(&supervisor, |reply| SupervisorMessage::SweepNow { reply })
        .await?
        .map_err(|e| format!("sweep failed: {e}"))?;
    assert_eq!(report.jobs_rescued(), 1);
    assert_eq!(report.rescued[0].job_id, id);
    assert!(!dead_slot.exists());

    // The worker picks the rescued job up like any other.
    wait_for_state(&queue, JobState::Completed, &id).await?;
    assert_eq!(read_property(&queue, JobState::Completed, &id, "output")?, "RESCUED");

    stop(supervisor, handle).await
}

#[tokio::test]
async fn supervisor_reports_queue_stats() -> TestResult {
    let (_dir, queue) = open_queue()?;
    queue.create_job("echo")?;

    let handlers = JobHandlerRegistry::new();
    let (supervisor, handle) = start_supervisor(queue.clone(), handlers, fast_config(1)).await?;

    let stats: QueueStats = call(&supervisor, |reply| SupervisorMessage::GetStats { reply })
        .await?
        .map_err(|e| format!("stats failed: {e}"))?;
    assert_eq!(stats.staging, 1);
    assert_eq!(stats.submittable, 0);

    stop(supervisor, handle).await
}

#[tokio::test]
async fn shutdown_leaves_submitted_jobs_alone() -> TestResult {
    let (_dir, queue) = open_queue()?;

    let (supervisor, handle) = start_supervisor(
        queue.clone(),
        JobHandlerRegistry::new(),
        RuntimeConfig {
            poll_interval: Duration::from_secs(3600),
            ..fast_config(1)
        },
    )
    .await?;
    stop(supervisor, handle).await?;

    let id = submit(&queue, "echo", &[])?;
    assert_eq!(queue.list(JobState::Submittable)?, vec![id]);

    // A fresh handle on the same root still sees the job.
    let reopened = Queue::open(queue.root())?;
    assert_eq!(reopened.stats()?.submittable, 1);
    Ok(())
}
