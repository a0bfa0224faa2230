#![allow(dead_code)]

use std::collections::HashSet;
use std::error::Error;
use std::future::Future;
use std::io;
use std::time::Duration;

use actors::{ActorRef, RuntimeConfig};
use fsqueue::{JobId, JobState, Liveness, LivenessCheck, Queue};
use ractor::rpc::CallResult;
use tempfile::TempDir;

pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

pub const RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// A fresh queue in its own temp directory.
pub fn open_queue() -> TestResult<(TempDir, Queue)> {
    let dir = tempfile::tempdir()?;
    let queue = Queue::open(dir.path())?;
    Ok((dir, queue))
}

/// Fast timers so tests do not wait on the production defaults.
pub fn fast_config(workers: u32) -> RuntimeConfig {
    RuntimeConfig {
        workers,
        poll_interval: Duration::from_millis(20),
        sweep_interval: Duration::from_secs(3600),
        job_timeout: Duration::from_secs(5),
    }
}

/// Create a job with the given properties and submit it.
pub fn submit(queue: &Queue, kind: &str, props: &[(&str, &str)]) -> TestResult<JobId> {
    let mut job = queue.create_job(kind)?;
    for (key, value) in props {
        job.set(key, value)?;
    }
    job.submit()?;
    Ok(job.id().clone())
}

/// Read a property straight off disk.
pub fn read_property(queue: &Queue, state: JobState, id: &JobId, key: &str) -> TestResult<String> {
    let path = queue.dir_for(state).join(id).join(key);
    Ok(std::fs::read_to_string(path)?)
}

/// Wait until `id` shows up in `state`.
pub async fn wait_for_state(queue: &Queue, state: JobState, id: &JobId) -> TestResult {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if queue.list(state)?.contains(id) {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(format!("job {id} never reached {state}").into());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Call an actor and unwrap the reply.
pub async fn call<M, T, F>(actor: &ActorRef<M>, msg: F) -> TestResult<T>
where
    M: ractor::Message,
    T: Send + 'static,
    F: FnOnce(ractor::RpcReplyPort<T>) -> M,
{
    match ractor::rpc::call(actor, msg, Some(RPC_TIMEOUT)).await {
        Ok(CallResult::Success(value)) => Ok(value),
        Ok(CallResult::Timeout) => Err("rpc timed out".into()),
        Ok(CallResult::SenderError) => Err("rpc reply dropped".into()),
        Err(e) => Err(format!("rpc failed: {e}").into()),
    }
}

/// Bound how long a test waits on an async step.
pub async fn within<T>(fut: impl Future<Output = T>) -> TestResult<T> {
    Ok(tokio::time::timeout(Duration::from_secs(10), fut).await?)
}

/// Liveness check that reports only the listed pids as alive.
#[derive(Debug, Default, Clone)]
pub struct FakeLiveness {
    pub alive: HashSet<u32>,
}

impl FakeLiveness {
    pub fn alive(pids: &[u32]) -> Self {
        Self {
            alive: pids.iter().copied().collect(),
        }
    }
}

impl LivenessCheck for FakeLiveness {
    fn check(&self, pid: u32) -> io::Result<Liveness> {
        if self.alive.contains(&pid) {
            Ok(Liveness::Alive)
        } else {
            Ok(Liveness::Dead)
        }
    }
}
