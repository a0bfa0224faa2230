//! Job handler trait and registry.

use fsqueue::{JobId, Properties, QueueError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result type for job handlers. `Err` carries the failure message.
pub type HandlerResult = Result<(), String>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// What a handler gets to see of the job it is processing.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub id: JobId,
    pub properties: Properties,
}

impl JobContext {
    pub fn new(id: JobId, properties: Properties) -> Self {
        Self { id, properties }
    }

    /// Read a property as UTF-8 text.
    pub fn get_string(&self, key: &str) -> Result<String, QueueError> {
        let bytes = self.properties.get(key)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, QueueError> {
        self.properties.get_json(key)
    }

    /// Checkpoint a value so a rescued job can resume from it.
    pub fn set(&self, key: &str, data: impl AsRef<[u8]>) -> Result<(), QueueError> {
        self.properties.set(key, data)
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), QueueError> {
        self.properties.set_json(key, value)
    }
}

/// Trait for job handlers.
///
/// Jobs are routed by [`JobId::kind`], the prefix they were created with.
pub trait JobHandler: Send + Sync + 'static {
    /// The job kind this handler processes.
    fn kind(&self) -> &str;

    /// Process a job.
    fn handle(&self, job: JobContext) -> HandlerFuture;
}

/// Maps job kinds to their handlers.
#[derive(Default)]
pub struct JobHandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobHandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a job kind, replacing any previous one.
    pub fn register<H: JobHandler>(&mut self, handler: H) {
        let kind = handler.kind().to_string();
        self.handlers.insert(kind, Arc::new(handler));
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(kind).cloned()
    }

    pub fn has_handler(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// List all registered job kinds.
    pub fn kinds(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }
}

/// A simple function-based job handler.
pub struct FnHandler<F>
where
    F: Fn(JobContext) -> HandlerFuture + Send + Sync + 'static,
{
    kind: String,
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(JobContext) -> HandlerFuture + Send + Sync + 'static,
{
    pub fn new(kind: impl Into<String>, handler: F) -> Self {
        Self {
            kind: kind.into(),
            handler,
        }
    }
}

impl<F> JobHandler for FnHandler<F>
where
    F: Fn(JobContext) -> HandlerFuture + Send + Sync + 'static,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    fn handle(&self, job: JobContext) -> HandlerFuture {
        (self.handler)(job)
    }
}

/// Box a handler body, pinning its output to [`HandlerResult`] so `?` works inside it.
pub fn boxed<F>(fut: F) -> HandlerFuture
where
    F: Future<Output = HandlerResult> + Send + 'static,
{
    Box::pin(fut)
}

/// Helper macro for creating job handlers from async blocks.
///
/// ```ignore
/// registry.register(job_handler!("echo", |job| {
///     let input = job.get_string("input").map_err(|e| e.to_string())?;
///     job.set("output", input).map_err(|e| e.to_string())
/// }));
/// ```
#[macro_export]
macro_rules! job_handler {
    ($kind:expr, |$job:ident| $body:expr) => {
        $crate::FnHandler::new($kind, |$job: $crate::JobContext| -> $crate::HandlerFuture {
            $crate::boxed(async move { $body })
        })
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_routes_by_kind() {
        let mut registry = JobHandlerRegistry::new();
        registry.register(crate::job_handler!("echo", |_job| Ok(())));
        registry.register(crate::job_handler!("fail", |_job| Err("nope".to_string())));

        assert!(registry.has_handler("echo"));
        assert!(!registry.has_handler("build"));
        let mut kinds = registry.kinds();
        kinds.sort();
        assert_eq!(kinds, vec!["echo", "fail"]);
        assert_eq!(registry.get("fail").map(|h| h.kind().to_string()), Some("fail".into()));
    }

    #[test]
    fn register_replaces_existing_handler() {
        let mut registry = JobHandlerRegistry::new();
        registry.register(crate::job_handler!("echo", |_job| Ok(())));
        registry.register(crate::job_handler!("echo", |_job| Err("second".to_string())));
        assert_eq!(registry.kinds().len(), 1);
    }
}
