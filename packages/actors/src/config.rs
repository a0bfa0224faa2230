//! Runtime configuration for the worker actors.

use std::time::Duration;

use crate::messages::ActorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Number of worker actors polling the queue.
    pub workers: u32,
    /// How often an idle worker calls take.
    pub poll_interval: Duration,
    /// How often the sweeper runs the rescue sweep.
    pub sweep_interval: Duration,
    /// Handlers running longer than this fail the job.
    pub job_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval: Duration::from_millis(500),
            sweep_interval: Duration::from_secs(30),
            job_timeout: Duration::from_secs(300),
        }
    }
}

impl RuntimeConfig {
    /// Build a config from environment variables.
    ///
    /// - `FSQUEUE_WORKERS` (default: 4)
    /// - `FSQUEUE_POLL_INTERVAL_MS` (default: 500)
    /// - `FSQUEUE_SWEEP_INTERVAL_SECS` (default: 30)
    /// - `FSQUEUE_JOB_TIMEOUT_SECS` (default: 300)
    pub fn from_env() -> Result<Self, ActorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ActorError> {
        let defaults = Self::default();

        let workers = parse_u64(&lookup, "FSQUEUE_WORKERS")?
            .map(|n| {
                u32::try_from(n)
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        ActorError::InvalidConfig(format!("FSQUEUE_WORKERS={n} (expected 1..)"))
                    })
            })
            .transpose()?
            .unwrap_or(defaults.workers);

        let poll_interval = parse_u64(&lookup, "FSQUEUE_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);
        let sweep_interval = parse_u64(&lookup, "FSQUEUE_SWEEP_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.sweep_interval);
        let job_timeout = parse_u64(&lookup, "FSQUEUE_JOB_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.job_timeout);

        if poll_interval.is_zero() || sweep_interval.is_zero() {
            return Err(ActorError::InvalidConfig(
                "poll and sweep intervals must be positive".into(),
            ));
        }

        Ok(Self {
            workers,
            poll_interval,
            sweep_interval,
            job_timeout,
        })
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    var_name: &str,
) -> Result<Option<u64>, ActorError> {
    let Some(raw) = lookup(var_name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse().map(Some).map_err(|_| {
        ActorError::InvalidConfig(format!("invalid integer for {var_name}={raw}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() -> Result<(), ActorError> {
        let cfg = RuntimeConfig::from_lookup(|_| None)?;
        assert_eq!(cfg, RuntimeConfig::default());
        Ok(())
    }

    #[test]
    fn overrides() -> Result<(), ActorError> {
        let cfg = RuntimeConfig::from_lookup(|key| match key {
            "FSQUEUE_WORKERS" => Some("2".into()),
            "FSQUEUE_POLL_INTERVAL_MS" => Some(" 50 ".into()),
            "FSQUEUE_SWEEP_INTERVAL_SECS" => Some("5".into()),
            _ => None,
        })?;
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.poll_interval, Duration::from_millis(50));
        assert_eq!(cfg.sweep_interval, Duration::from_secs(5));
        assert_eq!(cfg.job_timeout, Duration::from_secs(300));
        Ok(())
    }

    #[test]
    fn rejects_garbage_and_zero() {
        let garbage = RuntimeConfig::from_lookup(|key| {
            (key == "FSQUEUE_WORKERS").then(|| "many".to_string())
        });
        assert!(matches!(garbage, Err(ActorError::InvalidConfig(_))));

        let zero = RuntimeConfig::from_lookup(|key| {
            (key == "FSQUEUE_WORKERS").then(|| "0".to_string())
        });
        assert!(matches!(zero, Err(ActorError::InvalidConfig(_))));

        let zero_poll = RuntimeConfig::from_lookup(|key| {
            (key == "FSQUEUE_POLL_INTERVAL_MS").then(|| "0".to_string())
        });
        assert!(matches!(zero_poll, Err(ActorError::InvalidConfig(_))));
    }
}
