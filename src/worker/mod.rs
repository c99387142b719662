//! The dispatch loop: fetch, hand to handlers, report back.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use rand::RngExt;
use tracing::{debug, info, warn};

use crate::broker::{Broker, FetchRequest, Task};
use crate::consts::{
    DEFAULT_HANDLER_TIMEOUT, DEFAULT_IDLE_BACKOFF, DEFAULT_LOCK_DURATION, DEFAULT_MAX_TASKS,
    DEFAULT_POLL_TIMEOUT, DEFAULT_RETRIES, DEFAULT_RETRY_TIMEOUT, DEFAULT_WORKER_ID,
};
use crate::handlers::{Outcome, Registry};

/// Tuning knobs for the worker loop.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub worker_id: String,
    pub max_tasks: usize,
    pub lock_duration: Duration,
    /// How long the service should hold an empty fetch open (long poll).
    pub poll_timeout: Duration,
    /// Per-task handler budget. A slower handler is failed, not awaited.
    pub handler_timeout: Duration,
    /// Retries reported on failure when the service didn't say how many
    /// are left.
    pub default_retries: u32,
    /// Backoff the service should apply before redelivering a failed task.
    pub retry_timeout: Duration,
    /// Sleep between polls that returned no work.
    pub idle_backoff: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            worker_id: DEFAULT_WORKER_ID.to_string(),
            max_tasks: DEFAULT_MAX_TASKS,
            lock_duration: DEFAULT_LOCK_DURATION,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
            default_retries: DEFAULT_RETRIES,
            retry_timeout: DEFAULT_RETRY_TIMEOUT,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
        }
    }
}

/// The worker: one broker connection, one registry, one poll loop.
///
/// The broker handle is constructed once at startup and passed in — the
/// worker never builds its own connection.
pub struct Worker {
    broker: Arc<dyn Broker>,
    handlers: Arc<Registry>,
    options: WorkerOptions,
}

impl Worker {
    pub fn new(broker: Arc<dyn Broker>, handlers: Arc<Registry>, options: WorkerOptions) -> Self {
        Self {
            broker,
            handlers,
            options,
        }
    }

    /// Poll forever. Ends only on a fetch error or when the future is
    /// dropped (e.g. by a shutdown select in `main`).
    pub async fn run(&self) -> Result<()> {
        loop {
            let handled = self.poll_once().await?;
            if handled == 0 {
                tokio::time::sleep(self.idle_backoff_with_jitter()).await;
            }
        }
    }

    /// One fetch/dispatch/report cycle. Returns how many tasks were handled.
    pub async fn poll_once(&self) -> Result<usize> {
        let topics = self.handlers.topics().await;
        if topics.is_empty() {
            bail!("no topics subscribed");
        }

        let request = FetchRequest {
            worker_id: self.options.worker_id.clone(),
            max_tasks: self.options.max_tasks,
            topics,
            lock_duration_ms: self.options.lock_duration.as_millis() as u64,
            poll_timeout_ms: self.options.poll_timeout.as_millis() as u64,
        };

        let tasks = self.broker.fetch(&request).await?;
        if tasks.is_empty() {
            debug!(topics = request.topics.len(), "poll returned no tasks");
            return Ok(0);
        }

        debug!(count = tasks.len(), "locked tasks");

        let timeout = self.options.handler_timeout;
        let futures: Vec<_> = tasks
            .into_iter()
            .map(|task| {
                let handlers = Arc::clone(&self.handlers);
                async move {
                    let outcome = match tokio::time::timeout(timeout, handlers.dispatch(&task)).await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            Outcome::Failed(format!("handler timed out after {:?}", timeout))
                        }
                    };
                    (task, outcome)
                }
            })
            .collect();

        let results = futures::future::join_all(futures).await;
        let handled = results.len();

        for (task, outcome) in results {
            self.report(&task, outcome).await;
        }

        Ok(handled)
    }

    /// Report one outcome to the broker. Report errors are logged, not
    /// propagated — the subscription outlives a flaky completion call.
    async fn report(&self, task: &Task, outcome: Outcome) {
        match outcome {
            Outcome::Completed(variables) => {
                info!(task = %task.id, topic = %task.topic, "task completed");
                if let Err(e) = self
                    .broker
                    .complete(&task.id, &self.options.worker_id, &variables)
                    .await
                {
                    warn!(task = %task.id, "could not report completion: {:#}", e);
                }
            }
            Outcome::Failed(message) => {
                let retries = self.remaining_retries(task);
                warn!(task = %task.id, topic = %task.topic, retries, "task failed: {}", message);
                if let Err(e) = self
                    .broker
                    .fail(
                        &task.id,
                        &self.options.worker_id,
                        &message,
                        retries,
                        self.options.retry_timeout.as_millis() as u64,
                    )
                    .await
                {
                    warn!(task = %task.id, "could not report failure: {:#}", e);
                }
            }
        }
    }

    /// Retries to report with a failure: one less than the service told us,
    /// or the configured default for a first delivery.
    fn remaining_retries(&self, task: &Task) -> u32 {
        match task.retries {
            Some(retries) => retries.saturating_sub(1),
            None => self.options.default_retries,
        }
    }

    /// Idle backoff with up to 20% jitter, so a fleet of workers doesn't
    /// poll in lockstep.
    fn idle_backoff_with_jitter(&self) -> Duration {
        let base = self.options.idle_backoff.as_millis() as u64;
        let jitter = rand::rng().random_range(0..=base / 5);
        Duration::from_millis(base + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::mock::MockBroker;

    fn worker(options: WorkerOptions) -> Worker {
        Worker::new(
            Arc::new(MockBroker::empty()),
            Arc::new(Registry::new()),
            options,
        )
    }

    fn task_with_retries(retries: Option<u32>) -> Task {
        Task {
            id: "t".to_string(),
            topic: "x".to_string(),
            variables: Default::default(),
            retries,
        }
    }

    #[test]
    fn retries_decrement_when_known() {
        let w = worker(WorkerOptions::default());
        assert_eq!(w.remaining_retries(&task_with_retries(Some(2))), 1);
        assert_eq!(w.remaining_retries(&task_with_retries(Some(0))), 0);
    }

    #[test]
    fn retries_default_on_first_delivery() {
        let w = worker(WorkerOptions {
            default_retries: 7,
            ..WorkerOptions::default()
        });
        assert_eq!(w.remaining_retries(&task_with_retries(None)), 7);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let w = worker(WorkerOptions {
            idle_backoff: Duration::from_millis(1000),
            ..WorkerOptions::default()
        });
        for _ in 0..50 {
            let backoff = w.idle_backoff_with_jitter();
            assert!(backoff >= Duration::from_millis(1000));
            assert!(backoff <= Duration::from_millis(1200));
        }
    }
}
