pub mod camunda;
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Named variables attached to a task or a completion.
pub type Variables = Map<String, Value>;

/// A unit of work delivered by the orchestration service. Borrowed by the
/// handler, reported back, never persisted.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub topic: String,
    pub variables: Variables,
    /// Remaining retries as reported by the service, if it reported any.
    pub retries: Option<u32>,
}

/// One fetch-and-lock request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub worker_id: String,
    pub max_tasks: usize,
    pub topics: Vec<String>,
    pub lock_duration_ms: u64,
    /// How long the service should hold an empty fetch open (long poll).
    pub poll_timeout_ms: u64,
}

/// The connection to the orchestration service. Could be a Camunda Cloud
/// cluster, a self-hosted engine, or a test script.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Fetch and lock up to `max_tasks` tasks on the given topics.
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Task>>;

    /// Report successful completion with the handler's output variables.
    async fn complete(&self, task_id: &str, worker_id: &str, variables: &Variables) -> Result<()>;

    /// Report handler failure with the retries the service should keep and
    /// the backoff before redelivery.
    async fn fail(
        &self,
        task_id: &str,
        worker_id: &str,
        message: &str,
        retries: u32,
        retry_timeout_ms: u64,
    ) -> Result<()>;
}
