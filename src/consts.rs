//! Project-wide defaults.

use std::time::Duration;

/// Worker id reported to the broker when none is configured.
pub const DEFAULT_WORKER_ID: &str = "courier";

/// Camunda Cloud OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://login.cloud.camunda.io/oauth/token";

/// OAuth audience accepted by Camunda Cloud clusters.
pub const DEFAULT_TOKEN_AUDIENCE: &str = "zeebe.camunda.io";

/// Tasks locked per fetch.
pub const DEFAULT_MAX_TASKS: usize = 10;

/// How long a fetched task stays locked to us before the service hands it
/// to someone else.
pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(60);

/// How long the service holds an empty fetch open (long poll).
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(20);

/// Per-task handler budget. A slower handler is failed, not awaited.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Retries reported with a failure when the service didn't tell us how many
/// are left.
pub const DEFAULT_RETRIES: u32 = 3;

/// Backoff the service should apply before redelivering a failed task.
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(10);

/// Sleep between polls that returned no work.
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_secs(5);

/// Broker base address for a Camunda Cloud cluster.
pub fn cluster_address(cluster_id: &str, region: &str) -> String {
    format!("https://{}.{}.zeebe.camunda.io", cluster_id, region)
}
