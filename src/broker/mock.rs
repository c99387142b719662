use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::{Broker, FetchRequest, Task, Variables};

/// One outcome report made through the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Completed {
        task_id: String,
        variables: Variables,
    },
    Failed {
        task_id: String,
        message: String,
        retries: u32,
    },
}

/// A scripted broker for tests. Returns pre-defined task batches in order
/// (then empty batches forever) and records every report.
pub struct MockBroker {
    batches: Vec<Vec<Task>>,
    fetches: AtomicUsize,
    reports: Mutex<Vec<Report>>,
    reports_fail: bool,
}

impl MockBroker {
    pub fn new(batches: Vec<Vec<Task>>) -> Self {
        Self {
            batches,
            fetches: AtomicUsize::new(0),
            reports: Mutex::new(Vec::new()),
            reports_fail: false,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// A broker whose `complete`/`fail` calls error — for exercising the
    /// worker's report-error path.
    pub fn with_failing_reports(batches: Vec<Vec<Task>>) -> Self {
        Self {
            reports_fail: true,
            ..Self::new(batches)
        }
    }

    /// How many fetches were made.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Every report made so far, in order.
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Broker for MockBroker {
    async fn fetch(&self, _request: &FetchRequest) -> Result<Vec<Task>> {
        let i = self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.batches.get(i).cloned().unwrap_or_default())
    }

    async fn complete(&self, task_id: &str, _worker_id: &str, variables: &Variables) -> Result<()> {
        if self.reports_fail {
            bail!("mock broker: completion rejected");
        }
        self.reports.lock().unwrap().push(Report::Completed {
            task_id: task_id.to_string(),
            variables: variables.clone(),
        });
        Ok(())
    }

    async fn fail(
        &self,
        task_id: &str,
        _worker_id: &str,
        message: &str,
        retries: u32,
        _retry_timeout_ms: u64,
    ) -> Result<()> {
        if self.reports_fail {
            bail!("mock broker: failure rejected");
        }
        self.reports.lock().unwrap().push(Report::Failed {
            task_id: task_id.to_string(),
            message: message.to_string(),
            retries,
        });
        Ok(())
    }
}
