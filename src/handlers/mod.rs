pub mod lead;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::broker::{Task, Variables};

/// What dispatching one task produced. Handler errors are information
/// here, not crashes — they become failure reports to the service.
#[derive(Debug, Clone)]
pub enum Outcome {
    Completed(Variables),
    Failed(String),
}

/// Something the worker can do with a task. Gets the task's variables,
/// returns the output variables for the completion report.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, task: &Task) -> Result<Variables>;
}

/// Wrap a plain async function as a [`Handler`], so a closure can be
/// subscribed directly.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Variables>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Task) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Variables>> + Send,
{
    async fn handle(&self, task: &Task) -> Result<Variables> {
        (self.0)(task.clone()).await
    }
}

/// Holds the handler subscribed to each topic. RwLock allows runtime
/// subscription + parallel dispatch.
pub struct Registry {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe a handler to a topic. Replaces any previous handler for
    /// the same topic.
    pub async fn subscribe(
        &self,
        topic: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Result<()> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            bail!("topic name must not be empty");
        }
        self.handlers.write().await.insert(topic, handler);
        Ok(())
    }

    pub async fn unsubscribe(&self, topic: &str) {
        self.handlers.write().await.remove(topic);
    }

    /// The subscribed topic names, sorted so fetch requests are stable.
    pub async fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Dispatch a task to its topic's handler.
    pub async fn dispatch(&self, task: &Task) -> Outcome {
        let handlers = self.handlers.read().await;
        match handlers.get(&task.topic) {
            Some(handler) => match handler.handle(task).await {
                Ok(variables) => Outcome::Completed(variables),
                Err(e) => Outcome::Failed(format!("{:#}", e)),
            },
            None => Outcome::Failed(format!("no handler subscribed to topic: {}", task.topic)),
        }
    }
}
