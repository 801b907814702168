use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::repositories::errors::store_errors::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreMessage {
    pub topic: String,
    pub payload: String,
}

/// Messages from one or more topics. Dropping it unsubscribes.
pub struct Subscription {
    rx: mpsc::Receiver<StoreMessage>,
    tasks: Vec<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<StoreMessage>, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { rx, tasks }
    }

    /// `None` once every forwarding task has stopped.
    pub async fn recv(&mut self) -> Option<StoreMessage> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// The shared store every worker coordinates through: records, FIFO lists,
/// counters and fan-out topics.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Returns whether something was actually removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn push_back(&self, list: &str, value: &str) -> Result<(), StoreError>;

    /// Waits for the head of `list`. `None` timeout waits forever; on timeout
    /// the result is `Ok(None)`.
    async fn blocking_pop_front(
        &self,
        list: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, StoreError>;

    /// Removes every entry equal to `value`, returning how many went.
    async fn remove_from_list(&self, list: &str, value: &str) -> Result<i64, StoreError>;

    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    async fn decr(&self, key: &str) -> Result<i64, StoreError>;

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), StoreError>;

    /// The subscription is live when this returns.
    async fn subscribe(&self, topics: &[String]) -> Result<Subscription, StoreError>;
}
