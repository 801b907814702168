use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::Instant;

use crate::repositories::errors::store_errors::StoreError;
use crate::repositories::store::{Store, StoreMessage, Subscription};

const TOPIC_CAPACITY: usize = 256;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// Single-process store with the same semantics as the Redis one.
/// Expiry follows the tokio clock so paused-time tests can advance it.
#[derive(Default)]
pub struct InMemoryStore {
    values: Mutex<HashMap<String, Entry>>,
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    topics: Mutex<HashMap<String, broadcast::Sender<StoreMessage>>>,
    /// Publish log for assertions; not kept outside tests.
    #[cfg(any(test, feature = "test-util"))]
    published: Mutex<Vec<StoreMessage>>,
    list_changed: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|e| StoreError::Command(format!("store lock poisoned: {}", e)))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_pop(&self, list: &str) -> Result<Option<String>, StoreError> {
        let mut lists = lock(&self.lists)?;
        let Some(entries) = lists.get_mut(list) else {
            return Ok(None);
        };
        let popped = entries.pop_front();
        if entries.is_empty() {
            lists.remove(list);
        }
        Ok(popped)
    }

    fn add(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut values = lock(&self.values)?;
        let current = match values.get(key) {
            Some(entry) if entry.is_live() => entry
                .value
                .parse::<i64>()
                .map_err(|_| StoreError::Command(format!("{} is not an integer", key)))?,
            _ => 0,
        };
        let next = current + delta;
        values.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at: None,
            },
        );
        Ok(next)
    }

    /// Snapshot of a list, head first.
    #[cfg(any(test, feature = "test-util"))]
    pub fn list(&self, list: &str) -> Vec<String> {
        self.lists
            .lock()
            .map(|lists| {
                lists
                    .get(list)
                    .map(|entries| entries.iter().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Every payload published on `topic` so far, oldest first.
    #[cfg(any(test, feature = "test-util"))]
    pub fn published(&self, topic: &str) -> Vec<String> {
        self.published
            .lock()
            .map(|published| {
                published
                    .iter()
                    .filter(|msg| msg.topic == topic)
                    .map(|msg| msg.payload.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut values = lock(&self.values)?;
        match values.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(entry.value.clone())),
            Some(_) => {
                values.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut values = lock(&self.values)?;
        values.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed_value = lock(&self.values)?
            .remove(key)
            .is_some_and(|entry| entry.is_live());
        let removed_list = lock(&self.lists)?.remove(key).is_some();
        Ok(removed_value || removed_list)
    }

    async fn push_back(&self, list: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.lists)?
            .entry(list.to_string())
            .or_default()
            .push_back(value.to_string());
        self.list_changed.notify_waiters();
        Ok(())
    }

    async fn blocking_pop_front(
        &self,
        list: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, StoreError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let notified = self.list_changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.try_pop(list)? {
                return Ok(Some(value));
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return self.try_pop(list);
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn remove_from_list(&self, list: &str, value: &str) -> Result<i64, StoreError> {
        let mut lists = lock(&self.lists)?;
        let Some(entries) = lists.get_mut(list) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.retain(|entry| entry != value);
        let removed = (before - entries.len()) as i64;
        if entries.is_empty() {
            lists.remove(list);
        }
        Ok(removed)
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.add(key, 1)
    }

    async fn decr(&self, key: &str) -> Result<i64, StoreError> {
        self.add(key, -1)
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), StoreError> {
        let msg = StoreMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
        };
        #[cfg(any(test, feature = "test-util"))]
        lock(&self.published)?.push(msg.clone());

        let mut senders = lock(&self.topics)?;
        if let Some(sender) = senders.get(topic) {
            // No receivers is fine; pub/sub is fire-and-forget.
            if sender.send(msg).is_err() {
                senders.remove(topic);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topics: &[String]) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel(TOPIC_CAPACITY);
        let mut receivers = Vec::with_capacity(topics.len());
        {
            let mut senders = lock(&self.topics)?;
            senders.retain(|_, sender| sender.receiver_count() > 0);
            for topic in topics {
                let sender = senders
                    .entry(topic.clone())
                    .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0);
                receivers.push(sender.subscribe());
            }
        }

        let tasks = receivers
            .into_iter()
            .map(|mut receiver| {
                let tx = tx.clone();
                tokio::spawn(async move {
                    loop {
                        match receiver.recv().await {
                            Ok(msg) => {
                                if tx.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                })
            })
            .collect();

        Ok(Subscription::new(rx, tasks))
    }
}
