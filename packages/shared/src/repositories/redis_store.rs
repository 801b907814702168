use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{AsyncCommands, AsyncConnectionConfig, Client};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::repositories::errors::store_errors::StoreError;
use crate::repositories::store::{Store, StoreMessage, Subscription};

const SUBSCRIPTION_BUFFER: usize = 64;

pub struct RedisStore {
    client: Client,
    manager: ConnectionManager,
    /// One parked connection per list; a BLPOP holds its connection until it
    /// returns, so these never serve other commands.
    blocking: Mutex<HashMap<String, MultiplexedConnection>>,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Connection(format!("Invalid REDIS_URL: {}", e)))?;
        let manager = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!("Connected to Redis");
        Ok(Self {
            client,
            manager,
            blocking: Mutex::new(HashMap::new()),
        })
    }

    async fn blocking_connection(&self, list: &str) -> Result<MultiplexedConnection, StoreError> {
        if let Some(conn) = self.blocking.lock().await.remove(list) {
            return Ok(conn);
        }
        // The default response timeout would cut every wait short.
        let config = AsyncConnectionConfig::new().set_response_timeout(None);
        self.client
            .get_multiplexed_async_connection_with_config(&config)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn push_back(&self, list: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.rpush::<_, _, ()>(list, value).await?;
        Ok(())
    }

    async fn blocking_pop_front(
        &self,
        list: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, StoreError> {
        let mut conn = self.blocking_connection(list).await?;
        let secs = timeout.map(|t| t.as_secs_f64()).unwrap_or(0.0);
        let popped: Option<(String, String)> = conn.blpop(list, secs).await?;
        // A failed connection is dropped so the next pop dials a fresh one.
        self.blocking.lock().await.insert(list.to_string(), conn);
        Ok(popped.map(|(_, value)| value))
    }

    async fn remove_from_list(&self, list: &str, value: &str) -> Result<i64, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.lrem(list, 0, value).await?)
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.incr(key, 1).await?)
    }

    async fn decr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.decr(key, 1).await?)
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.publish::<_, _, ()>(topic, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, topics: &[String]) -> Result<Subscription, StoreError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        for topic in topics {
            pubsub.subscribe(topic).await?;
        }

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let task = tokio::spawn(async move {
            let mut stream = pubsub.into_on_message();
            while let Some(msg) = stream.next().await {
                let topic = msg.get_channel_name().to_string();
                let Ok(payload) = msg.get_payload::<String>() else {
                    warn!(topic = %topic, "Dropping non-UTF8 pubsub payload");
                    continue;
                };
                if tx.send(StoreMessage { topic, payload }).await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::new(rx, vec![task]))
    }
}
