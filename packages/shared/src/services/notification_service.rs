use std::sync::Arc;

use tracing::{debug, error};

use crate::models::messages::ServerMessage;
use crate::repositories::keys;
use crate::repositories::store::Store;

/// Pushes messages onto `player:{id}`. The hub delivers them if the player is
/// connected; otherwise they are dropped. Sending never fails the caller.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn Store>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn send(&self, player_id: &str, message: &ServerMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!(player_id = %player_id, "Failed to serialize message: {}", e);
                return;
            }
        };

        debug!(player_id = %player_id, "Sending notification: {}", payload);
        if let Err(e) = self
            .store
            .publish(&keys::player_topic(player_id), &payload)
            .await
        {
            error!(player_id = %player_id, "Failed to publish notification: {}", e);
        }
    }

    pub async fn send_all(&self, player_ids: &[&str], message: &ServerMessage) {
        for player_id in player_ids {
            self.send(player_id, message).await;
        }
    }
}
