use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::messages::QueueCountEntry;
use crate::models::player::{Player, VALID_BET_AMOUNTS};
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::repositories::keys;
use crate::repositories::store::Store;

/// What sits in a bet bucket. Deterministic, so the exact entry can be
/// removed again on `leave_queue`; workers re-read the player on pop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub player_id: String,
    pub selected_bet: f64,
}

impl QueueEntry {
    pub fn for_player(player: &Player) -> Self {
        QueueEntry {
            player_id: player.id.clone(),
            selected_bet: player.selected_bet,
        }
    }
}

#[derive(Clone)]
pub struct QueueRepository {
    store: Arc<dyn Store>,
    variant: String,
}

impl QueueRepository {
    pub fn new(store: Arc<dyn Store>, variant: &str) -> Self {
        Self {
            store,
            variant: variant.to_string(),
        }
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub async fn push(&self, player: &Player) -> Result<(), RepositoryError> {
        let raw = serde_json::to_string(&QueueEntry::for_player(player))?;
        self.store
            .push_back(&keys::queue(&self.variant, player.selected_bet), &raw)
            .await?;
        Ok(())
    }

    pub async fn pop(
        &self,
        bet: f64,
        timeout: Option<Duration>,
    ) -> Result<Option<QueueEntry>, RepositoryError> {
        let popped = self
            .store
            .blocking_pop_front(&keys::queue(&self.variant, bet), timeout)
            .await?;
        match popped {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn remove(&self, player: &Player) -> Result<i64, RepositoryError> {
        let raw = serde_json::to_string(&QueueEntry::for_player(player))?;
        Ok(self
            .store
            .remove_from_list(&keys::queue(&self.variant, player.selected_bet), &raw)
            .await?)
    }

    pub async fn increment_count(&self, bet: f64) -> Result<i64, RepositoryError> {
        Ok(self.store.incr(&keys::queue_count(&self.variant, bet)).await?)
    }

    pub async fn decrement_count(&self, bet: f64) -> Result<i64, RepositoryError> {
        Ok(self.store.decr(&keys::queue_count(&self.variant, bet)).await?)
    }

    /// Approximate: maintained by increments, so it can drift after a crash.
    pub async fn count(&self, bet: f64) -> Result<i64, RepositoryError> {
        let raw = self.store.get(&keys::queue_count(&self.variant, bet)).await?;
        Ok(raw
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(0)
            .max(0))
    }

    pub async fn counts(&self) -> Result<Vec<QueueCountEntry>, RepositoryError> {
        let mut counts = Vec::with_capacity(VALID_BET_AMOUNTS.len());
        for bet in VALID_BET_AMOUNTS {
            counts.push(QueueCountEntry {
                bet_value: bet,
                count: self.count(bet).await?,
            });
        }
        Ok(counts)
    }
}
