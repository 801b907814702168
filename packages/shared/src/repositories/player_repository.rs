use std::sync::Arc;
use std::time::Duration;

use crate::models::player::Player;
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::repositories::keys;
use crate::repositories::store::Store;

/// Where a player record was found.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedPlayer {
    Live(Player),
    /// Only the in-queue disconnect snapshot exists.
    Disconnected(Player),
}

impl ResolvedPlayer {
    pub fn player(&self) -> &Player {
        match self {
            ResolvedPlayer::Live(p) | ResolvedPlayer::Disconnected(p) => p,
        }
    }

    pub fn into_player(self) -> Player {
        match self {
            ResolvedPlayer::Live(p) | ResolvedPlayer::Disconnected(p) => p,
        }
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, ResolvedPlayer::Disconnected(_))
    }
}

#[derive(Clone)]
pub struct PlayerRepository {
    store: Arc<dyn Store>,
}

impl PlayerRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn read(&self, key: &str) -> Result<Option<Player>, RepositoryError> {
        match self.store.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write(
        &self,
        key: &str,
        player: &Player,
        ttl: Option<Duration>,
    ) -> Result<(), RepositoryError> {
        let raw = serde_json::to_string(player)?;
        self.store.set(key, &raw, ttl).await?;
        Ok(())
    }

    pub async fn get(&self, player_id: &str) -> Result<Option<Player>, RepositoryError> {
        self.read(&keys::player(player_id)).await
    }

    pub async fn save(&self, player: &Player) -> Result<(), RepositoryError> {
        self.write(&keys::player(&player.id), player, None).await
    }

    /// Writes only over an existing record.
    pub async fn update(&self, player: &Player) -> Result<(), RepositoryError> {
        let key = keys::player(&player.id);
        if self.store.get(&key).await?.is_none() {
            return Err(RepositoryError::NotFound(key));
        }
        self.write(&key, player, None).await
    }

    pub async fn remove(&self, player_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.store.delete(&keys::player(player_id)).await?)
    }

    pub async fn save_disconnected_in_queue(&self, player: &Player) -> Result<(), RepositoryError> {
        self.write(
            &keys::disconnected_in_queue(&player.id),
            player,
            Some(Duration::from_secs(keys::DISCONNECTED_IN_QUEUE_TTL_SECS)),
        )
        .await
    }

    pub async fn get_disconnected_in_queue(
        &self,
        player_id: &str,
    ) -> Result<Option<Player>, RepositoryError> {
        self.read(&keys::disconnected_in_queue(player_id)).await
    }

    pub async fn delete_disconnected_in_queue(
        &self,
        player_id: &str,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .store
            .delete(&keys::disconnected_in_queue(player_id))
            .await?)
    }

    pub async fn save_disconnected_in_game(&self, player: &Player) -> Result<(), RepositoryError> {
        self.write(&keys::disconnected_in_game(&player.session_id), player, None)
            .await
    }

    pub async fn get_disconnected_in_game(
        &self,
        session_id: &str,
    ) -> Result<Option<Player>, RepositoryError> {
        self.read(&keys::disconnected_in_game(session_id)).await
    }

    pub async fn delete_disconnected_in_game(
        &self,
        session_id: &str,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .store
            .delete(&keys::disconnected_in_game(session_id))
            .await?)
    }

    /// The live record, else the in-queue snapshot.
    pub async fn resolve(&self, player_id: &str) -> Result<Option<ResolvedPlayer>, RepositoryError> {
        if let Some(player) = self.get(player_id).await? {
            return Ok(Some(ResolvedPlayer::Live(player)));
        }
        Ok(self
            .get_disconnected_in_queue(player_id)
            .await?
            .map(ResolvedPlayer::Disconnected))
    }

    /// Persists wherever the player currently lives: the live record if there
    /// is one, otherwise the in-queue snapshot.
    pub async fn persist(&self, player: &Player) -> Result<(), RepositoryError> {
        match self.update(player).await {
            Err(RepositoryError::NotFound(_)) => self.save_disconnected_in_queue(player).await,
            other => other,
        }
    }
}
