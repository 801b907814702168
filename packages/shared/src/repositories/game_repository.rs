use std::collections::HashMap;
use std::sync::Arc;

use crate::models::game::Game;
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::repositories::keys;
use crate::repositories::store::Store;

/// Games are stored whole; the per-player clocks live under their own key so
/// the timer never rewrites the board or turn.
#[derive(Clone)]
pub struct GameRepository {
    store: Arc<dyn Store>,
}

impl GameRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn timers(&self, game_id: &str) -> Result<HashMap<String, i64>, RepositoryError> {
        match self.store.get(&keys::game_timers(game_id)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(HashMap::new()),
        }
    }

    pub async fn get(&self, game_id: &str) -> Result<Option<Game>, RepositoryError> {
        let Some(raw) = self.store.get(&keys::game(game_id)).await? else {
            return Ok(None);
        };
        let mut game: Game = serde_json::from_str(&raw)?;
        for (player_id, timer) in self.timers(game_id).await? {
            game.set_player_timer(&player_id, timer);
        }
        Ok(Some(game))
    }

    pub async fn save(&self, game: &Game) -> Result<(), RepositoryError> {
        let raw = serde_json::to_string(game)?;
        self.store.set(&keys::game(&game.id), &raw, None).await?;
        Ok(())
    }

    pub async fn update(&self, game: &Game) -> Result<(), RepositoryError> {
        let key = keys::game(&game.id);
        if self.store.get(&key).await?.is_none() {
            return Err(RepositoryError::NotFound(key));
        }
        self.save(game).await
    }

    /// `true` only for the caller that actually removed the record.
    pub async fn remove(&self, game_id: &str) -> Result<bool, RepositoryError> {
        let removed = self.store.delete(&keys::game(game_id)).await?;
        self.store.delete(&keys::game_timers(game_id)).await?;
        Ok(removed)
    }

    /// Only the game's timer actor writes here, so the read-modify-write of
    /// the clocks key has a single writer.
    pub async fn update_player_timer(
        &self,
        game_id: &str,
        player_id: &str,
        timer: i64,
    ) -> Result<(), RepositoryError> {
        let key = keys::game(game_id);
        if self.store.get(&key).await?.is_none() {
            return Err(RepositoryError::NotFound(key));
        }

        let mut timers = self.timers(game_id).await?;
        timers.insert(player_id.to_string(), timer);
        let raw = serde_json::to_string(&timers)?;
        self.store
            .set(&keys::game_timers(game_id), &raw, None)
            .await?;
        Ok(())
    }
}
