use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use shared::models::game::Move;
use shared::models::player::Player;
use shared::models::room::Room;
use shared::repositories::keys;
use shared::repositories::store::Store;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::services::errors::GameServiceError;
use crate::services::game_service::GameService;

const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// The lists this processor drains, one consumer each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameList {
    CreateGame,
    MovePiece,
    LeaveGame,
    DisconnectGame,
    ReconnectGame,
}

impl GameList {
    pub const ALL: [GameList; 5] = [
        GameList::CreateGame,
        GameList::MovePiece,
        GameList::LeaveGame,
        GameList::DisconnectGame,
        GameList::ReconnectGame,
    ];

    pub fn key(self, variant: &str) -> String {
        match self {
            GameList::CreateGame => keys::create_game(variant),
            GameList::MovePiece => keys::move_piece(variant),
            GameList::LeaveGame => keys::leave_game(variant),
            GameList::DisconnectGame => keys::disconnect_game(variant),
            GameList::ReconnectGame => keys::reconnect_game(variant),
        }
    }
}

#[derive(Clone)]
pub struct GameProcessor {
    store: Arc<dyn Store>,
    service: GameService,
    variant: String,
}

fn decode<T: DeserializeOwned>(list: GameList, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Discarding malformed {:?} entry: {}", list, e);
            None
        }
    }
}

impl GameProcessor {
    pub fn new(store: Arc<dyn Store>, service: GameService, variant: &str) -> Self {
        Self {
            store,
            service,
            variant: variant.to_string(),
        }
    }

    pub async fn run(self) {
        let mut consumers = JoinSet::new();
        for list in GameList::ALL {
            consumers.spawn(self.clone().consume(list));
        }

        while let Some(result) = consumers.join_next().await {
            if let Err(e) = result {
                error!("Game consumer stopped: {}", e);
            }
        }
    }

    async fn consume(self, list: GameList) {
        let key = list.key(&self.variant);
        info!(list = %key, "Consumer started");
        loop {
            match self.store.blocking_pop_front(&key, None).await {
                Ok(Some(raw)) => {
                    if let Err(e) = self.process_entry(list, &raw).await {
                        error!(list = %key, "Failed to process entry: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!(list = %key, "Failed to pop: {}", e);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    pub async fn process_entry(&self, list: GameList, raw: &str) -> Result<(), GameServiceError> {
        match list {
            GameList::CreateGame => {
                if let Some(room) = decode::<Room>(list, raw) {
                    self.service.create_game(room).await?;
                }
            }
            GameList::MovePiece => {
                if let Some(mv) = decode::<Move>(list, raw) {
                    self.service.process_move(mv).await?;
                }
            }
            GameList::LeaveGame => {
                if let Some(player) = decode::<Player>(list, raw) {
                    self.service.handle_leave_game(&player).await?;
                }
            }
            GameList::DisconnectGame => {
                if let Some(player) = decode::<Player>(list, raw) {
                    self.service.handle_disconnect(player).await?;
                }
            }
            GameList::ReconnectGame => {
                if let Some(player) = decode::<Player>(list, raw) {
                    self.service.handle_reconnect(player).await?;
                }
            }
        }
        Ok(())
    }
}
