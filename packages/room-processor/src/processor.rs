use std::sync::Arc;
use std::time::Duration;

use shared::config::AppConfig;
use shared::models::player::{Player, VALID_BET_AMOUNTS};
use shared::repositories::keys;
use shared::repositories::player_repository::PlayerRepository;
use shared::repositories::queue_repository::QueueRepository;
use shared::repositories::store::Store;
use shared::services::wallet_service::WalletService;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::services::{
    matchmaking_service::{MatchmakingService, PairingOutcome},
    room_service::RoomService,
};

const ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoomList {
    Ready,
    Leave,
}

#[derive(Clone)]
pub struct RoomProcessor {
    store: Arc<dyn Store>,
    matchmaking: MatchmakingService,
    rooms: RoomService,
    variant: String,
}

impl RoomProcessor {
    pub fn new(store: Arc<dyn Store>, wallet: WalletService, config: &AppConfig) -> Self {
        let rooms = RoomService::new(
            store.clone(),
            wallet,
            &config.game_name,
            config.room_countdown_secs,
        );
        let matchmaking = MatchmakingService::new(
            PlayerRepository::new(store.clone()),
            QueueRepository::new(store.clone(), &config.game_name),
            rooms.clone(),
            config.queue_pair_timeout,
        );
        Self {
            store,
            matchmaking,
            rooms,
            variant: config.game_name.clone(),
        }
    }

    /// Runs one worker per bet bucket plus the ready and leave consumers.
    /// Only returns if every worker has stopped.
    pub async fn run(self) {
        let mut workers = JoinSet::new();

        for bet in VALID_BET_AMOUNTS {
            workers.spawn(self.clone().run_bet_worker(bet));
        }
        workers.spawn(
            self.clone()
                .run_list_consumer(keys::ready_queue(&self.variant), RoomList::Ready),
        );
        workers.spawn(
            self.clone()
                .run_list_consumer(keys::LEAVE_ROOM.to_string(), RoomList::Leave),
        );

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!("Room worker stopped: {}", e);
            }
        }
    }

    async fn run_bet_worker(self, bet: f64) {
        info!(bet, "Matchmaking worker started");
        loop {
            match self.matchmaking.pair_once(bet).await {
                Ok(PairingOutcome::Paired { room_id }) => {
                    debug!(bet, room_id = %room_id, "Pairing complete");
                }
                Ok(PairingOutcome::Dropped { player_id }) => {
                    debug!(bet, player_id = %player_id, "Dropped stale queue entry");
                }
                Ok(PairingOutcome::Requeued { .. }) | Ok(PairingOutcome::Idle) => {}
                Err(e) => {
                    error!(bet, "Matchmaking failed: {}", e);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    async fn run_list_consumer(self, list: String, kind: RoomList) {
        info!(list = %list, "Consumer started");
        loop {
            match self.store.blocking_pop_front(&list, None).await {
                Ok(Some(raw)) => self.process_entry(kind, &raw).await,
                Ok(None) => {}
                Err(e) => {
                    error!(list = %list, "Failed to pop: {}", e);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    async fn process_entry(&self, kind: RoomList, raw: &str) {
        let player: Player = match serde_json::from_str(raw) {
            Ok(player) => player,
            Err(e) => {
                warn!("Discarding malformed {:?} entry: {}", kind, e);
                return;
            }
        };

        let result = match kind {
            RoomList::Ready => self.rooms.forward_ready_signal(&player).await,
            RoomList::Leave => self.rooms.forward_leave_signal(&player).await,
        };
        if let Err(e) = result {
            error!(player_id = %player.id, "Failed to forward {:?} entry: {}", kind, e);
        }
    }
}
