use std::sync::Arc;

use rand::Rng;
use tracing::{debug, error, info, warn};

use shared::{
    models::{
        messages::{PairedPayload, ServerMessage},
        player::{to_major_units, to_minor_units, Player},
        presence::PlayerStatus,
        room::{Room, RoomSignal},
    },
    repositories::{
        errors::repository_errors::RepositoryError,
        keys,
        player_repository::{PlayerRepository, ResolvedPlayer},
        queue_repository::QueueRepository,
        room_repository::RoomRepository,
        store::Store,
    },
    services::{
        errors::wallet_errors::WalletError,
        notification_service::NotificationService,
        wallet_service::{calculate_win_amount, WalletService},
    },
};

use crate::services::{errors::RoomServiceError, ready_check::ReadyCheckActor};

/// Whether the ready-check for a room should keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomFlow {
    Continue,
    Close,
}

#[derive(Clone)]
pub struct RoomService {
    store: Arc<dyn Store>,
    players: PlayerRepository,
    rooms: RoomRepository,
    queue: QueueRepository,
    notifier: NotificationService,
    wallet: WalletService,
    countdown_secs: i64,
}

impl RoomService {
    pub fn new(
        store: Arc<dyn Store>,
        wallet: WalletService,
        variant: &str,
        countdown_secs: i64,
    ) -> Self {
        RoomService {
            players: PlayerRepository::new(store.clone()),
            rooms: RoomRepository::new(store.clone()),
            queue: QueueRepository::new(store.clone(), variant),
            notifier: NotificationService::new(store.clone()),
            store,
            wallet,
            countdown_secs,
        }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    /// Creates the room for a freshly popped pair and starts its ready-check.
    /// Any failure before the hand-off puts both players back online.
    pub async fn handle_queue_paired(
        &self,
        player1: ResolvedPlayer,
        player2: ResolvedPlayer,
        bet: f64,
    ) -> Result<Room, RoomServiceError> {
        for _ in 0..2 {
            if let Err(e) = self.queue.decrement_count(bet).await {
                warn!(bet, "Failed to decrement queue count: {}", e);
            }
        }

        let first_player_id = {
            let mut rng = rand::thread_rng();
            if rng.gen_bool(0.5) {
                player1.player().id.clone()
            } else {
                player2.player().id.clone()
            }
        };

        debug!(
            player1_offline = player1.is_disconnected(),
            player2_offline = player2.is_disconnected(),
            "Pairing players"
        );
        let mut room = Room::new(player1.into_player(), player2.into_player(), bet, &first_player_id);

        match self.open_room(&mut room).await {
            Ok(()) => {
                info!(
                    room_id = %room.id,
                    "Paired {} with {} for bet {}",
                    room.player1.id, room.player2.id, bet
                );
                Ok(room)
            }
            Err(e) => {
                error!(room_id = %room.id, "Failed to open room: {}", e);
                self.rollback_pairing(&room).await;
                Err(e)
            }
        }
    }

    async fn open_room(&self, room: &mut Room) -> Result<(), RoomServiceError> {
        let room_id = room.id.clone();
        for player in [&mut room.player1, &mut room.player2] {
            player.update_status(PlayerStatus::InRoom)?;
            player.room_id = room_id.clone();
        }

        self.rooms.save(room).await?;
        self.players.persist(&room.player1).await?;
        self.players.persist(&room.player2).await?;

        // Subscribed before anyone is told about the room.
        ReadyCheckActor::start(self.clone(), &room.id, self.countdown_secs).await?;

        self.send_paired(room, &room.player1.id, self.countdown_secs)
            .await;
        self.send_paired(room, &room.player2.id, self.countdown_secs)
            .await;
        Ok(())
    }

    async fn rollback_pairing(&self, room: &Room) {
        for player in [&room.player1, &room.player2] {
            if let Err(e) = self.release_player(player.clone()).await {
                error!(player_id = %player.id, "Failed to roll back player: {}", e);
            }
            self.notifier
                .send(&player.id, &ServerMessage::error("Failed to create room"))
                .await;
        }
        if let Err(e) = self.rooms.remove(&room.id).await {
            error!(room_id = %room.id, "Failed to remove room during rollback: {}", e);
        }
    }

    async fn send_paired(&self, room: &Room, player_id: &str, timer: i64) {
        let Some(opponent) = room.opponent(player_id) else {
            return;
        };
        let win = calculate_win_amount(
            to_minor_units(room.bet_value),
            room.operator_identifier.win_factor,
        );
        let payload = PairedPayload {
            color: room.color_of(player_id),
            opponent: opponent.name.clone(),
            room_id: room.id.clone(),
            winnings: to_major_units(win),
            timer,
        };
        self.notifier
            .send(player_id, &ServerMessage::Paired(payload))
            .await;
    }

    /// Back to the lobby. Players only known through their disconnect
    /// snapshot simply lose it.
    async fn release_player(&self, mut player: Player) -> Result<(), RoomServiceError> {
        player.set_status_online();
        match self.players.update(&player).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound(_)) => {
                self.players.delete_disconnected_in_queue(&player.id).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Puts a player from a room back at the tail of their bet bucket.
    pub async fn add_player_to_queue(&self, mut player: Player) -> Result<(), RoomServiceError> {
        player.set_status_online();
        player.update_status(PlayerStatus::InQueue)?;

        self.players.persist(&player).await?;
        self.queue.push(&player).await?;
        self.queue.increment_count(player.selected_bet).await?;

        info!(player_id = %player.id, bet = player.selected_bet, "Player re-queued");
        self.notifier
            .send(&player.id, &ServerMessage::QueueConfirmation(true))
            .await;
        Ok(())
    }

    async fn load_room(&self, room_id: &str) -> Result<Room, RoomServiceError> {
        self.rooms
            .get(room_id)
            .await?
            .ok_or_else(|| RoomServiceError::RoomNotFound(room_id.to_string()))
    }

    pub async fn handle_player_ready(
        &self,
        room_id: &str,
        player_id: &str,
    ) -> Result<RoomFlow, RoomServiceError> {
        let mut room = self.load_room(room_id).await?;
        if !room.has_player(player_id) {
            return Err(RoomServiceError::PlayerNotInRoom(player_id.to_string()));
        }

        room.set_player_status(player_id, PlayerStatus::InRoomReady);
        self.rooms.update(&room).await?;

        if !room.both_ready() {
            if let Some(opponent) = room.opponent(player_id) {
                self.notifier
                    .send(&opponent.id, &ServerMessage::OpponentReady { is_ready: true })
                    .await;
            }
            self.notifier
                .send(player_id, &ServerMessage::info("Waiting for opponent"))
                .await;
            return Ok(RoomFlow::Continue);
        }

        self.collect_bets(&room).await
    }

    /// Takes both stakes, player1 first. A failed second stake refunds the
    /// first one.
    async fn collect_bets(&self, room: &Room) -> Result<RoomFlow, RoomServiceError> {
        let amount = to_minor_units(room.bet_value);

        if let Err(e) = self.post_stake(&room.player1, amount, &room.id).await {
            warn!(room_id = %room.id, player_id = %room.player1.id, "Bet failed: {}", e);
            self.abort_room(room, &room.player1.id).await?;
            return Ok(RoomFlow::Close);
        }

        if let Err(e) = self.post_stake(&room.player2, amount, &room.id).await {
            warn!(room_id = %room.id, player_id = %room.player2.id, "Bet failed: {}", e);
            self.refund_stake(&room.player1, amount, &room.id).await;
            self.abort_room(room, &room.player2.id).await?;
            return Ok(RoomFlow::Close);
        }

        self.rooms
            .enqueue_create_game(self.queue.variant(), room)
            .await?;
        self.store
            .publish(&keys::room_topic(&room.id), &RoomSignal::GameStart.to_string())
            .await?;

        info!(room_id = %room.id, "Stakes collected, room handed to game workers");
        Ok(RoomFlow::Close)
    }

    async fn post_stake(&self, player: &Player, amount: i64, round_id: &str) -> Result<(), WalletError> {
        let balance = self
            .wallet
            .place_bet(&player.session_id, amount, round_id)
            .await?;
        self.notifier
            .send(&player.id, &ServerMessage::BalanceUpdate(to_major_units(balance)))
            .await;
        Ok(())
    }

    async fn refund_stake(&self, player: &Player, amount: i64, round_id: &str) {
        match self.wallet.refund(&player.session_id, amount, round_id).await {
            Ok(balance) => {
                self.notifier
                    .send(&player.id, &ServerMessage::BalanceUpdate(to_major_units(balance)))
                    .await;
            }
            Err(e) => {
                error!(
                    player_id = %player.id,
                    round_id = %round_id,
                    amount,
                    "Refund failed, stake must be returned manually: {}", e
                );
            }
        }
    }

    /// After a failed stake: the failing player goes online, the other one
    /// goes back to the queue.
    async fn abort_room(&self, room: &Room, failing_player_id: &str) -> Result<(), RoomServiceError> {
        self.rooms.remove(&room.id).await?;

        for player in [&room.player1, &room.player2] {
            let Some(current) = self.players.resolve(&player.id).await? else {
                continue;
            };
            if player.id == failing_player_id {
                self.release_player(current.into_player()).await?;
                self.notifier
                    .send(&player.id, &ServerMessage::error("Bet could not be placed"))
                    .await;
            } else {
                self.notifier
                    .send(&player.id, &ServerMessage::RoomFailedReadyCheck(true))
                    .await;
                self.add_player_to_queue(current.into_player()).await?;
            }
        }
        Ok(())
    }

    pub async fn handle_player_unready(
        &self,
        room_id: &str,
        player_id: &str,
    ) -> Result<RoomFlow, RoomServiceError> {
        let mut room = self.load_room(room_id).await?;
        if !room.has_player(player_id) {
            return Err(RoomServiceError::PlayerNotInRoom(player_id.to_string()));
        }

        room.set_player_status(player_id, PlayerStatus::InRoom);
        self.rooms.update(&room).await?;

        if let Some(opponent) = room.opponent(player_id) {
            self.notifier
                .send(&opponent.id, &ServerMessage::OpponentReady { is_ready: false })
                .await;
        }
        self.notifier
            .send(player_id, &ServerMessage::info("Marked as not ready"))
            .await;
        Ok(RoomFlow::Continue)
    }

    pub async fn handle_leave_room(
        &self,
        room_id: &str,
        leaver_id: &str,
    ) -> Result<RoomFlow, RoomServiceError> {
        let Some(room) = self.rooms.get(room_id).await? else {
            return Ok(RoomFlow::Close);
        };
        if !room.has_player(leaver_id) {
            return Err(RoomServiceError::PlayerNotInRoom(leaver_id.to_string()));
        }
        self.rooms.remove(room_id).await?;

        if let Some(leaver) = self.players.resolve(leaver_id).await? {
            self.release_player(leaver.into_player()).await?;
            self.notifier
                .send(leaver_id, &ServerMessage::info("You left the room"))
                .await;
        }

        if let Some(opponent) = room.opponent(leaver_id) {
            if let Some(resolved) = self.players.resolve(&opponent.id).await? {
                let was_ready = resolved.player().status == PlayerStatus::InRoomReady;
                if !was_ready && !resolved.is_disconnected() {
                    self.notifier
                        .send(&opponent.id, &ServerMessage::OpponentLeftRoom(true))
                        .await;
                }
                self.add_player_to_queue(resolved.into_player()).await?;
            }
        }

        info!(room_id = %room_id, player_id = %leaver_id, "Player left room");
        Ok(RoomFlow::Close)
    }

    /// Ready-check ran out or was ended explicitly. Ready players keep their
    /// place in the queue; everyone else goes back online.
    pub async fn handle_end_room(&self, room_id: &str) -> Result<RoomFlow, RoomServiceError> {
        let Some(room) = self.rooms.get(room_id).await? else {
            return Ok(RoomFlow::Close);
        };
        self.rooms.remove(room_id).await?;

        for player_id in [&room.player1.id, &room.player2.id] {
            let outcome = match self.players.resolve(player_id).await {
                Ok(Some(resolved)) if resolved.player().status == PlayerStatus::InRoomReady => {
                    self.add_player_to_queue(resolved.into_player()).await
                }
                Ok(Some(resolved)) => {
                    let released = self.release_player(resolved.into_player()).await;
                    self.notifier
                        .send(player_id, &ServerMessage::RoomFailedReadyCheck(true))
                        .await;
                    released
                }
                Ok(None) => {
                    debug!(player_id = %player_id, "Player no longer known, nothing to restore");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            };
            if let Err(e) = outcome {
                error!(room_id = %room_id, player_id = %player_id, "Failed to settle player: {}", e);
            }
        }

        info!(room_id = %room_id, "Room ended");
        Ok(RoomFlow::Close)
    }

    /// Re-sends the room state to a player whose connection came back.
    pub async fn handle_reconnect(
        &self,
        room_id: &str,
        player_id: &str,
        remaining: i64,
    ) -> Result<RoomFlow, RoomServiceError> {
        let room = self.load_room(room_id).await?;
        if !room.has_player(player_id) {
            return Err(RoomServiceError::PlayerNotInRoom(player_id.to_string()));
        }

        self.send_paired(&room, player_id, remaining).await;
        if let Some(opponent) = room.opponent(player_id) {
            if room.is_player_ready(&opponent.id) {
                self.notifier
                    .send(player_id, &ServerMessage::OpponentReady { is_ready: true })
                    .await;
            }
        }
        Ok(RoomFlow::Continue)
    }

    pub async fn broadcast_timer(&self, room_id: &str, remaining: i64) -> Result<(), RoomServiceError> {
        let room = self.load_room(room_id).await?;
        let message = ServerMessage::RoomTimer(remaining.to_string());
        self.notifier
            .send_all(&[&room.player1.id, &room.player2.id], &message)
            .await;
        Ok(())
    }

    /// Turns a ready/unready toggle from the command workers into a room signal.
    pub async fn forward_ready_signal(&self, player: &Player) -> Result<(), RoomServiceError> {
        let signal = match player.status {
            PlayerStatus::InRoomReady => RoomSignal::PlayerReady(player.id.clone()),
            PlayerStatus::InRoom => RoomSignal::PlayerUnready(player.id.clone()),
            other => {
                warn!(player_id = %player.id, status = %other, "Ignoring ready toggle outside a room");
                return Ok(());
            }
        };
        self.publish_signal(&player.room_id, signal).await
    }

    pub async fn forward_leave_signal(&self, player: &Player) -> Result<(), RoomServiceError> {
        self.publish_signal(&player.room_id, RoomSignal::LeaveRoom(player.id.clone()))
            .await
    }

    async fn publish_signal(&self, room_id: &str, signal: RoomSignal) -> Result<(), RoomServiceError> {
        if room_id.is_empty() {
            return Err(RoomServiceError::RoomNotFound(String::new()));
        }
        self.store
            .publish(&keys::room_topic(room_id), &signal.to_string())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use shared::models::player::OperatorIdentifier;
    use shared::models::session::Session;
    use shared::repositories::memory_store::InMemoryStore;
    use shared::repositories::session_repository::SessionRepository;
    use shared::services::history_service::HistoryService;
    use shared::repositories::history_repository::LogGameHistoryRepository;
    use shared::services::wallet_service::{OperatorWallet, WalletRegistry, TEST_OPERATOR};

    mock! {
        pub Wallet {}

        #[async_trait]
        impl OperatorWallet for Wallet {
            async fn post_bet(&self, session: &Session, amount: i64, round_id: &str) -> Result<i64, WalletError>;
            async fn post_win(&self, session: &Session, amount: i64, round_id: &str) -> Result<(i64, i64), WalletError>;
            async fn fetch_balance(&self, session: &Session) -> Result<i64, WalletError>;
        }
    }

    pub(crate) struct Fixture {
        pub store: Arc<InMemoryStore>,
        pub service: RoomService,
        pub players: PlayerRepository,
        pub rooms: RoomRepository,
    }

    pub(crate) async fn fixture_with(operator: &str, registry: WalletRegistry) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let sessions = SessionRepository::new(store.clone());
        for id in ["p1", "p2"] {
            sessions
                .save(&Session::new(id, id, "EUR", operator))
                .await
                .unwrap();
        }
        let wallet = WalletService::new(
            registry,
            sessions,
            HistoryService::new(Arc::new(LogGameHistoryRepository)),
        );
        Fixture {
            service: RoomService::new(store.clone(), wallet, "damas", 30),
            players: PlayerRepository::new(store.clone()),
            rooms: RoomRepository::new(store.clone()),
            store,
        }
    }

    pub(crate) async fn fixture() -> Fixture {
        fixture_with(TEST_OPERATOR, WalletRegistry::with_builtin()).await
    }

    pub(crate) fn queued_player(id: &str) -> Player {
        let mut player = Player::new(
            id,
            &format!("{}-name", id),
            "EUR",
            OperatorIdentifier {
                operator_name: TEST_OPERATOR.to_string(),
                operator_game_name: "damas".to_string(),
                game_name: "damas".to_string(),
                win_factor: 0.9,
            },
        );
        player.status = PlayerStatus::InQueue;
        player.selected_bet = 5.0;
        player
    }

    /// A room in the store with both players IN_ROOM, no actor attached.
    pub(crate) async fn seed_room(fx: &Fixture) -> Room {
        let mut p1 = queued_player("p1");
        let mut p2 = queued_player("p2");
        p1.status = PlayerStatus::InRoom;
        p2.status = PlayerStatus::InRoom;
        let room = Room::new(p1, p2, 5.0, "p1");
        for player in [&room.player1, &room.player2] {
            let mut stored = player.clone();
            stored.room_id = room.id.clone();
            fx.players.save(&stored).await.unwrap();
        }
        fx.rooms.save(&room).await.unwrap();
        room
    }

    async fn mark_ready(fx: &Fixture, player_id: &str) {
        let mut player = fx.players.get(player_id).await.unwrap().unwrap();
        player.update_status(PlayerStatus::InRoomReady).unwrap();
        fx.players.update(&player).await.unwrap();
    }

    fn commands(store: &InMemoryStore, player_id: &str) -> Vec<String> {
        store
            .published(&keys::player_topic(player_id))
            .iter()
            .filter_map(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
            .filter_map(|v| v["command"].as_str().map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_pairing_creates_room_and_notifies() -> anyhow::Result<()> {
        let fx = fixture().await;
        let p1 = queued_player("p1");
        let p2 = queued_player("p2");
        fx.players.save(&p1).await?;
        fx.players.save(&p2).await?;
        fx.store.incr("queue_count:damas:room:5.000000").await?;
        fx.store.incr("queue_count:damas:room:5.000000").await?;

        let room = fx
            .service
            .handle_queue_paired(ResolvedPlayer::Live(p1), ResolvedPlayer::Live(p2), 5.0)
            .await?;

        assert!(fx.rooms.get(&room.id).await?.is_some());
        assert!(room.current_player_id == "p1" || room.current_player_id == "p2");
        for id in ["p1", "p2"] {
            let stored = fx.players.get(id).await?.unwrap();
            assert_eq!(stored.status, PlayerStatus::InRoom);
            assert_eq!(stored.room_id, room.id);
            assert_eq!(commands(&fx.store, id), vec!["paired".to_string()]);
        }
        assert_eq!(
            fx.store.get("queue_count:damas:room:5.000000").await?.as_deref(),
            Some("0")
        );

        let paired: serde_json::Value =
            serde_json::from_str(&fx.store.published("player:p1")[0])?;
        assert_eq!(paired["value"]["winnings"], 9.0);
        assert_eq!(paired["value"]["opponent"], "p2-name");
        assert_eq!(paired["value"]["timer"], 30);
        Ok(())
    }

    #[tokio::test]
    async fn test_pairing_rolls_back_on_invalid_status() {
        let fx = fixture().await;
        let p1 = queued_player("p1");
        let mut p2 = queued_player("p2");
        p2.status = PlayerStatus::Online;
        fx.players.save(&p1).await.unwrap();
        fx.players.save(&p2).await.unwrap();

        let result = fx
            .service
            .handle_queue_paired(ResolvedPlayer::Live(p1), ResolvedPlayer::Live(p2), 5.0)
            .await;

        assert!(matches!(result, Err(RoomServiceError::PresenceError(_))));
        for id in ["p1", "p2"] {
            let stored = fx.players.get(id).await.unwrap().unwrap();
            assert_eq!(stored.status, PlayerStatus::Online);
            assert_eq!(commands(&fx.store, id), vec!["message".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_first_ready_waits_for_opponent() {
        let fx = fixture().await;
        let room = seed_room(&fx).await;
        mark_ready(&fx, "p1").await;

        let flow = fx.service.handle_player_ready(&room.id, "p1").await.unwrap();

        assert_eq!(flow, RoomFlow::Continue);
        assert_eq!(commands(&fx.store, "p2"), vec!["opponent_ready".to_string()]);
        assert!(fx.rooms.get(&room.id).await.unwrap().unwrap().is_player_ready("p1"));
    }

    #[tokio::test]
    async fn test_both_ready_collects_bets_and_hands_off() {
        let fx = fixture().await;
        let room = seed_room(&fx).await;
        mark_ready(&fx, "p1").await;
        mark_ready(&fx, "p2").await;

        fx.service.handle_player_ready(&room.id, "p1").await.unwrap();
        let flow = fx.service.handle_player_ready(&room.id, "p2").await.unwrap();

        assert_eq!(flow, RoomFlow::Close);
        assert_eq!(fx.store.list("create_game:damas").len(), 1);
        assert_eq!(
            fx.store.published(&keys::room_topic(&room.id)),
            vec!["game_start".to_string()]
        );
        assert!(commands(&fx.store, "p1").contains(&"balance_update".to_string()));
        assert!(commands(&fx.store, "p2").contains(&"balance_update".to_string()));
    }

    #[tokio::test]
    async fn test_second_bet_failure_refunds_first_player() {
        let mut wallet = MockWallet::new();
        wallet.expect_post_bet().returning(|session, _, _| {
            if session.id == "p2" {
                Err(WalletError::Rejected("insufficient funds".to_string()))
            } else {
                Ok(4500)
            }
        });
        wallet
            .expect_post_win()
            .withf(|session, amount, round_id| {
                session.id == "p1" && *amount == 500 && !round_id.is_empty()
            })
            .times(1)
            .returning(|_, _, _| Ok((5000, 0)));
        let registry = WalletRegistry::new().register("MockOp", Arc::new(wallet));
        let fx = fixture_with("MockOp", registry).await;
        let room = seed_room(&fx).await;
        mark_ready(&fx, "p1").await;
        mark_ready(&fx, "p2").await;

        fx.service.handle_player_ready(&room.id, "p1").await.unwrap();
        let flow = fx.service.handle_player_ready(&room.id, "p2").await.unwrap();

        assert_eq!(flow, RoomFlow::Close);
        assert!(fx.rooms.get(&room.id).await.unwrap().is_none());
        assert!(fx.store.list("create_game:damas").is_empty());

        let p1 = fx.players.get("p1").await.unwrap().unwrap();
        assert_eq!(p1.status, PlayerStatus::InQueue);
        assert_eq!(fx.store.list("queue:damas:5.000000").len(), 1);
        let p2 = fx.players.get("p2").await.unwrap().unwrap();
        assert_eq!(p2.status, PlayerStatus::Online);

        let p1_commands = commands(&fx.store, "p1");
        assert_eq!(
            p1_commands
                .iter()
                .filter(|c| c.as_str() == "balance_update")
                .count(),
            2
        );
        assert!(p1_commands.contains(&"room_failed_ready_check".to_string()));
        assert!(p1_commands.contains(&"queue_confirmation".to_string()));
    }

    #[tokio::test]
    async fn test_first_bet_failure_requeues_opponent() {
        let mut wallet = MockWallet::new();
        wallet
            .expect_post_bet()
            .times(1)
            .returning(|_, _, _| Err(WalletError::Rejected("blocked".to_string())));
        wallet.expect_post_win().never();
        let registry = WalletRegistry::new().register("MockOp", Arc::new(wallet));
        let fx = fixture_with("MockOp", registry).await;
        let room = seed_room(&fx).await;
        mark_ready(&fx, "p1").await;
        mark_ready(&fx, "p2").await;

        fx.service.handle_player_ready(&room.id, "p1").await.unwrap();
        fx.service.handle_player_ready(&room.id, "p2").await.unwrap();

        assert_eq!(
            fx.players.get("p1").await.unwrap().unwrap().status,
            PlayerStatus::Online
        );
        assert_eq!(
            fx.players.get("p2").await.unwrap().unwrap().status,
            PlayerStatus::InQueue
        );
    }

    #[tokio::test]
    async fn test_unready_notifies_opponent() {
        let fx = fixture().await;
        let room = seed_room(&fx).await;
        fx.service.handle_player_ready(&room.id, "p1").await.unwrap();

        let flow = fx.service.handle_player_unready(&room.id, "p1").await.unwrap();

        assert_eq!(flow, RoomFlow::Continue);
        assert!(!fx.rooms.get(&room.id).await.unwrap().unwrap().is_player_ready("p1"));
        let last: serde_json::Value =
            serde_json::from_str(fx.store.published("player:p2").last().unwrap()).unwrap();
        assert_eq!(last["value"]["is_ready"], false);
    }

    #[tokio::test]
    async fn test_leave_room_requeues_opponent() {
        let fx = fixture().await;
        let room = seed_room(&fx).await;

        let flow = fx.service.handle_leave_room(&room.id, "p1").await.unwrap();

        assert_eq!(flow, RoomFlow::Close);
        assert!(fx.rooms.get(&room.id).await.unwrap().is_none());
        let leaver = fx.players.get("p1").await.unwrap().unwrap();
        assert_eq!(leaver.status, PlayerStatus::Online);
        assert!(leaver.room_id.is_empty());

        let opponent = fx.players.get("p2").await.unwrap().unwrap();
        assert_eq!(opponent.status, PlayerStatus::InQueue);
        assert_eq!(
            commands(&fx.store, "p2"),
            vec![
                "opponent_left_room".to_string(),
                "queue_confirmation".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_leave_unknown_room_is_noop() {
        let fx = fixture().await;
        let flow = fx.service.handle_leave_room("missing", "p1").await.unwrap();
        assert_eq!(flow, RoomFlow::Close);
    }

    #[tokio::test]
    async fn test_end_room_requeues_only_ready_players() {
        let fx = fixture().await;
        let room = seed_room(&fx).await;
        mark_ready(&fx, "p1").await;

        fx.service.handle_end_room(&room.id).await.unwrap();

        assert!(fx.rooms.get(&room.id).await.unwrap().is_none());
        assert_eq!(
            fx.players.get("p1").await.unwrap().unwrap().status,
            PlayerStatus::InQueue
        );
        assert_eq!(
            fx.players.get("p2").await.unwrap().unwrap().status,
            PlayerStatus::Online
        );
        assert_eq!(
            commands(&fx.store, "p2"),
            vec!["room_failed_ready_check".to_string()]
        );
    }

    #[tokio::test]
    async fn test_end_room_with_disconnected_players() {
        let fx = fixture().await;
        let room = seed_room(&fx).await;
        mark_ready(&fx, "p1").await;
        // Both dropped their connection while in the room.
        for id in ["p1", "p2"] {
            let player = fx.players.get(id).await.unwrap().unwrap();
            fx.players.save_disconnected_in_queue(&player).await.unwrap();
            fx.players.remove(id).await.unwrap();
        }

        fx.service.handle_end_room(&room.id).await.unwrap();

        let p1 = fx.players.get_disconnected_in_queue("p1").await.unwrap().unwrap();
        assert_eq!(p1.status, PlayerStatus::InQueue);
        assert_eq!(fx.store.list("queue:damas:5.000000").len(), 1);
        assert!(fx
            .players
            .get_disconnected_in_queue("p2")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_reconnect_resends_paired_with_countdown() {
        let fx = fixture().await;
        let room = seed_room(&fx).await;
        fx.service.handle_player_ready(&room.id, "p2").await.unwrap();

        fx.service.handle_reconnect(&room.id, "p1", 12).await.unwrap();

        let published = fx.store.published("player:p1");
        let paired: serde_json::Value = serde_json::from_str(&published[published.len() - 2]).unwrap();
        assert_eq!(paired["command"], "paired");
        assert_eq!(paired["value"]["timer"], 12);
        assert_eq!(paired["value"]["color"], 0);
        let ready: serde_json::Value = serde_json::from_str(published.last().unwrap()).unwrap();
        assert_eq!(ready["command"], "opponent_ready");
    }

    #[tokio::test]
    async fn test_forward_ready_signal() {
        let fx = fixture().await;
        let mut player = queued_player("p1");
        player.status = PlayerStatus::InRoomReady;
        player.room_id = "r1".to_string();

        fx.service.forward_ready_signal(&player).await.unwrap();
        player.status = PlayerStatus::InRoom;
        fx.service.forward_ready_signal(&player).await.unwrap();
        fx.service.forward_leave_signal(&player).await.unwrap();

        assert_eq!(
            fx.store.published("roompubsub:r1"),
            vec![
                "player_ready:p1".to_string(),
                "player_unready:p1".to_string(),
                "leave_room:p1".to_string()
            ]
        );
    }
}
