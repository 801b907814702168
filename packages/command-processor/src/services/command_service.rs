use std::sync::Arc;

use tracing::{debug, error, info, warn};

use shared::{
    models::{
        game::Move,
        messages::{ClientCommand, ConnectPayload, InboundCommand, ServerMessage},
        player::{is_valid_bet, to_major_units, Player},
        presence::PlayerStatus,
        room::RoomSignal,
        session::Session,
    },
    repositories::{
        keys, player_repository::PlayerRepository, queue_repository::QueueRepository,
        session_repository::SessionRepository, store::Store,
    },
    services::{
        history_service::HistoryService, notification_service::NotificationService,
        wallet_service::WalletService,
    },
};

use crate::services::errors::CommandError;

/// Checks every inbound command against the player's presence and routes it
/// to the list its worker consumes.
#[derive(Clone)]
pub struct CommandService {
    store: Arc<dyn Store>,
    players: PlayerRepository,
    sessions: SessionRepository,
    queue: QueueRepository,
    notifier: NotificationService,
    wallet: WalletService,
    history: HistoryService,
    variant: String,
}

impl CommandService {
    pub fn new(
        store: Arc<dyn Store>,
        wallet: WalletService,
        history: HistoryService,
        variant: &str,
    ) -> Self {
        CommandService {
            players: PlayerRepository::new(store.clone()),
            sessions: SessionRepository::new(store.clone()),
            queue: QueueRepository::new(store.clone(), variant),
            notifier: NotificationService::new(store.clone()),
            store,
            wallet,
            history,
            variant: variant.to_string(),
        }
    }

    pub async fn handle(&self, inbound: InboundCommand) {
        let player_id = inbound.player_id.clone();
        let command = match inbound.parse() {
            Ok(command) => command,
            Err(e) => {
                warn!(player_id = %player_id, command = %inbound.command, "Unparseable command: {}", e);
                self.notifier
                    .send(&player_id, &ServerMessage::invalid(&format!("Malformed command: {}", e)))
                    .await;
                return;
            }
        };
        debug!(player_id = %player_id, command = %inbound.command, "Handling command");

        let result = match command {
            ClientCommand::Queue(bet) => self.join_queue(&player_id, bet).await,
            ClientCommand::LeaveQueue => self.leave_queue(&player_id).await,
            ClientCommand::ReadyQueue(ready) => self.ready_queue(&player_id, ready).await,
            ClientCommand::LeaveRoom => self.leave_room(&player_id).await,
            ClientCommand::LeaveGame => self.leave_game(&player_id).await,
            ClientCommand::MovePiece(mv) => self.move_piece(&player_id, mv).await,
            ClientCommand::GameInfo => self.game_info(&player_id).await,
            ClientCommand::Ping => {
                self.notifier.send(&player_id, &ServerMessage::Pong).await;
                Ok(())
            }
            ClientCommand::Connect(payload) => self.connect(&player_id, payload).await,
            ClientCommand::Disconnect => self.disconnect(&player_id).await,
        };

        if let Err(e) = result {
            let reply = if e.is_validation() {
                info!(player_id = %player_id, command = %inbound.command, "Command rejected: {}", e);
                ServerMessage::invalid(&e.to_string())
            } else {
                error!(player_id = %player_id, command = %inbound.command, "Command failed: {}", e);
                ServerMessage::error(&e.to_string())
            };
            self.notifier.send(&player_id, &reply).await;
        }
    }

    async fn live_player(&self, player_id: &str) -> Result<Player, CommandError> {
        self.players
            .get(player_id)
            .await?
            .ok_or_else(|| CommandError::PlayerNotFound(player_id.to_string()))
    }

    fn require(
        player: &Player,
        command: &'static str,
        allowed: &[PlayerStatus],
    ) -> Result<(), CommandError> {
        if allowed.contains(&player.status) {
            Ok(())
        } else {
            Err(CommandError::WrongState {
                command,
                status: player.status,
            })
        }
    }

    async fn push_json<T: serde::Serialize>(&self, list: &str, value: &T) -> Result<(), CommandError> {
        let raw = serde_json::to_string(value)?;
        self.store.push_back(list, &raw).await?;
        Ok(())
    }

    /// Rejected requests leave any existing queue entry alone and only get
    /// the error reply. A failed enqueue answers `queue_confirmation=false`.
    pub async fn join_queue(&self, player_id: &str, bet: f64) -> Result<(), CommandError> {
        let mut player = self.live_player(player_id).await?;
        if !is_valid_bet(bet) {
            return Err(CommandError::InvalidBet(bet));
        }
        player.update_status(PlayerStatus::InQueue)?;
        player.selected_bet = bet;

        if let Err(e) = self.enqueue(&mut player).await {
            self.notifier
                .send(player_id, &ServerMessage::QueueConfirmation(false))
                .await;
            return Err(e);
        }

        info!(player_id = %player_id, bet, "Player queued");
        self.notifier
            .send(player_id, &ServerMessage::QueueConfirmation(true))
            .await;
        Ok(())
    }

    async fn enqueue(&self, player: &mut Player) -> Result<(), CommandError> {
        self.players.update(player).await?;
        if let Err(e) = self.queue.push(player).await {
            self.rollback_join(player, false).await;
            return Err(e.into());
        }
        if let Err(e) = self.queue.increment_count(player.selected_bet).await {
            self.rollback_join(player, true).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn rollback_join(&self, player: &mut Player, pushed: bool) {
        if pushed {
            if let Err(e) = self.queue.remove(player).await {
                error!(player_id = %player.id, "Failed to remove queue entry: {}", e);
            }
        }
        player.set_status_online();
        if let Err(e) = self.players.update(player).await {
            error!(player_id = %player.id, "Failed to restore player: {}", e);
        }
    }

    pub async fn leave_queue(&self, player_id: &str) -> Result<(), CommandError> {
        let mut player = self.live_player(player_id).await?;
        let queued = player.clone();
        player.update_status(PlayerStatus::Online)?;
        self.players.update(&player).await?;

        // The matchmaking worker may already hold the entry; it settles the
        // count itself in that case.
        if self.queue.remove(&queued).await? > 0 {
            self.queue.decrement_count(queued.selected_bet).await?;
        }

        info!(player_id = %player_id, "Player left the queue");
        self.notifier
            .send(player_id, &ServerMessage::QueueConfirmation(false))
            .await;
        Ok(())
    }

    pub async fn ready_queue(&self, player_id: &str, ready: bool) -> Result<(), CommandError> {
        let mut player = self.live_player(player_id).await?;
        Self::require(
            &player,
            "ready_queue",
            &[PlayerStatus::InRoom, PlayerStatus::InRoomReady],
        )?;
        let next = if ready {
            PlayerStatus::InRoomReady
        } else {
            PlayerStatus::InRoom
        };
        player.update_status(next)?;
        self.players.update(&player).await?;
        self.push_json(&keys::ready_queue(&self.variant), &player)
            .await
    }

    pub async fn leave_room(&self, player_id: &str) -> Result<(), CommandError> {
        let player = self.live_player(player_id).await?;
        Self::require(
            &player,
            "leave_room",
            &[PlayerStatus::InRoom, PlayerStatus::InRoomReady],
        )?;
        self.push_json(keys::LEAVE_ROOM, &player).await
    }

    pub async fn leave_game(&self, player_id: &str) -> Result<(), CommandError> {
        let player = self.live_player(player_id).await?;
        Self::require(&player, "leave_game", &[PlayerStatus::InGame])?;
        self.push_json(&keys::leave_game(&self.variant), &player)
            .await
    }

    pub async fn move_piece(&self, player_id: &str, mv: Move) -> Result<(), CommandError> {
        let player = self.live_player(player_id).await?;
        Self::require(&player, "move_piece", &[PlayerStatus::InGame])?;
        if mv.player_id != player_id {
            return Err(CommandError::MovePlayerMismatch);
        }
        self.push_json(&keys::move_piece(&self.variant), &mv).await
    }

    pub async fn game_info(&self, player_id: &str) -> Result<(), CommandError> {
        let counts = self.queue.counts().await?;
        self.notifier
            .send(player_id, &ServerMessage::GameInfo(counts))
            .await;
        Ok(())
    }

    async fn ensure_session(
        &self,
        session_id: &str,
        payload: &ConnectPayload,
    ) -> Result<Session, CommandError> {
        if let Some(session) = self.sessions.get(session_id).await? {
            return Ok(session);
        }

        let mut session = Session::new(
            session_id,
            &payload.name,
            &payload.currency,
            &payload.operator_identifier.operator_name,
        );
        if !payload.token.is_empty() {
            session.token = payload.token.clone();
        }
        self.sessions.save(&session).await?;
        self.history.record_session(session.clone());
        Ok(session)
    }

    /// Restores whatever the player was doing before the connection dropped.
    pub async fn connect(&self, player_id: &str, payload: ConnectPayload) -> Result<(), CommandError> {
        let session = self.ensure_session(player_id, &payload).await?;

        let player = if let Some(mut player) =
            self.players.get_disconnected_in_game(&session.id).await?
        {
            player.disconnected_at = 0;
            self.players.save(&player).await?;
            self.push_json(&keys::reconnect_game(&self.variant), &player)
                .await?;
            info!(player_id = %player_id, game_id = %player.game_id, "Player back in game");
            player
        } else if let Some(mut player) = self.players.get_disconnected_in_queue(player_id).await? {
            player.disconnected_at = 0;
            self.players.save(&player).await?;
            self.players.delete_disconnected_in_queue(player_id).await?;

            let in_room = matches!(
                player.status,
                PlayerStatus::InRoom | PlayerStatus::InRoomReady
            );
            if in_room && !player.room_id.is_empty() {
                self.store
                    .publish(
                        &keys::room_topic(&player.room_id),
                        &RoomSignal::PlayerReconnect(player.id.clone()).to_string(),
                    )
                    .await?;
            }
            info!(player_id = %player_id, status = %player.status, "Player restored");
            player
        } else {
            let player = match self.players.get(player_id).await? {
                Some(mut existing) => {
                    if !payload.token.is_empty() {
                        existing.token = payload.token.clone();
                    }
                    if existing.status == PlayerStatus::Offline {
                        existing.update_status(PlayerStatus::Online)?;
                    }
                    existing
                }
                None => {
                    let mut player = Player::new(
                        player_id,
                        &payload.name,
                        &payload.currency,
                        payload.operator_identifier.clone(),
                    );
                    player.token = payload.token.clone();
                    player
                }
            };
            self.players.save(&player).await?;
            info!(player_id = %player_id, "Player connected");
            player
        };

        let balance = match self.wallet.balance(&session.id).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(player_id = %player_id, "Falling back to stored balance: {}", e);
                session.balance
            }
        };
        self.notifier
            .send(
                player_id,
                &ServerMessage::Connected {
                    player_id: player.id.clone(),
                    player_name: player.name.clone(),
                    money: to_major_units(balance),
                    status: player.status,
                },
            )
            .await;
        Ok(())
    }

    pub async fn disconnect(&self, player_id: &str) -> Result<(), CommandError> {
        let Some(mut player) = self.players.get(player_id).await? else {
            return Ok(());
        };

        match player.status {
            PlayerStatus::InQueue | PlayerStatus::InRoom | PlayerStatus::InRoomReady => {
                player.mark_disconnected();
                self.players.save_disconnected_in_queue(&player).await?;
                self.players.remove(player_id).await?;
            }
            PlayerStatus::InGame => {
                self.push_json(&keys::disconnect_game(&self.variant), &player)
                    .await?;
            }
            PlayerStatus::Online | PlayerStatus::Offline => {
                self.players.remove(player_id).await?;
            }
        }

        info!(player_id = %player_id, status = %player.status, "Player disconnected");
        Ok(())
    }
}
