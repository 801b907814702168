use std::sync::Arc;

use tracing::{debug, error, info, warn};

use shared::{
    config::AppConfig,
    models::{
        game::{Game, GameEndReason, Move, TimerSetting},
        messages::{GameOverPayload, GameStartPayload, ServerMessage},
        player::{to_major_units, to_minor_units, Player},
        presence::PlayerStatus,
        room::Room,
    },
    repositories::{
        game_repository::GameRepository,
        keys,
        player_repository::{PlayerRepository, ResolvedPlayer},
        room_repository::RoomRepository,
        store::Store,
    },
    services::{
        damas_service::{DamasService, TurnOutcome},
        history_service::HistoryService,
        notification_service::NotificationService,
        wallet_service::{calculate_win_amount, WalletService},
    },
};

use crate::services::{errors::GameServiceError, timer::GameTimer};

const OPPONENT_DISCONNECTED: &str = "disconnected";
const OPPONENT_RECONNECTED: &str = "reconnected";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    pub timer_setting: TimerSetting,
    pub base_timer: i64,
    pub pieces_in_match: i64,
}

impl GameSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        GameSettings {
            timer_setting: config.timer_setting,
            base_timer: config.game_timer,
            pieces_in_match: config.pieces_in_match,
        }
    }

    pub fn initial_timer(&self) -> i64 {
        self.timer_setting
            .initial_timer(self.base_timer, self.pieces_in_match)
    }
}

#[derive(Clone)]
pub struct GameService {
    store: Arc<dyn Store>,
    players: PlayerRepository,
    games: GameRepository,
    rooms: RoomRepository,
    notifier: NotificationService,
    wallet: WalletService,
    history: HistoryService,
    damas: DamasService,
    settings: GameSettings,
}

impl GameService {
    pub fn new(
        store: Arc<dyn Store>,
        wallet: WalletService,
        history: HistoryService,
        settings: GameSettings,
    ) -> Self {
        GameService {
            players: PlayerRepository::new(store.clone()),
            games: GameRepository::new(store.clone()),
            rooms: RoomRepository::new(store.clone()),
            notifier: NotificationService::new(store.clone()),
            damas: DamasService::new(),
            store,
            wallet,
            history,
            settings,
        }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    pub fn settings(&self) -> GameSettings {
        self.settings
    }

    async fn load_game(&self, game_id: &str) -> Result<Game, GameServiceError> {
        self.games
            .get(game_id)
            .await?
            .ok_or_else(|| GameServiceError::GameNotFound(game_id.to_string()))
    }

    fn start_payload(&self, game: &Game) -> GameStartPayload {
        GameStartPayload {
            game_id: game.id.clone(),
            board: game.board.clone(),
            max_timer: self.settings.initial_timer(),
            current_player_id: game.current_player_id.clone(),
            players: game.players.to_vec(),
            win_factor: game.operator_identifier.win_factor,
        }
    }

    /// Turns a room whose stakes were collected into a running game.
    pub async fn create_game(&self, room: Room) -> Result<Game, GameServiceError> {
        let game = room.new_game(
            self.settings.timer_setting,
            self.settings.base_timer,
            self.settings.pieces_in_match,
        );

        let seats = match self.seat_players(&game).await {
            Ok(seats) => seats,
            Err(e) => {
                error!(room_id = %room.id, "Cannot seat players: {}", e);
                self.abort_creation(&room).await;
                return Err(e);
            }
        };

        self.games.save(&game).await?;
        for seat in &seats {
            match seat {
                ResolvedPlayer::Live(player) => self.players.update(player).await?,
                ResolvedPlayer::Disconnected(player) => {
                    self.players.save_disconnected_in_game(player).await?;
                    self.players.delete_disconnected_in_queue(&player.id).await?;
                    if let Some(opponent) = game.opponent(&player.id) {
                        self.notifier
                            .send(
                                &opponent.id,
                                &ServerMessage::OpponentDisconnectedGame(
                                    OPPONENT_DISCONNECTED.to_string(),
                                ),
                            )
                            .await;
                    }
                }
            }
        }
        self.rooms.remove(&room.id).await?;

        GameTimer::start(self.clone(), &game).await?;

        let message = ServerMessage::GameStart(self.start_payload(&game));
        self.notifier
            .send_all(&[&game.players[0].id, &game.players[1].id], &message)
            .await;

        info!(
            game_id = %game.id,
            black = %game.players[0].id,
            white = %game.players[1].id,
            "Game started"
        );
        Ok(game)
    }

    async fn seat_players(&self, game: &Game) -> Result<Vec<ResolvedPlayer>, GameServiceError> {
        let mut seats = Vec::with_capacity(game.players.len());
        for seat in &game.players {
            let resolved = self
                .players
                .resolve(&seat.id)
                .await?
                .ok_or_else(|| GameServiceError::PlayerNotFound(seat.id.clone()))?;
            let disconnected = resolved.is_disconnected();

            let mut player = resolved.into_player();
            player.update_status(PlayerStatus::InGame)?;
            player.game_id = game.id.clone();
            player.room_id.clear();

            seats.push(if disconnected {
                ResolvedPlayer::Disconnected(player)
            } else {
                ResolvedPlayer::Live(player)
            });
        }
        Ok(seats)
    }

    /// The room never became a game: stakes go back and both players return
    /// to the lobby.
    async fn abort_creation(&self, room: &Room) {
        let stake = to_minor_units(room.bet_value);
        for player in [&room.player1, &room.player2] {
            if let Err(e) = self.wallet.refund(&player.session_id, stake, &room.id).await {
                error!(player_id = %player.id, room_id = %room.id, "Refund failed: {}", e);
            }
            if let Err(e) = self.release_player(&player.id).await {
                error!(player_id = %player.id, "Failed to release player: {}", e);
            }
            if let Err(e) = self.players.delete_disconnected_in_queue(&player.id).await {
                warn!(player_id = %player.id, "Failed to drop queue snapshot: {}", e);
            }
            self.notifier
                .send(&player.id, &ServerMessage::error("Failed to start game"))
                .await;
        }
        if let Err(e) = self.rooms.remove(&room.id).await {
            error!(room_id = %room.id, "Failed to remove room: {}", e);
        }
    }

    /// Live players go back online; offline players have nothing to reset.
    async fn release_player(&self, player_id: &str) -> Result<(), GameServiceError> {
        if let Some(mut player) = self.players.get(player_id).await? {
            player.set_status_online();
            self.players.update(&player).await?;
        }
        Ok(())
    }

    pub async fn process_move(&self, mv: Move) -> Result<(), GameServiceError> {
        let player = self
            .players
            .get(&mv.player_id)
            .await?
            .ok_or_else(|| GameServiceError::PlayerNotFound(mv.player_id.clone()))?;
        let mut game = self.load_game(&player.game_id).await?;
        if !game.has_player(&mv.player_id) {
            return Err(GameServiceError::PlayerNotInGame(mv.player_id.clone()));
        }

        let outcome = match self.damas.validate_and_make_move(&mut game, &mv) {
            Ok(outcome) => outcome,
            Err(reason) => {
                info!(game_id = %game.id, player_id = %mv.player_id, "Move rejected: {}", reason);
                self.notifier
                    .send(
                        &mv.player_id,
                        &ServerMessage::InvalidMove {
                            board: game.board.clone(),
                            reason: reason.to_string(),
                        },
                    )
                    .await;
                return Ok(());
            }
        };

        self.games.update(&game).await?;
        if let Some(opponent_id) = game.opponent_id(&mv.player_id) {
            self.notifier
                .send(&opponent_id, &ServerMessage::MovePiece(outcome.recorded))
                .await;
        }

        match outcome.turn {
            TurnOutcome::GameOver { winner } => {
                self.handle_game_end(&game.id, GameEndReason::Winner, &winner)
                    .await?;
            }
            TurnOutcome::AdvanceTurn => {
                self.advance_turn(&game.id).await?;
            }
            TurnOutcome::ContinueCapture => {
                debug!(game_id = %game.id, player_id = %mv.player_id, "Capture chain continues");
            }
        }
        Ok(())
    }

    /// Hands the turn to the other player and tells the timer.
    pub async fn advance_turn(&self, game_id: &str) -> Result<String, GameServiceError> {
        let mut game = self.load_game(game_id).await?;
        let next = game.next_player().to_string();
        self.games.update(&game).await?;

        self.notifier
            .send_all(
                &[&game.players[0].id, &game.players[1].id],
                &ServerMessage::TurnSwitch(next.clone()),
            )
            .await;
        self.store
            .publish(&keys::game_switch_topic(game_id), &next)
            .await?;

        debug!(game_id = %game_id, turn = game.turn, next = %next, "Turn advanced");
        Ok(next)
    }

    pub async fn broadcast_timer(
        &self,
        player_ids: &[String; 2],
        player_timer: i64,
        current_player_id: &str,
    ) {
        let message = ServerMessage::GameTimer {
            player_timer,
            current_player_id: current_player_id.to_string(),
        };
        self.notifier
            .send_all(&[&player_ids[0], &player_ids[1]], &message)
            .await;
    }

    pub async fn persist_timer(
        &self,
        game_id: &str,
        player_id: &str,
        timer: i64,
    ) -> Result<(), GameServiceError> {
        self.games
            .update_player_timer(game_id, player_id, timer)
            .await?;
        Ok(())
    }

    pub async fn handle_leave_game(&self, player: &Player) -> Result<(), GameServiceError> {
        let game = self.load_game(&player.game_id).await?;
        let winner = game
            .opponent_id(&player.id)
            .ok_or_else(|| GameServiceError::PlayerNotInGame(player.id.clone()))?;

        info!(game_id = %game.id, player_id = %player.id, "Player left the game");
        self.handle_game_end(&game.id, GameEndReason::PlayerLeft, &winner)
            .await?;
        Ok(())
    }

    pub async fn handle_disconnect(&self, player: Player) -> Result<(), GameServiceError> {
        let game = self.load_game(&player.game_id).await?;
        if !game.has_player(&player.id) {
            return Err(GameServiceError::PlayerNotInGame(player.id.clone()));
        }

        let mut snapshot = player;
        snapshot.mark_disconnected();
        self.players.save_disconnected_in_game(&snapshot).await?;

        if let Some(opponent) = game.opponent(&snapshot.id) {
            self.notifier
                .send(
                    &opponent.id,
                    &ServerMessage::OpponentDisconnectedGame(OPPONENT_DISCONNECTED.to_string()),
                )
                .await;
        }
        info!(game_id = %game.id, player_id = %snapshot.id, "Player disconnected from game");
        Ok(())
    }

    pub async fn handle_reconnect(&self, player: Player) -> Result<(), GameServiceError> {
        let game = self.load_game(&player.game_id).await?;
        if !game.has_player(&player.id) {
            return Err(GameServiceError::PlayerNotInGame(player.id.clone()));
        }

        self.notifier
            .send(&player.id, &ServerMessage::GameReconnect(self.start_payload(&game)))
            .await;
        if let Some(opponent) = game.opponent(&player.id) {
            self.notifier
                .send(
                    &opponent.id,
                    &ServerMessage::OpponentDisconnectedGame(OPPONENT_RECONNECTED.to_string()),
                )
                .await;
        }
        self.players
            .delete_disconnected_in_game(&player.session_id)
            .await?;

        info!(game_id = %game.id, player_id = %player.id, "Player reconnected to game");
        Ok(())
    }

    /// Settles a game once. Returns `false` when another caller already
    /// ended it.
    pub async fn handle_game_end(
        &self,
        game_id: &str,
        reason: GameEndReason,
        winner_id: &str,
    ) -> Result<bool, GameServiceError> {
        let Some(mut game) = self.games.get(game_id).await? else {
            return Ok(false);
        };
        if !self.games.remove(game_id).await? {
            debug!(game_id = %game_id, "Game already ended elsewhere");
            return Ok(false);
        }

        if let Err(e) = self
            .store
            .publish(&keys::game_stop_topic(game_id), "stop")
            .await
        {
            warn!(game_id = %game_id, "Failed to stop game timer: {}", e);
        }
        game.finish(winner_id);

        let win_amount = calculate_win_amount(
            to_minor_units(game.bet_value),
            game.operator_identifier.win_factor,
        );
        if let Some(winner) = game.player(winner_id) {
            match self.wallet.pay_win(&winner.session_id, win_amount, &game.id).await {
                Ok((balance, _)) => {
                    self.notifier
                        .send(&winner.id, &ServerMessage::BalanceUpdate(to_major_units(balance)))
                        .await;
                }
                Err(e) => {
                    error!(
                        game_id = %game.id,
                        player_id = %winner.id,
                        amount = win_amount,
                        "Failed to pay winnings: {}", e
                    );
                }
            }
        }

        for player in &game.players {
            if let Err(e) = self.release_player(&player.id).await {
                error!(game_id = %game.id, player_id = %player.id, "Failed to release player: {}", e);
            }
        }

        let payload = GameOverPayload {
            reason,
            winner: winner_id.to_string(),
            turns: game.turn,
            winnings: to_major_units(win_amount),
            game_time: game.duration_secs(),
        };
        self.notifier
            .send_all(
                &[&game.players[0].id, &game.players[1].id],
                &ServerMessage::GameOver(payload),
            )
            .await;

        self.history.record_game(&game, reason);

        for player in &game.players {
            if let Err(e) = self
                .players
                .delete_disconnected_in_game(&player.session_id)
                .await
            {
                warn!(player_id = %player.id, "Failed to purge disconnect record: {}", e);
            }
        }

        info!(game_id = %game.id, reason = %reason, winner = %winner_id, "Game over");
        Ok(true)
    }
}
