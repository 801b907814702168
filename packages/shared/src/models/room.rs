use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::board::{Board, PieceColor};
use crate::models::game::{Game, GamePlayer, TimerSetting};
use crate::models::player::{OperatorIdentifier, Player};
use crate::models::presence::PlayerStatus;

/// A matched pair waiting on the ready-check. Rooms only exist once both
/// players are known, so `player2` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub player1: Player,
    pub player2: Player,
    pub bet_value: f64,
    pub currency: String,
    /// Whoever holds this id plays black and moves first.
    pub current_player_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub operator_identifier: OperatorIdentifier,
}

impl Room {
    pub fn new(player1: Player, player2: Player, bet_value: f64, first_player_id: &str) -> Self {
        Room {
            id: Uuid::new_v4().to_string(),
            currency: player1.currency.clone(),
            operator_identifier: player1.operator_identifier.clone(),
            player1,
            player2,
            bet_value,
            current_player_id: first_player_id.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.player1.id == player_id || self.player2.id == player_id
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        if self.player1.id == player_id {
            Some(&self.player1)
        } else if self.player2.id == player_id {
            Some(&self.player2)
        } else {
            None
        }
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        if self.player1.id == player_id {
            Some(&mut self.player1)
        } else if self.player2.id == player_id {
            Some(&mut self.player2)
        } else {
            None
        }
    }

    pub fn opponent(&self, player_id: &str) -> Option<&Player> {
        if self.player1.id == player_id {
            Some(&self.player2)
        } else if self.player2.id == player_id {
            Some(&self.player1)
        } else {
            None
        }
    }

    /// 0 for black, 1 for white; what the client receives in `paired`.
    pub fn color_of(&self, player_id: &str) -> u8 {
        if self.current_player_id == player_id {
            0
        } else {
            1
        }
    }

    pub fn set_player_status(&mut self, player_id: &str, status: PlayerStatus) {
        if let Some(player) = self.player_mut(player_id) {
            player.status = status;
        }
    }

    pub fn is_player_ready(&self, player_id: &str) -> bool {
        self.player(player_id)
            .is_some_and(|p| p.status == PlayerStatus::InRoomReady)
    }

    pub fn both_ready(&self) -> bool {
        self.player1.status == PlayerStatus::InRoomReady
            && self.player2.status == PlayerStatus::InRoomReady
    }

    /// Builds the opening position. The game reuses the room id.
    pub fn new_game(&self, setting: TimerSetting, base_timer: i64, pieces_in_match: i64) -> Game {
        let (black, white) = if self.current_player_id == self.player2.id {
            (&self.player2, &self.player1)
        } else {
            (&self.player1, &self.player2)
        };
        let timer = setting.initial_timer(base_timer, pieces_in_match);
        let seat = |player: &Player, color: PieceColor| GamePlayer {
            id: player.id.clone(),
            name: player.name.clone(),
            session_id: player.session_id.clone(),
            token: player.token.clone(),
            color,
            timer,
            num_pieces: 0,
        };

        let mut game = Game {
            id: self.id.clone(),
            board: Board::standard(&black.id, &white.id),
            players: [seat(black, PieceColor::Black), seat(white, PieceColor::White)],
            current_player_id: black.id.clone(),
            turn: 1,
            moves: Vec::new(),
            timer_setting: setting,
            start_time: Utc::now(),
            end_time: None,
            winner: None,
            bet_value: self.bet_value,
            currency: self.currency.clone(),
            operator_identifier: self.operator_identifier.clone(),
            chain_piece: None,
        };
        game.update_player_pieces();
        game
    }
}

/// Control messages on `roompubsub:{room_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomSignal {
    RoomEnd,
    GameStart,
    LeaveRoom(String),
    PlayerReady(String),
    PlayerUnready(String),
    PlayerReconnect(String),
}

impl FromStr for RoomSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "room_end" => return Ok(RoomSignal::RoomEnd),
            "game_start" => return Ok(RoomSignal::GameStart),
            _ => {}
        }

        let (kind, player_id) = s
            .split_once(':')
            .ok_or_else(|| format!("unknown room signal: {}", s))?;
        if player_id.is_empty() {
            return Err(format!("room signal without player id: {}", s));
        }
        let player_id = player_id.to_string();
        match kind {
            "leave_room" => Ok(RoomSignal::LeaveRoom(player_id)),
            "player_ready" => Ok(RoomSignal::PlayerReady(player_id)),
            "player_unready" => Ok(RoomSignal::PlayerUnready(player_id)),
            "player_reconnect" => Ok(RoomSignal::PlayerReconnect(player_id)),
            _ => Err(format!("unknown room signal: {}", s)),
        }
    }
}

impl std::fmt::Display for RoomSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomSignal::RoomEnd => write!(f, "room_end"),
            RoomSignal::GameStart => write!(f, "game_start"),
            RoomSignal::LeaveRoom(id) => write!(f, "leave_room:{}", id),
            RoomSignal::PlayerReady(id) => write!(f, "player_ready:{}", id),
            RoomSignal::PlayerUnready(id) => write!(f, "player_unready:{}", id),
            RoomSignal::PlayerReconnect(id) => write!(f, "player_reconnect:{}", id),
        }
    }
}
