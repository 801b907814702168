use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::board::{Board, PieceColor};
use crate::models::player::OperatorIdentifier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub player_id: String,
    pub piece_id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub is_capture: bool,
    /// Set by the server when this move promoted the piece.
    #[serde(default)]
    pub is_kinged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerSetting {
    Reset,
    Cumulative,
}

impl TimerSetting {
    /// Starting value of each player's clock.
    pub fn initial_timer(self, base_timer: i64, pieces_in_match: i64) -> i64 {
        match self {
            TimerSetting::Reset => base_timer,
            TimerSetting::Cumulative => base_timer * pieces_in_match + 1,
        }
    }
}

impl std::str::FromStr for TimerSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reset" => Ok(TimerSetting::Reset),
            "cumulative" => Ok(TimerSetting::Cumulative),
            other => Err(format!("unknown timer setting: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEndReason {
    Winner,
    PlayerLeft,
    Timeout,
}

impl GameEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameEndReason::Winner => "winner",
            GameEndReason::PlayerLeft => "player_left",
            GameEndReason::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for GameEndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamePlayer {
    pub id: String,
    pub name: String,
    pub session_id: String,
    pub token: String,
    pub color: PieceColor,
    pub timer: i64,
    pub num_pieces: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub board: Board,
    pub players: [GamePlayer; 2],
    pub current_player_id: String,
    pub turn: u32,
    pub moves: Vec<Move>,
    pub timer_setting: TimerSetting,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub winner: Option<String>,
    pub bet_value: f64,
    pub currency: String,
    #[serde(default)]
    pub operator_identifier: OperatorIdentifier,
    /// The piece that must keep capturing before the turn can pass.
    #[serde(default)]
    pub chain_piece: Option<String>,
}

impl Game {
    pub fn player(&self, player_id: &str) -> Option<&GamePlayer> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut GamePlayer> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.player(player_id).is_some()
    }

    pub fn opponent(&self, player_id: &str) -> Option<&GamePlayer> {
        if !self.has_player(player_id) {
            return None;
        }
        self.players.iter().find(|p| p.id != player_id)
    }

    pub fn opponent_id(&self, player_id: &str) -> Option<String> {
        self.opponent(player_id).map(|p| p.id.clone())
    }

    /// Hands the move to the other player and bumps the turn counter.
    pub fn next_player(&mut self) -> &str {
        if let Some(next) = self.opponent_id(&self.current_player_id) {
            self.current_player_id = next;
        }
        self.turn += 1;
        self.chain_piece = None;
        &self.current_player_id
    }

    pub fn update_player_pieces(&mut self) {
        for i in 0..self.players.len() {
            let count = self.board.count_pieces(&self.players[i].id);
            self.players[i].num_pieces = count;
        }
    }

    /// The player left without pieces, if any.
    pub fn player_out_of_pieces(&self) -> Option<&GamePlayer> {
        self.players.iter().find(|p| p.num_pieces == 0)
    }

    pub fn set_player_timer(&mut self, player_id: &str, timer: i64) {
        if let Some(player) = self.player_mut(player_id) {
            player.timer = timer;
        }
    }

    pub fn is_over(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn finish(&mut self, winner: &str) {
        self.end_time = Some(Utc::now());
        self.winner = Some(winner.to_string());
    }

    pub fn duration_secs(&self) -> i64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_seconds()
    }
}
