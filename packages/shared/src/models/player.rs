use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::presence::{transition, PlayerStatus, PresenceError};

pub const VALID_BET_AMOUNTS: [f64; 8] = [0.5, 1.0, 3.0, 5.0, 10.0, 25.0, 50.0, 100.0];

pub fn is_valid_bet(bet: f64) -> bool {
    VALID_BET_AMOUNTS.iter().any(|valid| *valid == bet)
}

/// Bets travel as major units; wallets and payouts work in minor units.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn to_major_units(amount: i64) -> f64 {
    amount as f64 / 100.0
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperatorIdentifier {
    pub operator_name: String,
    pub operator_game_name: String,
    pub game_name: String,
    pub win_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub token: String,
    pub session_id: String,
    pub name: String,
    pub currency: String,
    pub status: PlayerStatus,
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub game_id: String,
    #[serde(default)]
    pub selected_bet: f64,
    #[serde(default)]
    pub operator_identifier: OperatorIdentifier,
    /// Unix seconds, 0 while connected.
    #[serde(default)]
    pub disconnected_at: i64,
}

impl Player {
    pub fn new(id: &str, name: &str, currency: &str, operator: OperatorIdentifier) -> Self {
        Player {
            id: id.to_string(),
            token: String::new(),
            session_id: id.to_string(),
            name: name.to_string(),
            currency: currency.to_string(),
            status: PlayerStatus::Online,
            room_id: String::new(),
            game_id: String::new(),
            selected_bet: 0.0,
            operator_identifier: operator,
            disconnected_at: 0,
        }
    }

    pub fn update_status(&mut self, next: PlayerStatus) -> Result<(), PresenceError> {
        transition(&mut self.status, next)
    }

    /// Forces the player back to the lobby, bypassing the transition table.
    pub fn set_status_online(&mut self) {
        self.status = PlayerStatus::Online;
        self.room_id.clear();
        self.game_id.clear();
    }

    pub fn is_eligible_for_queue(&self, bet: f64) -> bool {
        self.status == PlayerStatus::InQueue && self.selected_bet == bet
    }

    pub fn mark_disconnected(&mut self) {
        if self.disconnected_at == 0 {
            self.disconnected_at = Utc::now().timestamp();
        }
    }

    /// Same account seen through two sessions.
    pub fn is_same_identity(&self, other: &Player) -> bool {
        self.id == other.id
            || (self.name == other.name
                && self.operator_identifier.operator_name
                    == other.operator_identifier.operator_name
                && self.currency == other.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str) -> Player {
        Player::new(
            id,
            &format!("name-{}", id),
            "EUR",
            OperatorIdentifier {
                operator_name: "TestOp".to_string(),
                operator_game_name: "damas".to_string(),
                game_name: "damas".to_string(),
                win_factor: 0.9,
            },
        )
    }

    #[test]
    fn test_valid_bets() {
        assert!(is_valid_bet(0.5));
        assert!(is_valid_bet(100.0));
        assert!(!is_valid_bet(2.0));
        assert!(!is_valid_bet(0.0));
    }

    #[test]
    fn test_minor_unit_conversion() {
        assert_eq!(to_minor_units(0.5), 50);
        assert_eq!(to_minor_units(5.0), 500);
        assert_eq!(to_major_units(199), 1.99);
    }

    #[test]
    fn test_queue_eligibility() {
        let mut p = player("p1");
        assert!(!p.is_eligible_for_queue(5.0));

        p.update_status(PlayerStatus::InQueue).unwrap();
        p.selected_bet = 5.0;
        assert!(p.is_eligible_for_queue(5.0));
        assert!(!p.is_eligible_for_queue(10.0));
    }

    #[test]
    fn test_set_status_online_clears_ids() {
        let mut p = player("p1");
        p.status = PlayerStatus::InGame;
        p.game_id = "g1".to_string();
        p.room_id = "r1".to_string();

        p.set_status_online();

        assert_eq!(p.status, PlayerStatus::Online);
        assert!(p.room_id.is_empty());
        assert!(p.game_id.is_empty());
    }

    #[test]
    fn test_same_identity() {
        let a = player("p1");
        let mut b = player("p2");
        assert!(!a.is_same_identity(&b));

        b.name = a.name.clone();
        assert!(a.is_same_identity(&b));

        b.currency = "USD".to_string();
        assert!(!a.is_same_identity(&b));
        assert!(a.is_same_identity(&a.clone()));
    }

    #[test]
    fn test_mark_disconnected_keeps_first_timestamp() {
        let mut p = player("p1");
        p.disconnected_at = 42;
        p.mark_disconnected();
        assert_eq!(p.disconnected_at, 42);

        p.disconnected_at = 0;
        p.mark_disconnected();
        assert!(p.disconnected_at > 0);
    }
}
