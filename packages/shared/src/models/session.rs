use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub token: String,
    pub player_name: String,
    pub currency: String,
    pub operator_name: String,
    /// Minor units.
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: &str, player_name: &str, currency: &str, operator_name: &str) -> Self {
        Session {
            id: id.to_string(),
            token: Uuid::new_v4().to_string(),
            player_name: player_name.to_string(),
            currency: currency.to_string(),
            operator_name: operator_name.to_string(),
            balance: 0,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Bet,
    Win,
    Refund,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub session_id: String,
    pub kind: TransactionKind,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub operator: String,
    pub round_id: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

impl Transaction {
    pub fn new(session: &Session, kind: TransactionKind, amount: i64, round_id: &str) -> Self {
        Transaction {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            kind,
            amount,
            currency: session.currency.clone(),
            operator: session.operator_name.clone(),
            round_id: round_id.to_string(),
            timestamp: Utc::now(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}
