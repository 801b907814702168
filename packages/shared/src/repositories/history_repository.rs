use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::game::{Game, GameEndReason, GamePlayer, Move};
use crate::models::session::{Session, Transaction};
use crate::repositories::errors::history_repository_errors::GameHistoryRepositoryError;

/// A finished game as it is archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameHistoryRecord {
    pub game_id: String,
    pub reason: GameEndReason,
    pub winner: Option<String>,
    pub turns: u32,
    pub bet_value: f64,
    pub currency: String,
    pub players: Vec<GamePlayer>,
    pub moves: Vec<Move>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl GameHistoryRecord {
    pub fn new(game: &Game, reason: GameEndReason) -> Self {
        GameHistoryRecord {
            game_id: game.id.clone(),
            reason,
            winner: game.winner.clone(),
            turns: game.turn,
            bet_value: game.bet_value,
            currency: game.currency.clone(),
            players: game.players.to_vec(),
            moves: game.moves.clone(),
            start_time: game.start_time,
            end_time: game.end_time,
        }
    }
}

#[async_trait]
pub trait GameHistoryRepository: Send + Sync {
    async fn save_game(
        &self,
        game: &Game,
        reason: GameEndReason,
    ) -> Result<(), GameHistoryRepositoryError>;

    async fn save_transaction(&self, tx: &Transaction) -> Result<(), GameHistoryRepositoryError>;

    async fn save_session(&self, session: &Session) -> Result<(), GameHistoryRepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTables {
    pub games: String,
    pub transactions: String,
    pub sessions: String,
}

pub struct DynamoDbGameHistoryRepository {
    pub client: Client,
    pub tables: HistoryTables,
}

impl DynamoDbGameHistoryRepository {
    pub fn new(client: Client, tables: HistoryTables) -> Self {
        Self { client, tables }
    }

    async fn put<T: Serialize + Sync>(
        &self,
        table: &str,
        value: &T,
    ) -> Result<(), GameHistoryRepositoryError> {
        let item = serde_dynamo::to_item(value)
            .map_err(|e| GameHistoryRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| GameHistoryRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl GameHistoryRepository for DynamoDbGameHistoryRepository {
    async fn save_game(
        &self,
        game: &Game,
        reason: GameEndReason,
    ) -> Result<(), GameHistoryRepositoryError> {
        self.put(&self.tables.games, &GameHistoryRecord::new(game, reason))
            .await
    }

    async fn save_transaction(&self, tx: &Transaction) -> Result<(), GameHistoryRepositoryError> {
        self.put(&self.tables.transactions, tx).await
    }

    async fn save_session(&self, session: &Session) -> Result<(), GameHistoryRepositoryError> {
        self.put(&self.tables.sessions, session).await
    }
}

/// Writes history to the log only. Default for local runs.
pub struct LogGameHistoryRepository;

#[async_trait]
impl GameHistoryRepository for LogGameHistoryRepository {
    async fn save_game(
        &self,
        game: &Game,
        reason: GameEndReason,
    ) -> Result<(), GameHistoryRepositoryError> {
        let record = GameHistoryRecord::new(game, reason);
        info!(
            game_id = %record.game_id,
            reason = %record.reason,
            winner = ?record.winner,
            turns = record.turns,
            "Game archived"
        );
        Ok(())
    }

    async fn save_transaction(&self, tx: &Transaction) -> Result<(), GameHistoryRepositoryError> {
        info!(
            session_id = %tx.session_id,
            kind = ?tx.kind,
            amount = tx.amount,
            round_id = %tx.round_id,
            "Transaction archived"
        );
        Ok(())
    }

    async fn save_session(&self, session: &Session) -> Result<(), GameHistoryRepositoryError> {
        info!(session_id = %session.id, operator = %session.operator_name, "Session archived");
        Ok(())
    }
}
