use std::sync::Arc;

use tracing::error;

use crate::models::game::{Game, GameEndReason};
use crate::models::session::{Session, Transaction};
use crate::repositories::history_repository::GameHistoryRepository;

/// Fire-and-forget archive of finished games, transactions and sessions.
/// Failures are logged and never retried.
#[derive(Clone)]
pub struct HistoryService {
    repository: Arc<dyn GameHistoryRepository + Send + Sync>,
}

impl HistoryService {
    pub fn new(repository: Arc<dyn GameHistoryRepository + Send + Sync>) -> Self {
        HistoryService { repository }
    }

    pub fn record_game(&self, game: &Game, reason: GameEndReason) {
        let repository = self.repository.clone();
        let game = game.clone();
        tokio::spawn(async move {
            if let Err(e) = repository.save_game(&game, reason).await {
                error!(game_id = %game.id, "Failed to archive game: {}", e);
            }
        });
    }

    pub fn record_transaction(&self, tx: Transaction) {
        let repository = self.repository.clone();
        tokio::spawn(async move {
            if let Err(e) = repository.save_transaction(&tx).await {
                error!(session_id = %tx.session_id, "Failed to archive transaction: {}", e);
            }
        });
    }

    pub fn record_session(&self, session: Session) {
        let repository = self.repository.clone();
        tokio::spawn(async move {
            if let Err(e) = repository.save_session(&session).await {
                error!(session_id = %session.id, "Failed to archive session: {}", e);
            }
        });
    }
}
