use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{AppConfig, HistoryBackend, StoreBackend};
use crate::repositories::errors::store_errors::StoreError;
use crate::repositories::history_repository::{
    DynamoDbGameHistoryRepository, GameHistoryRepository, LogGameHistoryRepository,
};
use crate::repositories::memory_store::InMemoryStore;
use crate::repositories::redis_store::RedisStore;
use crate::repositories::session_repository::SessionRepository;
use crate::repositories::store::Store;
use crate::services::history_service::HistoryService;
use crate::services::wallet_service::{WalletRegistry, WalletService};

pub async fn connect_store(config: &AppConfig) -> Result<Arc<dyn Store>, StoreError> {
    match &config.store {
        StoreBackend::Redis { url } => Ok(Arc::new(RedisStore::connect(url).await?)),
        StoreBackend::Memory => {
            warn!("Using the in-memory store; state is not shared between processes");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

pub async fn build_history(config: &AppConfig) -> HistoryService {
    let repository: Arc<dyn GameHistoryRepository + Send + Sync> = match &config.history {
        HistoryBackend::DynamoDb(tables) => {
            let aws_config = aws_config::load_from_env().await;
            let client = aws_sdk_dynamodb::Client::new(&aws_config);
            info!(table = %tables.games, "Archiving game history to DynamoDB");
            Arc::new(DynamoDbGameHistoryRepository::new(client, tables.clone()))
        }
        HistoryBackend::Log => Arc::new(LogGameHistoryRepository),
    };
    HistoryService::new(repository)
}

pub fn build_wallet(store: Arc<dyn Store>, history: HistoryService) -> WalletService {
    WalletService::new(
        WalletRegistry::with_builtin(),
        SessionRepository::new(store),
        history,
    )
}
