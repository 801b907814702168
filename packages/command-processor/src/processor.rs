use std::sync::Arc;
use std::time::Duration;

use shared::models::messages::InboundCommand;
use shared::repositories::keys;
use shared::repositories::store::Store;
use tracing::{error, info, warn};

use crate::services::command_service::CommandService;

const ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub struct CommandProcessor {
    store: Arc<dyn Store>,
    service: CommandService,
}

impl CommandProcessor {
    pub fn new(store: Arc<dyn Store>, service: CommandService) -> Self {
        Self { store, service }
    }

    /// Drains the hub's command list forever, one frame at a time so a
    /// player's commands are applied in the order they were sent.
    pub async fn run(self) {
        info!(list = keys::PLAYER_COMMANDS, "Command consumer started");
        loop {
            match self
                .store
                .blocking_pop_front(keys::PLAYER_COMMANDS, None)
                .await
            {
                Ok(Some(raw)) => self.process_frame(&raw).await,
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to pop command: {}", e);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    pub async fn process_frame(&self, raw: &str) {
        match serde_json::from_str::<InboundCommand>(raw) {
            Ok(inbound) => self.service.handle(inbound).await,
            Err(e) => warn!("Discarding malformed command frame: {}", e),
        }
    }
}
