use std::error::Error;

use shared::bootstrap::{build_history, build_wallet, connect_store};
use shared::config::AppConfig;
use shared::logging::init_tracing;
use tracing::info;

mod processor;
mod services;

use processor::CommandProcessor;
use services::command_service::CommandService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let store = connect_store(&config).await?;
    let history = build_history(&config).await;
    let wallet = build_wallet(store.clone(), history.clone());

    info!(variant = %config.game_name, "Starting command processor");
    let service = CommandService::new(store.clone(), wallet, history, &config.game_name);
    CommandProcessor::new(store, service).run().await;
    Ok(())
}
