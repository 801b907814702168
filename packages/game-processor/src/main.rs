use std::error::Error;

use shared::bootstrap::{build_history, build_wallet, connect_store};
use shared::config::AppConfig;
use shared::logging::init_tracing;
use tracing::info;

mod processor;
mod services;

use processor::GameProcessor;
use services::game_service::{GameService, GameSettings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let store = connect_store(&config).await?;
    let history = build_history(&config).await;
    let wallet = build_wallet(store.clone(), history.clone());

    info!(
        variant = %config.game_name,
        timer_setting = ?config.timer_setting,
        "Starting game processor"
    );
    let service = GameService::new(
        store.clone(),
        wallet,
        history,
        GameSettings::from_config(&config),
    );
    GameProcessor::new(store, service, &config.game_name)
        .run()
        .await;
    Ok(())
}
