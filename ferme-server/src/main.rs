//! Fruit Ferme Game Server
//!
//! Serves one game of Fruit Ferme over WebSocket.

use std::sync::Arc;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

use ferme::{
    VERSION,
    game::GameRules,
    network::{GameServer, ServerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    let rules = GameRules::from_env();

    info!("Fruit Ferme Server v{}", VERSION);
    info!(
        "Rules: {} rounds, BAR threshold {}, {:?} scoring, {:?} bonus, first placement {}",
        rules.max_rounds, rules.bar_threshold, rules.scoring, rules.bonus_policy, rules.first_placement
    );
    if let Some(seed) = config.fixed_seed {
        info!("Fixed dice seed: {}", seed);
    }

    let server = Arc::new(GameServer::new(config, rules));

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal_server.shutdown();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    server.run().await?;
    info!("Server stopped");
    Ok(())
}
