pub mod config;
pub mod discord;
pub mod error;
pub mod governors;
pub mod logging;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;
use log::{error, info, warn};
use tokio::sync::RwLock;
use crate::config::Config;
use crate::discord::DiscordClient;
use crate::storage::StorageClient;

pub use crate::error::{TrackerError, TrackerResult};
pub use crate::governors::GovernorTracker;

pub struct BotClients {
    pub storage: Arc<StorageClient>,
    pub tracker: Arc<GovernorTracker>,
    pub discord: DiscordClient,
}

/// Opens (and migrates) the configured database and wires every governor service to it.
pub fn open_tracker(config: &Config) -> TrackerResult<(Arc<StorageClient>, Arc<GovernorTracker>)> {
    let storage = Arc::new(StorageClient::open(&config.database_path, config.storage_timeout())?);
    let tracker = Arc::new(GovernorTracker::new(Arc::clone(&storage)));
    Ok((storage, tracker))
}

pub async fn init(config: Arc<RwLock<Config>>) -> Result<BotClients, Box<dyn std::error::Error + Send + Sync>> {
    let config_read = config.read().await;
    if !config_read.is_discord_configured() {
        return Err("Bot requires a Discord token. Set discord_token in the config file or DISCORD_BOT_TOKEN.".into());
    }

    let (storage, tracker) = open_tracker(&config_read)?;
    let discord = DiscordClient::new(&config_read, Arc::clone(&tracker)).await?;
    info!("Discord client initialized with prefix {}", config_read.command_prefix);

    Ok(BotClients {
        storage,
        tracker,
        discord,
    })
}

pub async fn run(clients: BotClients, _config: Arc<RwLock<Config>>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let BotClients { storage, discord, .. } = clients;
    let discord = Arc::new(discord);

    let mut discord_handle = tokio::spawn({
        let discord = Arc::clone(&discord);
        async move { discord.start().await }
    });

    info!("Bot is now running. Press Ctrl+C to exit.");

    let discord_finished = tokio::select! {
        result = &mut discord_handle => {
            match result {
                Ok(Ok(())) => info!("Discord client stopped."),
                Ok(Err(e)) => error!("Discord client error: {}", e),
                Err(e) => error!("Discord task failed: {}", e),
            }
            true
        }
        _ = shutdown_signal() => false,
    };

    discord.shutdown().await;
    if !discord_finished && tokio::time::timeout(Duration::from_secs(10), discord_handle).await.is_err() {
        warn!("Discord client did not stop in time");
    }

    storage.close()?;
    info!("Bot has shut down.");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down."),
                    _ = terminate.recv() => info!("Received SIGTERM, shutting down."),
                }
                return;
            }
            Err(e) => warn!("Could not listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Could not listen for Ctrl+C: {}", e);
    }
    info!("Received Ctrl+C, shutting down.");
}
