use serenity::gateway::ShardManager;
use serenity::prelude::*;
use crate::config::Config;
use crate::governors::GovernorTracker;
use std::sync::Arc;
use std::time::Duration;
use log::{info, warn};
use tokio::sync::Mutex;

use super::events::EventHandler;

pub struct DiscordClient {
    client: Mutex<Option<Client>>,
    shard_manager: Arc<ShardManager>,
}

impl DiscordClient {
    pub async fn new(config: &Config, tracker: Arc<GovernorTracker>) -> Result<Self, serenity::Error> {
        let token = config
            .discord_token
            .clone()
            .ok_or(serenity::Error::Other("Discord token not found in configuration"))?;

        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let handler = EventHandler::new(
            tracker,
            &config.command_prefix,
            config.officer_roles.clone(),
            config.storage_timeout(),
        );
        let client = Client::builder(&token, intents).event_handler(handler).await?;
        let shard_manager = Arc::clone(&client.shard_manager);

        Ok(Self {
            client: Mutex::new(Some(client)),
            shard_manager,
        })
    }

    /// Runs the gateway connection until [`DiscordClient::shutdown`] is called or it fails.
    pub async fn start(&self) -> Result<(), serenity::Error> {
        let client = self.client.lock().await.take();
        match client {
            Some(mut client) => client.start().await,
            None => Err(serenity::Error::Other("Discord client has already been started")),
        }
    }

    pub async fn shutdown(&self) {
        info!("Shutting down DiscordClient...");
        match tokio::time::timeout(Duration::from_secs(10), self.shard_manager.shutdown_all()).await {
            Ok(_) => info!("Discord shards shut down successfully"),
            Err(_) => warn!("Timed out while shutting down Discord shards"),
        }
    }
}
