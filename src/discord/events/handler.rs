use serenity::async_trait;
use serenity::model::prelude::*;
use serenity::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use log::{debug, error, info, warn};
use crate::discord::command_system::{CommandContext, CommandSystem};
use crate::discord::format::{split_message, DISCORD_MESSAGE_LIMIT};
use crate::discord::roles::{self, UserRole};
use crate::governors::GovernorTracker;

pub struct EventHandler {
    tracker: Arc<GovernorTracker>,
    commands: CommandSystem,
    officer_roles: Vec<String>,
    storage_timeout: Duration,
}

impl EventHandler {
    pub fn new(
        tracker: Arc<GovernorTracker>,
        prefix: &str,
        officer_roles: Vec<String>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            tracker,
            commands: CommandSystem::new(prefix),
            officer_roles,
            storage_timeout,
        }
    }

    async fn send_reply(&self, ctx: &Context, msg: &Message, reply: &str) {
        for chunk in split_message(reply, DISCORD_MESSAGE_LIMIT) {
            if let Err(why) = msg.reply(ctx, chunk).await {
                error!("Cannot reply to governor command: {}", why);
                break;
            }
        }
    }
}

#[async_trait]
impl serenity::client::EventHandler for EventHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some((name, _)) = self.commands.parse(&msg.content) else {
            return;
        };
        debug!("Governor command '{}' from {}", name, msg.author.name);

        let role = match roles::member_role_names(&ctx, &msg).await {
            Ok(names) => UserRole::from_role_names(names.iter().map(String::as_str), &self.officer_roles),
            Err(why) => {
                warn!("Could not look up roles for {}: {}", msg.author.name, why);
                UserRole::Member
            }
        };

        let mut attachment = None;
        if role >= UserRole::Officer && self.commands.wants_attachment(&name) {
            if let Some(file) = msg.attachments.first() {
                match file.download().await {
                    Ok(bytes) => attachment = Some(bytes),
                    Err(why) => {
                        error!("Failed to download attachment {}: {}", file.filename, why);
                        self.send_reply(&ctx, &msg, "Could not download the attached file. Please try again.").await;
                        return;
                    }
                }
            }
        }

        let command_ctx = CommandContext {
            tracker: Arc::clone(&self.tracker),
            role,
            prefix: self.commands.prefix().to_string(),
            officer_roles: self.officer_roles.clone(),
            attachment,
            storage_timeout: self.storage_timeout,
        };

        if let Some(reply) = self.commands.dispatch(&command_ctx, &msg.content).await {
            self.send_reply(&ctx, &msg, &reply).await;
        }
    }
}
