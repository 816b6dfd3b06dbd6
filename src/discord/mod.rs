mod client;
mod events;
mod commands;
pub mod command_system;
pub mod format;
pub mod roles;

pub use client::DiscordClient;
pub use command_system::{Command, CommandContext, CommandSystem};
