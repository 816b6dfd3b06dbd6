use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::logging::LogLevel;

pub const DEFAULT_CONFIG_PATH: &str = "governor-tracker.conf";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub discord_token: Option<String>,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_officer_roles")]
    pub officer_roles: Vec<String>,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_storage_timeout_secs")]
    pub storage_timeout_secs: u64,
    #[serde(skip)]
    path: PathBuf,
}

fn default_database_path() -> String {
    "governors.db".to_string()
}

fn default_command_prefix() -> String {
    "!governor".to_string()
}

fn default_officer_roles() -> Vec<String> {
    vec!["R4".to_string(), "Council".to_string(), "King".to_string()]
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_storage_timeout_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Config {
            discord_token: None,
            database_path: default_database_path(),
            command_prefix: default_command_prefix(),
            officer_roles: default_officer_roles(),
            log_level: LogLevel::default(),
            log_dir: default_log_dir(),
            storage_timeout_secs: default_storage_timeout_secs(),
            path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }
}

impl Config {
    /// Reads the TOML file at `path` (if present) and layers `GOVTRACK_*`
    /// environment variables over it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                ::config::Environment::with_prefix("GOVTRACK")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("officer_roles"),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        config.path = path.to_path_buf();

        if config.discord_token.is_none() {
            config.discord_token = std::env::var("DISCORD_BOT_TOKEN").ok().filter(|t| !t.trim().is_empty());
        }
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(toml::from_str(contents)?)
    }

    pub fn prompt_for_missing_fields(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.discord_token.is_none() {
            println!("No Discord bot token configured.");
            println!("Create a bot at https://discord.com/developers/applications, enable the");
            println!("Message Content intent, and invite it to your server with Send Messages.");
            let token = Self::prompt_input("Enter your Discord Bot Token: ")?;
            if token.is_empty() {
                return Err("A Discord bot token is required to run the bot".into());
            }
            self.discord_token = Some(token);
            self.save()?;
        }
        Ok(())
    }

    fn prompt_input(prompt: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        print!("{}", prompt);
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let toml = toml::to_string(self)?;
        fs::write(&self.path, toml)?;
        println!("Config saved to: {:?}", self.path);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs.max(1))
    }

    pub fn is_discord_configured(&self) -> bool {
        self.discord_token.as_deref().map_or(false, |t| !t.trim().is_empty())
    }

    pub fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
    }
}
