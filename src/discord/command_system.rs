use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, error};
use crate::discord::commands;
use crate::discord::roles::UserRole;
use crate::error::{TrackerError, TrackerResult};
use crate::governors::GovernorTracker;
use crate::storage::models::GovernorId;

pub const GENERIC_FAILURE_REPLY: &str = "An error occurred while processing your command.";

/// Everything a command needs to answer one message.
pub struct CommandContext {
    pub tracker: Arc<GovernorTracker>,
    pub role: UserRole,
    pub prefix: String,
    pub officer_roles: Vec<String>,
    /// Body of the first attachment, downloaded only for commands that ask for one.
    pub attachment: Option<Vec<u8>>,
    pub storage_timeout: Duration,
}

impl CommandContext {
    /// Runs a blocking storage call off the async runtime, bounded by the configured timeout.
    pub async fn storage<T, F>(&self, f: F) -> TrackerResult<T>
    where
        F: FnOnce(&GovernorTracker) -> TrackerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.storage_within(self.storage_timeout, f).await
    }

    pub async fn storage_within<T, F>(&self, timeout: Duration, f: F) -> TrackerResult<T>
    where
        F: FnOnce(&GovernorTracker) -> TrackerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let tracker = Arc::clone(&self.tracker);
        let task = tokio::task::spawn_blocking(move || f(&tracker));
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(TrackerError::StorageUnavailable(format!("storage task failed: {}", e))),
            Err(_) => Err(TrackerError::StorageUnavailable(format!(
                "storage call did not finish within {}s",
                timeout.as_secs()
            ))),
        }
    }

    pub fn usage_error(&self, message: &str, usage: &str) -> TrackerError {
        TrackerError::Validation(format!("{} Usage: `{} {}`", message, self.prefix, usage))
    }

    pub fn is_officer(&self) -> bool {
        self.role >= UserRole::Officer
    }
}

#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;

    /// Arguments as typed after the prefix, e.g. `unlink <MainGovernorId> <FarmGovernorId>`.
    fn usage(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn required_role(&self) -> UserRole {
        UserRole::Member
    }

    fn wants_attachment(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> TrackerResult<String>;
}

pub struct CommandSystem {
    prefix: String,
    commands: Vec<Box<dyn Command>>,
}

impl CommandSystem {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            commands: commands::all(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Splits `!governor link 1 2` into `("link", ["1", "2"])`.
    /// Returns `None` when the message is not addressed to the bot.
    pub fn parse(&self, content: &str) -> Option<(String, Vec<String>)> {
        let mut words = content.split_whitespace();
        if !words.next()?.eq_ignore_ascii_case(&self.prefix) {
            return None;
        }
        let name = words.next().unwrap_or_default().to_lowercase();
        let args = words.map(str::to_string).collect();
        Some((name, args))
    }

    pub fn find(&self, name: &str) -> Option<&dyn Command> {
        self.commands
            .iter()
            .find(|command| command.name() == name)
            .map(|command| command.as_ref())
    }

    pub fn wants_attachment(&self, name: &str) -> bool {
        self.find(name).map_or(false, |command| command.wants_attachment())
    }

    /// The reply for `content`, or `None` if the message is not a governor command.
    pub async fn dispatch(&self, ctx: &CommandContext, content: &str) -> Option<String> {
        let (name, args) = self.parse(content)?;

        let Some(command) = self.find(&name) else {
            return Some(format!(
                "Invalid governor command. Use `{} help` to see the available commands.",
                self.prefix
            ));
        };

        if ctx.role < command.required_role() {
            return Some(format!(
                "Sorry, you do not have permission to use the {} command. Only members with the {} roles can use it.",
                command.name(),
                ctx.officer_roles.join(", ")
            ));
        }

        debug!("Running governor command '{}' with {} argument(s)", name, args.len());
        Some(match command.execute(ctx, &args).await {
            Ok(reply) => reply,
            Err(e) => error_reply(command.name(), e),
        })
    }
}

/// Storage failures are logged and hidden behind a generic reply; every other
/// error is something the user can act on, so its message goes back verbatim.
pub fn error_reply(command: &str, err: TrackerError) -> String {
    match err {
        TrackerError::StorageUnavailable(_) | TrackerError::Migration(_) => {
            error!("Governor command '{}' failed: {}", command, err);
            GENERIC_FAILURE_REPLY.to_string()
        }
        other => other.to_string(),
    }
}

pub fn parse_governor_id(raw: &str) -> TrackerResult<GovernorId> {
    match raw.trim().parse::<GovernorId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(TrackerError::Validation(format!("'{}' is not a valid governor ID.", raw))),
    }
}

pub fn parse_governor_ids(raw: &[String]) -> TrackerResult<Vec<GovernorId>> {
    raw.iter().map(|value| parse_governor_id(value)).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::storage::StorageClient;

    pub fn context(role: UserRole) -> CommandContext {
        let storage = Arc::new(StorageClient::open_in_memory().unwrap());
        CommandContext {
            tracker: Arc::new(GovernorTracker::new(storage)),
            role,
            prefix: "!governor".to_string(),
            officer_roles: vec!["R4".to_string(), "Council".to_string(), "King".to_string()],
            attachment: None,
            storage_timeout: Duration::from_secs(5),
        }
    }

    pub fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::context;
    use super::*;

    #[test]
    fn parse_requires_the_prefix() {
        let system = CommandSystem::new("!governor");
        assert_eq!(
            system.parse("!governor LINK 1  2"),
            Some(("link".to_string(), vec!["1".to_string(), "2".to_string()]))
        );
        assert_eq!(system.parse("!Governor"), Some((String::new(), Vec::new())));
        assert_eq!(system.parse("!governors link"), None);
        assert_eq!(system.parse("hello !governor"), None);
        assert_eq!(system.parse(""), None);
    }

    #[test]
    fn governor_ids_must_be_positive_integers() {
        assert_eq!(parse_governor_id(" 42 "), Ok(42));
        assert!(parse_governor_id("0").is_err());
        assert!(parse_governor_id("12abc").is_err());
        assert_eq!(
            parse_governor_ids(&["1".to_string(), "x".to_string()]),
            Err(TrackerError::Validation("'x' is not a valid governor ID.".to_string()))
        );
    }

    #[test]
    fn storage_errors_get_a_generic_reply() {
        assert_eq!(
            error_reply("add", TrackerError::StorageUnavailable("disk I/O error".to_string())),
            GENERIC_FAILURE_REPLY
        );
        assert_eq!(error_reply("add", TrackerError::SelfLink(3)), TrackerError::SelfLink(3).to_string());
    }

    #[tokio::test]
    async fn unknown_commands_point_at_help() {
        let system = CommandSystem::new("!governor");
        let ctx = context(UserRole::Member);

        let reply = system.dispatch(&ctx, "!governor frobnicate").await.unwrap();
        assert!(reply.starts_with("Invalid governor command."));
        assert!(system.dispatch(&ctx, "good morning").await.is_none());
    }

    #[tokio::test]
    async fn officer_commands_are_refused_for_members() {
        let system = CommandSystem::new("!governor");
        let ctx = context(UserRole::Member);

        let reply = system.dispatch(&ctx, "!governor import").await.unwrap();
        assert!(reply.starts_with("Sorry, you do not have permission to use the import command."));
        assert!(reply.contains("R4, Council, King"));
    }

    #[tokio::test]
    async fn closed_storage_is_reported_generically() {
        let system = CommandSystem::new("!governor");
        let ctx = context(UserRole::Member);
        ctx.tracker.storage().close().unwrap();

        let reply = system.dispatch(&ctx, "!governor farms 1").await.unwrap();
        assert_eq!(reply, GENERIC_FAILURE_REPLY);
    }
}
