use std::fmt::Write;
use async_trait::async_trait;
use crate::discord::command_system::{Command, CommandContext};
use crate::discord::commands;
use crate::error::TrackerResult;

pub struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn usage(&self) -> &'static str {
        "help"
    }

    fn description(&self) -> &'static str {
        "Show this help message"
    }

    async fn execute(&self, ctx: &CommandContext, _args: &[String]) -> TrackerResult<String> {
        let mut reply = String::from("**Governor Tracker Bot Commands**");
        for command in commands::all() {
            let _ = write!(reply, "\n- `{} {}`: {}", ctx.prefix, command.usage(), command.description());
        }

        if ctx.is_officer() {
            let roles = ctx
                .officer_roles
                .iter()
                .map(|role| format!("`{}`", role))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(
                reply,
                "\n\n**CSV Import Guide (Visible to Officers Only)**\n\
                 - Only users with the {roles} roles can import governors\n\
                 1. Prepare your CSV file:\n\
                 - Use comma-separated values (.csv)\n\
                 - Include required columns: Governor ID, Governor Name, Snapshot Time (UTC)\n\
                 - Optional columns include: Alliance, Power, T1 to T5, Dead, Healed, etc.\n\
                 2. How to import:\n\
                 - Attach the CSV file to a message in the bot's channel\n\
                 - Type `{prefix} import` as the message text and send it\n\
                 \n\
                 **Troubleshooting**\n\
                 - Ensure all required columns are present\n\
                 - Numbers may use thousands separators, blank cells are left empty\n\
                 - Snapshot times look like 2025-03-01 10:00:00 and are read as UTC\n\
                 - Importing the same governor and snapshot time again overwrites that snapshot",
                roles = roles,
                prefix = ctx.prefix,
            );
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::command_system::test_support::context;
    use crate::discord::roles::UserRole;

    #[tokio::test]
    async fn members_see_the_command_list() {
        let ctx = context(UserRole::Member);
        let reply = HelpCommand.execute(&ctx, &[]).await.unwrap();

        assert!(reply.starts_with("**Governor Tracker Bot Commands**\n- `!governor add <GovernorId> \"Governor Name\"`: Add a new governor with a specific ID"));
        assert!(reply.contains("- `!governor help`: Show this help message"));
        assert!(!reply.contains("CSV Import Guide"));
    }

    #[tokio::test]
    async fn officers_also_get_the_import_guide() {
        let ctx = context(UserRole::Officer);
        let reply = HelpCommand.execute(&ctx, &[]).await.unwrap();

        assert!(reply.contains("**CSV Import Guide (Visible to Officers Only)**"));
        assert!(reply.contains("`R4`, `Council`, `King`"));
        assert!(reply.contains("Type `!governor import`"));
    }
}
