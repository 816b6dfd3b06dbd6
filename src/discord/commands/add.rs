use async_trait::async_trait;
use crate::discord::command_system::{parse_governor_id, Command, CommandContext};
use crate::error::{TrackerError, TrackerResult};

pub struct AddCommand;

#[async_trait]
impl Command for AddCommand {
    fn name(&self) -> &'static str {
        "add"
    }

    fn usage(&self) -> &'static str {
        "add <GovernorId> \"Governor Name\""
    }

    fn description(&self) -> &'static str {
        "Add a new governor with a specific ID"
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> TrackerResult<String> {
        let Some(raw_id) = args.first() else {
            return Err(ctx.usage_error("Please provide a valid Governor ID.", self.usage()));
        };
        let governor_id = parse_governor_id(raw_id)
            .map_err(|_| ctx.usage_error("Please provide a valid Governor ID.", self.usage()))?;

        // names may contain spaces and are usually quoted
        let governor_name = args[1..].join(" ").replace('"', "").trim().to_string();
        if governor_name.is_empty() {
            return Err(ctx.usage_error("Please provide a governor name.", self.usage()));
        }

        match ctx
            .storage(move |tracker| tracker.accounts.create_account(governor_id, &governor_name))
            .await
        {
            Ok(account) => Ok(format!(
                "Governor {} added with ID {}",
                account.governor_name, account.governor_id
            )),
            Err(TrackerError::DuplicateId(id)) => Ok(format!(
                "Governor with ID {} already exists. Choose a different ID.",
                id
            )),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::command_system::test_support::{args, context};
    use crate::discord::roles::UserRole;

    #[tokio::test]
    async fn adds_a_quoted_name() {
        let ctx = context(UserRole::Member);
        let reply = AddCommand
            .execute(&ctx, &args(&["1001", "\"Sir", "Lancelot\""]))
            .await
            .unwrap();

        assert_eq!(reply, "Governor Sir Lancelot added with ID 1001");
        let account = ctx.tracker.accounts.find_account(1001).unwrap().unwrap();
        assert_eq!(account.governor_name, "Sir Lancelot");
    }

    #[tokio::test]
    async fn duplicate_ids_are_explained() {
        let ctx = context(UserRole::Member);
        ctx.tracker.accounts.create_account(7, "First").unwrap();

        let reply = AddCommand.execute(&ctx, &args(&["7", "Second"])).await.unwrap();
        assert_eq!(reply, "Governor with ID 7 already exists. Choose a different ID.");
        assert_eq!(ctx.tracker.accounts.find_account(7).unwrap().unwrap().governor_name, "First");
    }

    #[tokio::test]
    async fn bad_arguments_show_usage() {
        let ctx = context(UserRole::Member);

        let err = AddCommand.execute(&ctx, &args(&["abc", "Name"])).await.unwrap_err();
        assert!(err.to_string().starts_with("Please provide a valid Governor ID. Usage: `!governor add"));

        let err = AddCommand.execute(&ctx, &args(&["5", "\"\""])).await.unwrap_err();
        assert!(err.to_string().starts_with("Please provide a governor name."));
    }
}
