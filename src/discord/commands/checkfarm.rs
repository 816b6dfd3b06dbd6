use std::fmt::Write;
use async_trait::async_trait;
use crate::discord::command_system::{parse_governor_id, Command, CommandContext};
use crate::error::TrackerResult;

pub struct CheckFarmCommand;

#[async_trait]
impl Command for CheckFarmCommand {
    fn name(&self) -> &'static str {
        "checkfarm"
    }

    fn usage(&self) -> &'static str {
        "checkfarm <FarmGovernorId>"
    }

    fn description(&self) -> &'static str {
        "Find main account(s) that own a specific farm account"
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> TrackerResult<String> {
        let Some(raw_id) = args.first() else {
            return Err(ctx.usage_error("Please provide a farm governor ID.", self.usage()));
        };
        let farm = parse_governor_id(raw_id)?;

        let (account, owners) = ctx
            .storage(move |tracker| {
                let account = tracker.accounts.find_account(farm)?;
                let owners = tracker.links.find_owners(farm)?;
                Ok((account, owners))
            })
            .await?;

        let Some(account) = account else {
            return Ok(format!("No governor found with ID {}", farm));
        };
        if owners.is_empty() {
            return Ok(format!(
                "Governor {} ({}) is not linked as a farm account to any main accounts.",
                farm, account.governor_name
            ));
        }

        let mut reply = format!(
            "Governor {} ({}) is linked as a farm account to the following main account(s):",
            farm, account.governor_name
        );
        for owner in &owners {
            let _ = write!(reply, "\n- Main Governor ID: {}, Name: {}", owner.governor_id, owner.governor_name);
        }
        Ok(reply)
    }
}
