use std::fmt::Write;
use async_trait::async_trait;
use crate::discord::command_system::{parse_governor_id, Command, CommandContext};
use crate::error::TrackerResult;

pub struct FarmsCommand;

#[async_trait]
impl Command for FarmsCommand {
    fn name(&self) -> &'static str {
        "farms"
    }

    fn usage(&self) -> &'static str {
        "farms <MainGovernorId>"
    }

    fn description(&self) -> &'static str {
        "List all farm accounts for a main account"
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> TrackerResult<String> {
        let Some(raw_id) = args.first() else {
            return Err(ctx.usage_error("Please provide a main governor ID.", self.usage()));
        };
        let main = parse_governor_id(raw_id)?;

        let farms = ctx.storage(move |tracker| tracker.links.list_farms(main)).await?;
        if farms.is_empty() {
            return Ok(format!("No farm accounts found for main governor ID {}", main));
        }

        let mut reply = format!("Farm Accounts for Main Governor ID {}:", main);
        for farm in &farms {
            let _ = write!(reply, "\n- Farm Governor ID: {}, Name: {}", farm.governor_id, farm.governor_name);
        }
        Ok(reply)
    }
}
