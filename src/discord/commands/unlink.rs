use async_trait::async_trait;
use crate::discord::command_system::{parse_governor_id, parse_governor_ids, Command, CommandContext};
use crate::error::TrackerResult;

pub struct UnlinkCommand;

#[async_trait]
impl Command for UnlinkCommand {
    fn name(&self) -> &'static str {
        "unlink"
    }

    fn usage(&self) -> &'static str {
        "unlink <MainGovernorId> <FarmGovernorId1> [<FarmGovernorId2> ...]"
    }

    fn description(&self) -> &'static str {
        "Unlink farm accounts from a main account"
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> TrackerResult<String> {
        if args.len() < 2 {
            return Err(ctx.usage_error(
                "Please provide a main governor ID and at least one farm governor ID.",
                self.usage(),
            ));
        }
        let main = parse_governor_id(&args[0])?;
        let farms = parse_governor_ids(&args[1..])?;

        let removed = ctx.storage(move |tracker| tracker.links.remove_links(main, &farms)).await?;
        Ok(format!("Unlinked {} farm account(s) from main account {}", removed, main))
    }
}
