use std::fmt::Write;
use async_trait::async_trait;
use crate::discord::command_system::{parse_governor_id, parse_governor_ids, Command, CommandContext};
use crate::error::{TrackerError, TrackerResult};
use crate::governors::LinkBatchReport;
use crate::storage::models::GovernorId;

pub struct LinkCommand;

#[async_trait]
impl Command for LinkCommand {
    fn name(&self) -> &'static str {
        "link"
    }

    fn usage(&self) -> &'static str {
        "link <MainGovernorId> <FarmGovernorId1> [<FarmGovernorId2> ...]"
    }

    fn description(&self) -> &'static str {
        "Link multiple farm accounts to a main account"
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

        match ctx.storage(move |tracker| tracker.links.link_farms(main, &farms)).await {
            Ok(report) => Ok(format_report(main, &report)),
            Err(TrackerError::UnknownAccount(id)) if id == main => {
                Ok(format!("Main governor with ID {} does not exist.", main))
            }
            Err(e) => Err(e),
        }
    }
}

fn format_report(main: GovernorId, report: &LinkBatchReport) -> String {
    let main_name = report
        .main
        .as_ref()
        .map(|account| account.governor_name.as_str())
        .unwrap_or_default();

    let mut reply = String::new();
    if report.linked.is_empty() {
        let _ = write!(reply, "No farm accounts were linked to main account {} (ID: {}).", main_name, main);
    } else {
        let _ = write!(
            reply,
            "Linked {} farm account(s) to main account {} (ID: {}):",
            report.linked.len(),
            main_name,
            main
        );
        for farm in &report.linked {
            let _ = write!(reply, "\n- Farm Governor: {} (ID: {})", farm.governor_name, farm.governor_id);
        }
    }

    if !report.unknown.is_empty() {
        reply.push_str("\n\nWarning: The following farm IDs are invalid and were not linked:");
        for id in &report.unknown {
            let _ = write!(reply, "\n- ID: {}", id);
        }
    }

    if !report.already_linked.is_empty() {
        reply.push_str("\n\nNote: The following farm accounts were already linked to a main account:");
        for (farm, owner) in &report.already_linked {
            let _ = write!(
                reply,
                "\n- Farm Governor ID: {} (Already linked to Main Governor ID: {})",
                farm, owner
            );
        }
    }

    if !report.rejected.is_empty() {
        reply.push_str("\n\nThe following farm accounts could not be linked:");
        for (farm, reason) in &report.rejected {
            let _ = write!(reply, "\n- Farm Governor ID: {}: {}", farm, reason);
        }
    }

    reply
}
