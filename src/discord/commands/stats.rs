use std::fmt::Write;
use async_trait::async_trait;
use crate::discord::command_system::{parse_governor_id, Command, CommandContext};
use crate::discord::format::{format_amount, format_count};
use crate::error::TrackerResult;
use crate::storage::models::{LinkedAccount, StatSnapshot};

pub struct StatsCommand;

#[async_trait]
impl Command for StatsCommand {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn usage(&self) -> &'static str {
        "stats <GovernorId>"
    }

    fn description(&self) -> &'static str {
        "View latest stats for a governor"
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> TrackerResult<String> {
        let Some(raw_id) = args.first() else {
            return Err(ctx.usage_error("Please provide a governor ID.", self.usage()));
        };
        let governor_id = parse_governor_id(raw_id)?;

        let (account, snapshot, farms) = ctx
            .storage(move |tracker| {
                let account = tracker.accounts.find_account(governor_id)?;
                let snapshot = tracker.stats.latest_snapshot(governor_id)?;
                let farms = tracker.links.list_farms(governor_id)?;
                Ok((account, snapshot, farms))
            })
            .await?;

        let Some(snapshot) = snapshot else {
            return Ok(format!("No stats found for governor ID {}", governor_id));
        };
        let name = account
            .map(|account| account.governor_name)
            .unwrap_or_else(|| snapshot.governor_name.clone());

        Ok(format_stats(&name, &snapshot, &farms))
    }
}

fn format_stats(name: &str, snapshot: &StatSnapshot, farms: &[LinkedAccount]) -> String {
    let s = &snapshot.fields;
    let mut reply = format!(
        "**Governor Stats**\n\
         Name: {}\n\
         Governor ID: {}\n\
         Alliance: {}\n\
         Last Updated: {}\n\
         \n\
         **Combat Stats**\n\
         - Power: {}\n\
         - Kill Points: {}\n\
         - Total Deaths: {}\n\
         \n\
         **Kill Breakdown**\n\
         - T1 Kills: {}\n\
         - T2 Kills: {}\n\
         - T3 Kills: {}\n\
         - T4 Kills: {}\n\
         - T5 Kills: {}\n\
         \n\
         **Support**\n\
         - RSS Assistance: {}\n\
         - Alliance Helps: {}",
        name,
        snapshot.governor_id,
        s.alliance.as_deref().unwrap_or("N/A"),
        snapshot.snapshot_time.format("%Y-%m-%d %H:%M:%S UTC"),
        format_count(s.power),
        format_amount(s.total_kill_points),
        format_amount(s.dead),
        format_count(s.t1_kills),
        format_count(s.t2_kills),
        format_count(s.t3_kills),
        format_count(s.t4_kills),
        format_count(s.t5_kills),
        format_amount(s.assistance),
        format_amount(s.helps),
    );

    if !farms.is_empty() {
        reply.push_str("\n\n**Linked Farm Accounts:**");
        for farm in farms {
            let _ = write!(reply, "\n- Farm Governor ID: {}, Name: {}", farm.governor_id, farm.governor_name);
        }
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::discord::command_system::test_support::{args, context};
    use crate::discord::roles::UserRole;
    use crate::storage::models::{NewSnapshot, SnapshotFields};

    #[tokio::test]
    async fn shows_the_latest_snapshot_and_farms() {
        let ctx = context(UserRole::Member);
        ctx.tracker.accounts.create_account(1, "Main").unwrap();
        ctx.tracker.accounts.create_account(2, "Farm").unwrap();
        ctx.tracker.links.create_link(1, 2).unwrap();
        for (day, power) in [(1, 10_000_000), (2, 12_345_678)] {
            ctx.tracker
                .stats
                .upsert_snapshot(&NewSnapshot {
                    governor_id: 1,
                    governor_name: "Main".to_string(),
                    snapshot_time: Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap(),
                    fields: SnapshotFields {
                        power: Some(power),
                        t4_kills: Some(1_500),
                        assistance: Some(2_000_000.0),
                        ..Default::default()
                    },
                })
                .unwrap();
        }

        let reply = StatsCommand.execute(&ctx, &args(&["1"])).await.unwrap();

        assert!(reply.starts_with("**Governor Stats**\nName: Main\nGovernor ID: 1\nAlliance: N/A"));
        assert!(reply.contains("Last Updated: 2025-03-02 12:00:00 UTC"));
        assert!(reply.contains("- Power: 12,345,678"));
        assert!(reply.contains("- T4 Kills: 1,500"));
        assert!(reply.contains("- T5 Kills: N/A"));
        assert!(reply.contains("- RSS Assistance: 2,000,000"));
        assert!(reply.ends_with("**Linked Farm Accounts:**\n- Farm Governor ID: 2, Name: Farm"));
    }

    #[tokio::test]
    async fn governors_without_snapshots() {
        let ctx = context(UserRole::Member);
        ctx.tracker.accounts.create_account(3, "Fresh").unwrap();

        let reply = StatsCommand.execute(&ctx, &args(&["3"])).await.unwrap();
        assert_eq!(reply, "No stats found for governor ID 3");
    }
}
