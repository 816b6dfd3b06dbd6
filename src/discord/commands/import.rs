use std::time::Duration;
use async_trait::async_trait;
use chrono::Utc;
use crate::discord::command_system::{Command, CommandContext};
use crate::discord::roles::UserRole;
use crate::error::TrackerResult;

/// Imports touch many rows, so they get this many times the usual storage timeout.
const IMPORT_TIMEOUT_FACTOR: u32 = 60;

pub struct ImportCommand;

#[async_trait]
impl Command for ImportCommand {
    fn name(&self) -> &'static str {
        "import"
    }

    fn usage(&self) -> &'static str {
        "import"
    }

    fn description(&self) -> &'static str {
        "Import governors and their stats from a CSV file"
    }

    fn required_role(&self) -> UserRole {
        UserRole::Officer
    }

    fn wants_attachment(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &CommandContext, _args: &[String]) -> TrackerResult<String> {
        let Some(csv) = ctx.attachment.clone() else {
            return Err(ctx.usage_error("Please attach a CSV file when using the import command.", self.usage()));
        };

        let timeout = ctx.storage_timeout.saturating_mul(IMPORT_TIMEOUT_FACTOR).max(Duration::from_secs(30));
        let report = ctx
            .storage_within(timeout, move |tracker| tracker.importer.import_csv(csv.as_slice(), Utc::now()))
            .await?;
        Ok(report.to_string())
    }
}
