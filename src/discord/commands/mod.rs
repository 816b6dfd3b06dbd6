mod add;
mod checkfarm;
mod farms;
mod help;
mod import;
mod link;
mod stats;
mod unlink;

pub use add::AddCommand;
pub use checkfarm::CheckFarmCommand;
pub use farms::FarmsCommand;
pub use help::HelpCommand;
pub use import::ImportCommand;
pub use link::LinkCommand;
pub use stats::StatsCommand;
pub use unlink::UnlinkCommand;

use crate::discord::command_system::Command;

/// Every governor command, in the order `help` lists them.
pub fn all() -> Vec<Box<dyn Command>> {
    vec![
        Box::new(AddCommand),
        Box::new(LinkCommand),
        Box::new(UnlinkCommand),
        Box::new(FarmsCommand),
        Box::new(CheckFarmCommand),
        Box::new(StatsCommand),
        Box::new(ImportCommand),
        Box::new(HelpCommand),
    ]
}
