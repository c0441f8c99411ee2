use clap::Subcommand;

use super::automate::AutomateArgs;
use super::config::ConfigArgs;
use super::record::RecordArgs;
use super::sessions::SessionsArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Drive a goal to completion against a live browser
    Automate(AutomateArgs),

    /// Record a user's interactions into a replayable recording
    Record(RecordArgs),

    /// Inspect, resume, or delete stored automation sessions
    Sessions(SessionsArgs),

    /// Show or initialize the active configuration
    Config(ConfigArgs),

    /// List the published automation tools
    Tools,
}
