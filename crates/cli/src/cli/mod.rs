pub mod commands;
pub mod output;

pub use commands::{CliArgs, Commands, ConfigArgs, ExtractArgs, InvestigateArgs};
pub use output::{OutputFormat, OutputFormatter};
