use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{extract::ExtractArgs, schema::SchemaArgs, search::SearchArgs};

#[derive(Debug, Parser)]
#[command(
    name = "jsonit",
    version,
    about = "Bid/ad record extraction from heterogeneous device log text"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract deduplicated bid/ad records into the report envelope.
    Extract(ExtractArgs),
    /// Filter log lines by comma-separated keywords.
    Search(SearchArgs),
    /// Print the JSON Schema of the output envelope.
    Schema(SchemaArgs),
}
