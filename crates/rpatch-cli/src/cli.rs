use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rpatch",
    about = "Add, override, and suppress recipes in a live registry",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (TOML). Defaults apply when absent.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the config's store root.
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Override the config's base snapshot file.
    #[arg(long, global = true)]
    pub base: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every visible recipe id
    List,
    /// Show one recipe and where it comes from
    Show(ShowArgs),
    /// Add a recipe from a JSON record file
    Add(AddArgs),
    /// Delete a recipe from every layer
    Delete(DeleteArgs),
    /// Manage overrides of built-in recipes
    Override(OverrideArgs),
    /// Manage suppressed recipe ids
    Blacklist(BlacklistArgs),
    /// Rebuild the registry from storage and report
    Reload,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: String,
}

#[derive(Args)]
pub struct AddArgs {
    pub file: PathBuf,
    /// Store under this id instead of the record's own
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub id: String,
}

#[derive(Args)]
pub struct OverrideArgs {
    #[command(subcommand)]
    pub action: OverrideAction,
}

#[derive(Subcommand)]
pub enum OverrideAction {
    Add { id: String, file: PathBuf },
    Remove { id: String },
    Clear,
    List,
}

#[derive(Args)]
pub struct BlacklistArgs {
    #[command(subcommand)]
    pub action: BlacklistAction,
}

#[derive(Subcommand)]
pub enum BlacklistAction {
    Add { id: String },
    Remove { id: String },
    Clear,
    List,
}
