pub mod init;
pub mod run;
pub mod schema;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "followctl")]
#[command(
    author,
    version,
    about = "Rate-limited bulk follow/unfollow runner for GraphQL-backed publishing platforms"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Unfollow every account the configured user follows
    Unfollow(RunArgs),

    /// Follow the followers of another account
    Follow(FollowArgs),

    /// Write a starter config file
    Init(InitArgs),

    /// Print JSON Schema for config validation
    Schema,
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Path to config file
    #[arg(short, long, default_value = "followctl.yaml")]
    pub config: PathBuf,

    /// Run even if the same run finished within the cooldown window
    #[arg(long)]
    pub force: bool,

    /// Show the first page and settings without mutating anything
    #[arg(long)]
    pub dry_run: bool,

    /// Stop after this many accounts have been queued
    #[arg(long)]
    pub max: Option<usize>,
}

#[derive(Args, Clone)]
pub struct FollowArgs {
    /// Account whose followers will be followed
    #[arg(long)]
    pub target: String,

    /// Follow all followers, not only paying members
    #[arg(long)]
    pub all_tiers: bool,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Clone)]
pub struct InitArgs {
    /// Your account handle
    #[arg(long)]
    pub username: String,

    /// Where to write the config
    #[arg(long, default_value = "followctl.yaml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}
