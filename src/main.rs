use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod client;
mod config;
mod error;
mod model;
mod runner;
mod state;

use cli::{Cli, Commands};
use model::MutationKind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - only show logs with --verbose
    let filter = if cli.verbose {
        EnvFilter::new("followctl=debug")
    } else {
        EnvFilter::new("followctl=warn")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Unfollow(args) => cli::run::execute(args, MutationKind::Unfollow, None, false).await,
        Commands::Follow(args) => {
            cli::run::execute(args.run, MutationKind::Follow, Some(args.target), args.all_tiers)
                .await
        }
        Commands::Init(args) => cli::init::execute(args),
        Commands::Schema => cli::schema::execute(),
    }
}
