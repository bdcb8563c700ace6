use crate::cli::InitArgs;
use crate::config::{validate_username, Config};
use anyhow::{bail, Context};
use tracing::info;

pub fn execute(args: InitArgs) -> anyhow::Result<()> {
    let username = validate_username(&args.username)?;

    if args.path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            args.path.display()
        );
    }

    std::fs::write(&args.path, Config::template(&username))
        .with_context(|| format!("Failed to write {}", args.path.display()))?;

    info!("Wrote config to {:?}", args.path);
    println!("Created {}", args.path.display());
    println!(
        "Export your session cookie before running: export {}='<cookie header>'",
        Config::default().session_env
    );
    Ok(())
}
