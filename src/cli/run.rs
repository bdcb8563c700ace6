use crate::cli::RunArgs;
use crate::client::{create_client, ListSource};
use crate::config::{validate_username, Config};
use crate::error::ClientError;
use crate::model::{MutationKind, Page, Tier};
use crate::runner::{BulkRunController, Phase, RunSettings, RunState, RunStatus, RunSummary};
use crate::state::RunJournal;
use anyhow::{bail, Context};
use chrono::Duration;
use tracing::{error, info, warn};

pub async fn execute(
    args: RunArgs,
    kind: MutationKind,
    target: Option<String>,
    all_tiers: bool,
) -> anyhow::Result<()> {
    // Load and validate config
    info!("Loading config from {:?}", args.config);
    let mut config = Config::load(&args.config)?;

    // Apply CLI overrides
    if all_tiers {
        config.follow.members_only = false;
    }
    config.validate()?;

    let target = target.map(|t| validate_username(&t)).transpose()?;
    let account = target.clone().unwrap_or_else(|| config.username.clone());

    // Refuse to repeat a run inside the cooldown window (unless --force)
    let mut journal = RunJournal::load(&config.state_dir);
    if !args.force {
        if let Some(record) =
            journal.recent(&account, kind, Duration::hours(config.cooldown_hours))
        {
            bail!(
                "Last {} run for @{} finished at {} ({} done, {} failed); use --force to run again",
                kind,
                account,
                record.last_run.format("%Y-%m-%d %H:%M UTC"),
                record.completed,
                record.failed
            );
        }
    }

    let source = ListSource::for_kind(kind, &config.username, target.as_deref());
    let client = create_client(&config, source)?;
    let mut settings = RunSettings::from_config(&config, kind);
    settings.max_entities = args.max;

    // First page up front: an expired session or empty list fails fast
    let first = tokio::time::timeout(config.request_timeout(), client.list_page(None))
        .await
        .map_err(|_| ClientError::Timeout(config.request_timeout()))
        .and_then(|page| page)
        .context("Failed to load the first page")?;

    if args.dry_run {
        info!("DRY RUN - no mutations will be sent");
        print_execution_plan(&config, kind, &account, &first, &settings);
        return Ok(());
    }

    if first.entities.is_empty() {
        println!("Nothing to {}: the list is empty.", kind);
        return Ok(());
    }

    let controller = BulkRunController::new(client, settings);
    controller.tracker().subscribe(render_progress);

    let run = controller.start(first.entities, first.next, kind);
    tokio::pin!(run);
    let summary = tokio::select! {
        summary = &mut run => summary?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Ctrl-C received; stopping after the current request");
            controller.cancel();
            run.await?
        }
    };

    // Journal the run
    journal.record(&account, &summary);
    if let Err(e) = journal.save(&config.state_dir) {
        warn!("Failed to save run journal: {}", e);
    }

    print_summary(&summary);

    if summary.status() == RunStatus::Failed {
        error!(
            "Run failed: {}",
            summary.state.last_error.as_deref().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }

    Ok(())
}

/// Single-line live progress on stderr.
fn render_progress(state: &RunState) {
    let countdown = match (state.phase, state.next_action_in) {
        (Phase::Waiting, Some(left)) => format!(" | next in {}s", left.as_secs_f64().ceil() as u64),
        _ => String::new(),
    };

    eprint!(
        "\r\x1b[2K[{}/{}] {} remaining, {} failed{} | {}",
        state.completed, state.total, state.remaining, state.failed, countdown, state.message
    );
    if state.status.is_terminal() {
        eprintln!();
    }
}

fn print_summary(summary: &RunSummary) {
    let state = &summary.state;
    println!("\n=== Bulk {} {} ===\n", summary.kind, state.status);
    println!("Run: {}", summary.run_id);
    println!("Duration: {:.1}s", summary.duration.as_secs_f64());
    println!("Queued: {}", state.total);
    println!("Done: {}", state.completed);
    println!("Failed: {}", state.failed);
    println!("Not attempted: {}", state.remaining);

    if !summary.failed_entities.is_empty() {
        println!("\nFailed accounts:");
        for entity in &summary.failed_entities {
            println!("  - {} ({})", entity.label(), entity.id);
        }
    }
    println!();
}

fn print_execution_plan(
    config: &Config,
    kind: MutationKind,
    account: &str,
    page: &Page,
    settings: &RunSettings,
) {
    let limits = config.rate_limit(kind);

    println!("\n=== Execution Plan ===\n");
    println!("Action: {} ({})", kind, account);
    println!("Endpoint: {}", config.endpoint);
    println!(
        "Delay between {}s: {}ms..{}ms",
        kind, limits.min_delay_ms, limits.max_delay_ms
    );
    println!(
        "Retries: {} attempts, {}ms apart",
        config.retry.max_attempts, config.retry.backoff_ms
    );
    if let Some(max) = settings.max_entities {
        println!("Cap: {} accounts", max);
    }
    if settings.tier_filter == Some(Tier::Privileged) {
        println!("Members only: yes");
    }

    println!(
        "\nFirst page ({} accounts, more: {}):",
        page.entities.len(),
        page.next.has_more
    );
    for entity in &page.entities {
        let skipped = settings
            .tier_filter
            .map_or(false, |tier| entity.tier != tier);
        println!(
            "  - {} {}{}",
            entity.label(),
            entity.display_name,
            if skipped { " [SKIP - tier]" } else { "" }
        );
    }
    println!();
}
