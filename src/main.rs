use anyhow::{anyhow, Context as _};
use clap::{Parser, Subcommand};
use mailstore_repair::config::{read_config, RepairConfig};
use mailstore_repair::storage::{load_store, save_store};
use mailstore_repair::task::{
    AdditionalInformation, RepairServices, RepairTask, TaskDto, TaskStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Mailstore repair - Detect and fix divergences between mail tables and their indexes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON store document to repair in place
    #[arg(short, long, env = "MAILSTORE_REPAIR_STORE")]
    store: PathBuf,

    /// Optional JSON configuration file
    #[arg(short, long, env = "MAILSTORE_REPAIR_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured concurrency of the message repair
    #[arg(long, env = "MAILSTORE_REPAIR_CONCURRENCY")]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Reconcile the mailbox table with the mailbox-path index
    Mailboxes,
    /// Reconcile the IMAP-UID table with the message-id index
    Messages,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => read_config(path)
            .await?
            .ok_or_else(|| anyhow!("Config file not found: {}", path.display()))?,
        None => RepairConfig::default(),
    };
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    config.validate()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let store = load_store(&args.store)
        .await
        .with_context(|| format!("Failed to load store {}", args.store.display()))?;
    let services = RepairServices::for_store(&store);

    let dto = match args.command {
        Command::Mailboxes => TaskDto::SolveMailboxInconsistencies,
        Command::Messages => TaskDto::SolveMessageInconsistencies {
            running_options: config.running_options()?,
        },
    };
    info!(task = %dto.to_json()?, store = %args.store.display(), "Starting task");

    let task = Arc::new(dto.into_task(&services));
    let cancel = CancellationToken::new();

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, draining in-flight entries");
                cancel.cancel();
            }
        }
    });

    let done = CancellationToken::new();
    if config.progress_interval_secs > 0 {
        tokio::spawn(report_progress(
            task.clone(),
            Duration::from_secs(config.progress_interval_secs),
            done.clone(),
        ));
    }

    let outcome = task.run(&cancel).await;
    done.cancel();

    let status = TaskStatus::from_outcome(&outcome);
    match &outcome {
        Ok(_) => {
            save_store(&args.store, &store).await?;
            info!(status = ?status, task_type = task.task_type(), "Task finished");
        }
        Err(e) => error!(status = ?status, error = %e, "Task failed"),
    }

    let details = task.details();
    println!("{}", serde_json::to_string_pretty(&details)?);

    outcome?;
    if details.cancelled() {
        return Err(anyhow!("Task cancelled before both scans finished"));
    }
    Ok(())
}

async fn report_progress(task: Arc<RepairTask>, period: Duration, done: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    // The first tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = done.cancelled() => break,
            _ = ticker.tick() => log_progress(&task.details()),
        }
    }
}

fn log_progress(details: &AdditionalInformation) {
    let errors = details.error_count();
    let at = details.timestamp();
    match details {
        AdditionalInformation::Mailbox(d) => info!(
            processed_mailboxes = d.processed_mailbox_entries,
            processed_paths = d.processed_mailbox_path_entries,
            fixed = d.fixed_inconsistencies.len(),
            conflicts = d.conflicting_entries.len(),
            errors,
            at = %at,
            "Progress"
        ),
        AdditionalInformation::Message(d) => info!(
            processed_imap_uids = d.processed_imap_uid_entries,
            processed_message_ids = d.processed_message_id_entries,
            fixed = d.fixed_inconsistencies.len(),
            conflicts = d.conflicting_entries.len(),
            errors,
            at = %at,
            "Progress"
        ),
    }
}
