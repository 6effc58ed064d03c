//! cmscast-send - Background daemon for scheduled social posts
//!
//! Polls the post queue and publishes every post whose scheduled time has
//! arrived, rescheduling or failing posts according to the retry policy.

use anyhow::Context;
use clap::Parser;
use libcmscast::logging::{LogFormat, LoggingConfig};
use libcmscast::service::dispatch::DispatchSummary;
use libcmscast::service::events::Event;
use libcmscast::{CmscastError, Config, SocialService};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "cmscast-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled social posts")]
#[command(long_about = "\
cmscast-send - Background daemon for scheduled social posts

DESCRIPTION:
    cmscast-send is a long-running daemon that watches the Cmscast post
    queue and publishes scheduled posts once they are due.

    Every poll it loads a batch of due posts, publishes each one through
    its platform client and records the outcome. Failed posts are retried
    after a fixed delay until their retry budget is spent. A post that
    panics or errors never stops the rest of the batch.

USAGE:
    # Run in foreground (logs to stderr)
    cmscast-send

    # Poll every 30 seconds
    cmscast-send --poll-interval 30s

    # Structured logs for a log shipper
    cmscast-send --log-format json

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current batch)

CONFIGURATION:
    Configuration file: ~/.config/cmscast/config.toml
    Database location: ~/.local/share/cmscast/cmscast.db

    [scheduling]
    poll_interval = \"5m\"   # time between polls
    retry_delay = \"5m\"     # delay before a failed post is retried
    max_retries = 3        # retry budget for new posts
    batch_size = 50        # due posts handled per poll

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime or configuration error
")]
struct Cli {
    /// Poll interval (overrides config), e.g. "30s" or "5m"
    #[arg(long, value_name = "DURATION")]
    poll_interval: Option<String>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, default_value = "text", env = "CMSCAST_LOG_FORMAT")]
    log_format: LogFormat,

    /// Run once and exit (for testing)
    #[arg(long, hide = true)]
    #[arg(help = "Process due posts once, print the summary and exit")]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::new(cli.log_format, "info".to_string(), cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

/// Library errors carry their own exit code; anything else is 1
fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<CmscastError>()
        .map(CmscastError::exit_code)
        .unwrap_or(1)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;

    let poll_interval = match cli.poll_interval.as_deref() {
        Some(raw) => humantime::parse_duration(raw).map_err(|e| {
            CmscastError::InvalidInput(format!("Invalid poll interval '{}': {}", raw, e))
        })?,
        None => config.scheduling.poll_interval()?,
    };

    let service = SocialService::from_config(config).await?;
    spawn_event_logger(&service);

    info!("cmscast-send daemon starting");

    if cli.once {
        let summary = service.process_pending_posts().await?;
        print_summary(&summary)?;
        info!("cmscast-send: processed posts once, exiting");
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    info!(poll_interval = ?poll_interval, "Poll interval");
    run_daemon_loop(&service, poll_interval, shutdown).await;

    info!("cmscast-send daemon stopped");
    Ok(())
}

/// Log progress events from the service at debug level
fn spawn_event_logger(service: &SocialService) {
    let mut events = service.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match &event {
                Event::PostFailed { post_id, error, .. } => {
                    warn!(post_id = %post_id, error = %error, "Post failed permanently");
                }
                other => debug!(event = ?other, "Dispatch event"),
            }
        }
    });
}

fn print_summary(summary: &DispatchSummary) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Could not encode dispatch summary")?;
    println!("{}", json);
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Signal setup failed")?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
    Ok(())
}

/// Main daemon loop
async fn run_daemon_loop(service: &SocialService, poll_interval: Duration, shutdown: Arc<AtomicBool>) {
    let seconds = poll_interval.as_secs().max(1);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        match service.process_pending_posts().await {
            Ok(summary) if summary.posts_processed > 0 => info!(
                processed = summary.posts_processed,
                published = summary.successful_posts,
                failed = summary.failed_posts,
                "Dispatch run finished"
            ),
            Ok(_) => debug!("No posts due"),
            Err(CmscastError::DispatchInProgress) => warn!("Previous dispatch still running, skipping poll"),
            Err(e) => error!("Error processing posts: {}", e),
        }

        // Sleep until next poll (check shutdown every second)
        for _ in 0..seconds {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}
