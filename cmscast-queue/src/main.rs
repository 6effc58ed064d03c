//! cmscast-queue - Manage scheduled social posts
//!
//! Operator tool for the post queue: list, cancel, publish now,
//! reschedule and statistics.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use libcmscast::logging::{LogFormat, LoggingConfig};
use libcmscast::scheduling::parse_schedule;
use libcmscast::types::{PostFilter, PostStats};
use libcmscast::{CmscastError, Config, PostStatus, SocialPlatform, SocialPost, SocialService};
use serde_json::json;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cmscast-queue")]
#[command(version)]
#[command(about = "Manage scheduled social posts")]
#[command(long_about = "\
cmscast-queue - Manage scheduled social posts

DESCRIPTION:
    cmscast-queue manages the Cmscast post queue. Use it to list posts,
    cancel or reschedule scheduled ones, publish a post right away, or
    view statistics.

COMMANDS:
    list        List posts (scheduled by default)
    cancel      Cancel a scheduled post
    now         Publish a post immediately
    reschedule  Move a scheduled post to a different time
    stats       Show post counts by status and platform

USAGE EXAMPLES:
    # List scheduled posts
    cmscast-queue list

    # Failed LinkedIn posts as JSON
    cmscast-queue list --status failed --platform linkedin --format json

    # Every post generated for one content item
    cmscast-queue list --status all --content 42

    # Cancel a post
    cmscast-queue cancel <POST_ID>

    # Reschedule a post
    cmscast-queue reschedule <POST_ID> \"tomorrow 3pm\"
    cmscast-queue reschedule <POST_ID> 2h

    # Publish now
    cmscast-queue now <POST_ID>

CONFIGURATION:
    Configuration file: ~/.config/cmscast/config.toml
    Database location: ~/.local/share/cmscast/cmscast.db

    Override with environment variables:
        CMSCAST_CONFIG    - Path to config file
        CMSCAST_DB_PATH   - Path to database file

EXIT CODES:
    0 - Success
    1 - Operation failed or was rejected
    2 - Platform authentication failure
    3 - Invalid input (unknown post ID, bad time format, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    #[arg(help = "Enable verbose logging to stderr (useful for debugging)")]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, global = true, default_value = "text", env = "CMSCAST_LOG_FORMAT")]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List posts
    List {
        /// Status filter: scheduled, published, failed, cancelled or all
        #[arg(short, long, default_value = "scheduled")]
        status: String,

        /// Filter by platform
        #[arg(short, long)]
        platform: Option<String>,

        /// Filter by content item id
        #[arg(short, long)]
        content: Option<String>,

        /// Maximum number of posts to show
        #[arg(short, long, default_value_t = 100)]
        limit: u32,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        #[arg(value_parser = ["text", "json"])]
        format: String,
    },

    /// Cancel a scheduled post
    Cancel {
        /// Post ID to cancel
        post_id: String,
    },

    /// Publish a post immediately
    Now {
        /// Post ID to publish
        post_id: String,
    },

    /// Reschedule a post
    Reschedule {
        /// Post ID to reschedule
        post_id: String,

        /// New schedule time (e.g., "tomorrow 3pm", "2h", "2025-06-01T10:00:00Z")
        time: String,
    },

    /// Show queue statistics
    Stats {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        #[arg(value_parser = ["text", "json"])]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::new(cli.log_format, "error".to_string(), cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<CmscastError>()
        .map(CmscastError::exit_code)
        .unwrap_or(1)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    let service = SocialService::from_config(config).await?;

    match cli.command {
        Commands::List {
            status,
            platform,
            content,
            limit,
            format,
        } => {
            let filter = build_filter(&status, platform.as_deref(), content, limit)?;
            cmd_list(&service, &filter, &format).await?;
        }
        Commands::Cancel { post_id } => cmd_cancel(&service, &post_id).await?,
        Commands::Now { post_id } => cmd_now(&service, &post_id).await?,
        Commands::Reschedule { post_id, time } => cmd_reschedule(&service, &post_id, &time).await?,
        Commands::Stats { format } => cmd_stats(&service, &format).await?,
    }

    Ok(())
}

fn build_filter(
    status: &str,
    platform: Option<&str>,
    content_id: Option<String>,
    limit: u32,
) -> libcmscast::Result<PostFilter> {
    let status = match status {
        "all" => None,
        other => Some(other.parse::<PostStatus>()?),
    };
    let platform = platform.map(str::parse::<SocialPlatform>).transpose()?;

    Ok(PostFilter {
        status,
        platform,
        content_id,
        limit,
    })
}

/// List posts
async fn cmd_list(service: &SocialService, filter: &PostFilter, format: &str) -> anyhow::Result<()> {
    let posts = service.list_posts(filter).await?;

    if format == "json" {
        let json: Vec<serde_json::Value> = posts.iter().map(post_json).collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        output_list_text(&posts, Utc::now());
    }

    Ok(())
}

fn post_json(post: &SocialPost) -> serde_json::Value {
    json!({
        "id": post.id,
        "content_id": post.content_id,
        "platform": post.platform,
        "account_id": post.account_id,
        "status": post.status,
        "scheduled_time": post.scheduled_time,
        "published_time": post.published_time,
        "platform_post_id": post.platform_post_id,
        "retry_count": post.retry_count,
        "max_retries": post.max_retries,
        "error_message": post.error_message,
        "text": post.post_data.get("text"),
    })
}

/// One line per post: id, platform, status, timing, preview
fn output_list_text(posts: &[SocialPost], now: DateTime<Utc>) {
    for post in posts {
        let preview = post
            .post_data
            .get("text")
            .and_then(|t| t.as_str())
            .map(|t| truncate_content(t, 50))
            .unwrap_or_default();

        let timing = match post.status {
            PostStatus::Scheduled => format_time_until(now, post.scheduled_time),
            PostStatus::Published => post
                .published_time
                .map(|t| format!("published {}", t.format("%Y-%m-%d %H:%M")))
                .unwrap_or_else(|| "published".to_string()),
            other => other.to_string(),
        };

        println!(
            "{} | {} | {} | {} | {}",
            post.id, post.platform, timing, post.retry_count, preview
        );
    }
}

/// Truncate to `max_chars` characters with ellipsis, first line only
fn truncate_content(content: &str, max_chars: usize) -> String {
    let first_line = content.lines().next().unwrap_or("");
    if first_line.chars().count() <= max_chars {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Format time until scheduled time in human-readable format
fn format_time_until(now: DateTime<Utc>, scheduled: DateTime<Utc>) -> String {
    let diff = (scheduled - now).num_seconds();

    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}

/// Cancel a scheduled post
async fn cmd_cancel(service: &SocialService, post_id: &str) -> anyhow::Result<()> {
    let result = service.cancel_post(post_id).await?;

    if !result.success {
        let error = result.error.unwrap_or_else(|| "Cancellation rejected".to_string());
        warn!(post_id, error = %error, "Cancellation rejected");
        anyhow::bail!("{}", error);
    }

    info!(post_id, "Post cancelled");
    println!("Cancelled {}", post_id);
    Ok(())
}

/// Publish immediately, bypassing the scheduled time
async fn cmd_now(service: &SocialService, post_id: &str) -> anyhow::Result<()> {
    let result = service.publish_post_now(post_id).await?;

    match (result.success, result.platform_post_id) {
        (true, Some(platform_post_id)) => {
            info!(post_id, platform_post_id = %platform_post_id, "Post published manually");
            println!("Published {} as {}", post_id, platform_post_id);
            Ok(())
        }
        _ => {
            let error = result.error.unwrap_or_else(|| "Publish failed".to_string());
            warn!(post_id, error = %error, "Manual publish failed");
            anyhow::bail!("{}", error)
        }
    }
}

/// Move a scheduled post to a new time
async fn cmd_reschedule(service: &SocialService, post_id: &str, time: &str) -> anyhow::Result<()> {
    let at = parse_schedule(time, Utc::now())?;
    let post = service.reschedule_post(post_id, at).await?;
    info!(post_id, scheduled_time = %post.scheduled_time, "Post rescheduled");

    println!("Rescheduled {} to {}", post.id, post.scheduled_time.to_rfc3339());
    Ok(())
}

/// Show queue statistics
async fn cmd_stats(service: &SocialService, format: &str) -> anyhow::Result<()> {
    let stats = service.get_stats().await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        output_stats_text(&stats);
    }

    Ok(())
}

fn output_stats_text(stats: &PostStats) {
    println!("Total posts: {}", stats.total_posts);
    println!("  Scheduled: {}", stats.scheduled_posts);
    println!("  Published: {}", stats.published_posts);
    println!("  Failed:    {}", stats.failed_posts);
    println!("  Cancelled: {}", stats.cancelled_posts);

    if !stats.platforms.is_empty() {
        println!("By platform:");
        for (platform, count) in &stats.platforms {
            println!("  {}: {}", platform, count);
        }
    }
}
