//! cmscast-publish - Schedule social posts for published content
//!
//! Reads one CMS content item as JSON and creates a scheduled post for
//! every active account on the target platforms.

use anyhow::Context;
use clap::Parser;
use libcmscast::logging::{LogFormat, LoggingConfig};
use libcmscast::scheduling::ScheduleOption;
use libcmscast::service::publishing::{PublishOptions, PublishResult};
use libcmscast::{CmscastError, Config, ContentItem, SocialPlatform, SocialService};
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cmscast-publish")]
#[command(version)]
#[command(about = "Schedule social posts for a published content item")]
#[command(long_about = "\
cmscast-publish - Schedule social posts for a published content item

DESCRIPTION:
    cmscast-publish takes a CMS content item (JSON) and schedules one post
    per active account on each target platform. The post text, link and
    hashtags are generated from the item and the configured branding.

    Posts are only queued here. cmscast-send publishes them when they are due.

INPUT:
    A JSON object with id, title, status, slug and a content map:

    {\"id\": \"42\", \"title\": \"CFO Appointment\", \"slug\": \"cfo-appointment\",
     \"status\": \"published\", \"content\": {\"body\": \"<p>...</p>\"}}

    Only items whose status is \"published\" are accepted.

USAGE EXAMPLES:
    # From a file, default schedule (next business-day noon)
    cmscast-publish item.json

    # From a CMS webhook, publish as soon as the daemon runs
    curl -s $CMS/items/42 | cmscast-publish --schedule immediate

    # Custom time and message, LinkedIn and Facebook
    cmscast-publish item.json --at 2025-06-01T10:00:00Z \\
        --message \"Meet our new CFO\" --platform linkedin,facebook

SCHEDULE OPTIONS:
    immediate, tomorrow_9am, tomorrow_5pm, optimal, custom (requires --at)

EXIT CODES:
    0 - All posts scheduled
    1 - One or more accounts could not be scheduled
    3 - Invalid input (unpublished content, bad JSON, bad schedule)
")]
struct Cli {
    /// Content item JSON file (reads from stdin if not provided)
    file: Option<PathBuf>,

    /// When to publish
    #[arg(short, long, default_value = "optimal")]
    #[arg(value_parser = ["immediate", "custom", "tomorrow_9am", "tomorrow_5pm", "optimal"])]
    schedule: String,

    /// Date-time for the custom schedule (implies --schedule custom)
    #[arg(long, value_name = "DATETIME")]
    at: Option<String>,

    /// Replace the content body with this message
    #[arg(short, long)]
    message: Option<String>,

    /// Target specific platform(s) (comma-separated, default from config)
    #[arg(short, long, value_delimiter = ',')]
    platform: Vec<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, default_value = "text", env = "CMSCAST_LOG_FORMAT")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::new(cli.log_format, "warn".to_string(), cli.verbose).init();

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

    let content = read_content(cli.file.as_ref())?;
    let options = publish_options(&cli, &config)?;

    let service = SocialService::from_config(config).await?;
    let results = service.handle_content_published(&content, &options).await?;

    if results.is_empty() {
        warn!(content_id = %content.id, "No active accounts on the target platforms");
    }

    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_text(&results);
    }

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        anyhow::bail!("{} of {} accounts could not be scheduled", failed, results.len());
    }

    info!(content_id = %content.id, posts = results.len(), "Content scheduled");
    Ok(())
}

/// Read the content item from `file` or stdin
fn read_content(file: Option<&PathBuf>) -> anyhow::Result<ContentItem> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read content from stdin")?;
            buffer
        }
    };

    if raw.trim().is_empty() {
        return Err(CmscastError::InvalidInput("No content item provided".to_string()).into());
    }

    serde_json::from_str(&raw).map_err(|e| {
        CmscastError::InvalidInput(format!("Content item is not valid JSON: {}", e)).into()
    })
}

fn publish_options(cli: &Cli, config: &Config) -> anyhow::Result<PublishOptions> {
    let schedule = if cli.at.is_some() {
        ScheduleOption::Custom
    } else {
        ScheduleOption::from(cli.schedule.as_str())
    };

    let names = if cli.platform.is_empty() {
        &config.defaults.platforms
    } else {
        &cli.platform
    };
    let platforms = names
        .iter()
        .map(|name| name.parse::<SocialPlatform>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PublishOptions {
        schedule,
        custom_datetime: cli.at.clone(),
        custom_message: cli.message.clone(),
        platforms: Some(platforms),
    })
}

fn print_text(results: &[PublishResult]) {
    for result in results {
        match (&result.post_id, &result.scheduled_time) {
            (Some(post_id), Some(at)) if result.success => println!(
                "{}:{}:{} scheduled for {}",
                result.platform,
                result.account_name,
                post_id,
                at.to_rfc3339()
            ),
            _ => println!(
                "{}:{}: failed: {}",
                result.platform,
                result.account_name,
                result.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}
