//! cmscast-accounts - Manage social accounts
//!
//! Adds, connects, lists and deactivates the accounts Cmscast publishes
//! through. Tokens are written to the database and never printed.

use clap::{Parser, Subcommand};
use libcmscast::logging::{LogFormat, LoggingConfig};
use libcmscast::platforms::create_clients;
use libcmscast::store::AccountStore;
use libcmscast::{CmscastError, Config, Database, SocialAccount, SocialPlatform};
use serde_json::{json, Map, Value};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cmscast-accounts")]
#[command(version)]
#[command(about = "Manage social accounts and credentials")]
#[command(long_about = "\
cmscast-accounts - Manage social accounts and credentials

DESCRIPTION:
    cmscast-accounts maintains the accounts that scheduled posts are
    published through. Each active account on a platform receives its own
    post whenever content is published.

COMMANDS:
    add         Register an account with an existing access token
    connect     Exchange an OAuth authorization code for a token
    list        List accounts (tokens are never shown)
    deactivate  Stop publishing through an account

USAGE EXAMPLES:
    # LinkedIn company page with a token obtained elsewhere
    cmscast-accounts add linkedin \"Haidrun\" --token $TOKEN --org-id 998877

    # Facebook page with its own page token
    cmscast-accounts add facebook \"Haidrun\" --token $USER_TOKEN \\
        --page-id 1122 --page-token $PAGE_TOKEN

    # Finish an OAuth flow started by the CMS
    cmscast-accounts connect linkedin --name \"Haidrun\" \\
        --code $CODE --redirect-uri https://cms.example.com/oauth/callback

    # Refresh the token of an existing account
    cmscast-accounts connect linkedin --account <ACCOUNT_ID> --code $CODE \\
        --redirect-uri https://cms.example.com/oauth/callback

    cmscast-accounts list --format json
    cmscast-accounts deactivate <ACCOUNT_ID>

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - The platform rejected the authorization code or credentials
    3 - Invalid input (unknown platform or account)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, global = true, default_value = "text", env = "CMSCAST_LOG_FORMAT")]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register an account with an access token
    Add {
        /// Platform: linkedin, facebook, twitter or instagram
        platform: String,

        /// Display name for the account
        name: String,

        /// Access token
        #[arg(long, env = "CMSCAST_ACCESS_TOKEN", hide_env_values = true)]
        token: String,

        /// Refresh token, if the platform issued one
        #[arg(long)]
        refresh_token: Option<String>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Exchange an OAuth authorization code and store the token
    Connect {
        /// Platform: linkedin, facebook, twitter or instagram
        platform: String,

        /// Authorization code returned to the redirect URI
        #[arg(long)]
        code: String,

        /// Redirect URI used when the code was requested
        #[arg(long)]
        redirect_uri: String,

        /// Existing account to update instead of creating a new one
        #[arg(long, conflicts_with = "name")]
        account: Option<String>,

        /// Display name for a new account
        #[arg(long, required_unless_present = "account")]
        name: Option<String>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// List accounts
    List {
        /// Filter by platform
        #[arg(short, long)]
        platform: Option<String>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        #[arg(value_parser = ["text", "json"])]
        format: String,
    },

    /// Deactivate an account
    Deactivate {
        /// Account ID
        account_id: String,
    },
}

/// Where posts go on the platform, stored as account metadata
#[derive(clap::Args, Debug, Default)]
struct TargetArgs {
    /// LinkedIn organization or Facebook business id
    #[arg(long)]
    org_id: Option<String>,

    /// Facebook page id
    #[arg(long)]
    page_id: Option<String>,

    /// Facebook page access token
    #[arg(long)]
    page_token: Option<String>,
}

impl TargetArgs {
    fn into_account_data(self) -> Map<String, Value> {
        let mut data = Map::new();
        if let Some(id) = self.org_id {
            data.insert("organization_id".to_string(), Value::String(id));
        }
        if let Some(id) = self.page_id {
            data.insert("page_id".to_string(), Value::String(id));
        }
        if let Some(token) = self.page_token {
            data.insert("page_access_token".to_string(), Value::String(token));
        }
        data
    }
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
    let db = Database::new(&config.database.path).await?;

    match cli.command {
        Commands::Add {
            platform,
            name,
            token,
            refresh_token,
            target,
        } => {
            let mut account = SocialAccount::new(platform.parse()?, &name, &token);
            account.refresh_token = refresh_token;
            account.account_data = target.into_account_data();

            db.insert_account(&account).await?;
            info!(account_id = %account.id, platform = %account.platform, "Account added");
            println!("{}", account.id);
        }
        Commands::Connect {
            platform,
            code,
            redirect_uri,
            account,
            name,
            target,
        } => {
            let platform: SocialPlatform = platform.parse()?;
            let id = cmd_connect(&config, &db, platform, &code, &redirect_uri, account, name, target)
                .await?;
            println!("{}", id);
        }
        Commands::List { platform, format } => {
            let platform = platform.map(|p| p.parse::<SocialPlatform>()).transpose()?;
            let accounts = db.list_accounts(platform).await?;
            if format == "json" {
                let json: Vec<Value> = accounts.iter().map(account_json).collect();
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                for account in &accounts {
                    println!(
                        "{} | {} | {} | {}",
                        account.id,
                        account.platform,
                        account.account_name,
                        if account.is_active { "active" } else { "inactive" }
                    );
                }
            }
        }
        Commands::Deactivate { account_id } => {
            if !db.deactivate_account(&account_id).await? {
                return Err(CmscastError::NotFound(format!("Account {}", account_id)).into());
            }
            println!("Deactivated {}", account_id);
        }
    }

    Ok(())
}

/// Exchange `code` with the platform and store the granted token.
///
/// Returns the id of the created or updated account.
#[allow(clippy::too_many_arguments)]
async fn cmd_connect(
    config: &Config,
    db: &Database,
    platform: SocialPlatform,
    code: &str,
    redirect_uri: &str,
    account_id: Option<String>,
    name: Option<String>,
    target: TargetArgs,
) -> anyhow::Result<String> {
    let registry = create_clients(config)?;
    let client = registry.get(platform).ok_or_else(|| {
        CmscastError::InvalidInput(format!("Platform {} is not enabled in the configuration", platform))
    })?;

    let grant = client
        .exchange_code_for_token(code, redirect_uri)
        .await
        .map_err(CmscastError::from)?;

    if let Some(expires_in) = grant.expires_in {
        info!(platform = %platform, expires_in, "Access token granted");
    }

    match account_id {
        Some(id) => {
            let existing = db
                .get_account(&id)
                .await?
                .ok_or_else(|| CmscastError::NotFound(format!("Account {}", id)))?;
            if existing.platform != platform {
                return Err(CmscastError::InvalidInput(format!(
                    "Account {} belongs to {}, not {}",
                    id, existing.platform, platform
                ))
                .into());
            }

            db.update_account_token(&id, &grant.access_token, grant.refresh_token.as_deref())
                .await?;
            Ok(id)
        }
        None => {
            let name = name.ok_or_else(|| {
                CmscastError::InvalidInput("--name is required for a new account".to_string())
            })?;
            let mut account = SocialAccount::new(platform, &name, &grant.access_token);
            account.refresh_token = grant.refresh_token;
            account.account_data = target.into_account_data();

            db.insert_account(&account).await?;
            Ok(account.id)
        }
    }
}

/// Account fields safe to print
fn account_json(account: &SocialAccount) -> Value {
    let mut data = account.account_data.clone();
    data.remove("page_access_token");

    json!({
        "id": account.id,
        "platform": account.platform,
        "account_name": account.account_name,
        "is_active": account.is_active,
        "account_data": data,
    })
}
