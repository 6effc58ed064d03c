//! Configuration management for Cmscast

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::branding::BrandingProfile;
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    pub linkedin: Option<LinkedInConfig>,
    pub facebook: Option<FacebookConfig>,
    pub twitter: Option<StubPlatformConfig>,
    pub instagram: Option<StubPlatformConfig>,
    pub branding: Option<BrandingProfile>,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/cmscast/cmscast.db".to_string(),
        }
    }
}

/// Dispatch cadence and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// How often the daemon looks for due posts (humantime, e.g. "5m")
    pub poll_interval: String,
    /// Fixed delay before a failed post is attempted again
    pub retry_delay: String,
    /// Retry budget given to newly created posts
    pub max_retries: u32,
    /// Only reschedule failures classified as transient
    pub retry_transient_only: bool,
    /// Upper bound on due posts handled per dispatch run
    pub batch_size: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: "5m".to_string(),
            retry_delay: "5m".to_string(),
            max_retries: 3,
            retry_transient_only: false,
            batch_size: 50,
        }
    }
}

impl SchedulingConfig {
    pub fn poll_interval(&self) -> Result<Duration> {
        parse_duration_field("scheduling.poll_interval", &self.poll_interval)
    }

    pub fn retry_delay(&self) -> Result<Duration> {
        parse_duration_field("scheduling.retry_delay", &self.retry_delay)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkedInConfig {
    pub enabled: bool,
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub oauth_base: String,
    pub request_timeout: String,
    pub default_visibility: String,
}

impl Default for LinkedInConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client_id: String::new(),
            client_secret: String::new(),
            api_base: "https://api.linkedin.com".to_string(),
            oauth_base: "https://www.linkedin.com/oauth/v2".to_string(),
            request_timeout: "30s".to_string(),
            default_visibility: "PUBLIC".to_string(),
        }
    }
}

impl LinkedInConfig {
    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration_field("linkedin.request_timeout", &self.request_timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FacebookConfig {
    pub enabled: bool,
    pub app_id: String,
    pub app_secret: String,
    pub graph_base: String,
    pub request_timeout: String,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_id: String::new(),
            app_secret: String::new(),
            graph_base: "https://graph.facebook.com/v18.0".to_string(),
            request_timeout: "30s".to_string(),
        }
    }
}

impl FacebookConfig {
    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration_field("facebook.request_timeout", &self.request_timeout)
    }
}

/// Platforms without a publishing backend only carry an enable switch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StubPlatformConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    pub platforms: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            platforms: vec!["linkedin".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// `CMSCAST_DB_PATH` overrides `database.path` when set.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = Self::load_from_path(&config_path)?;

        if let Ok(db_path) = std::env::var("CMSCAST_DB_PATH") {
            config.database.path = db_path;
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            linkedin: Some(LinkedInConfig::default()),
            facebook: Some(FacebookConfig::default()),
            branding: Some(BrandingProfile::haidrun()),
            ..Default::default()
        }
    }

    /// Branding profile used by the transformer
    pub fn branding_profile(&self) -> BrandingProfile {
        self.branding.clone().unwrap_or_else(BrandingProfile::haidrun)
    }

    fn validate(&self) -> Result<()> {
        self.scheduling.poll_interval()?;
        self.scheduling.retry_delay()?;
        if let Some(linkedin) = &self.linkedin {
            linkedin.request_timeout()?;
            if !crate::platforms::linkedin::VISIBILITIES.contains(&linkedin.default_visibility.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "linkedin.default_visibility".to_string(),
                    reason: format!(
                        "'{}' is not one of {}",
                        linkedin.default_visibility,
                        crate::platforms::linkedin::VISIBILITIES.join(", ")
                    ),
                }
                .into());
            }
        }
        if let Some(facebook) = &self.facebook {
            facebook.request_timeout()?;
        }
        if let Some(branding) = &self.branding {
            if branding.default_hashtags.is_empty() {
                return Err(ConfigError::MissingField("branding.default_hashtags".to_string()).into());
            }
        }
        Ok(())
    }
}

fn parse_duration_field(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).map_err(|e| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' is not a duration ({})", value, e),
        }
        .into()
    })
}

/// Resolve the configuration file path under the XDG config directory
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CMSCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("cmscast").join("config.toml"))
}
