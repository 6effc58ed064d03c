//! Platform abstraction and implementations
//!
//! Each social network gets one [`PlatformClient`] implementation. The
//! orchestrator looks clients up in a [`PlatformRegistry`] keyed by
//! [`SocialPlatform`], so adding a network means registering a client,
//! not touching dispatch code.
//!
//! # Examples
//!
//! ```no_run
//! use libcmscast::config::Config;
//! use libcmscast::platforms::create_clients;
//! use libcmscast::types::SocialPlatform;
//!
//! # fn example() -> libcmscast::Result<()> {
//! let config = Config::load()?;
//! let registry = create_clients(&config)?;
//!
//! if let Some(client) = registry.get(SocialPlatform::LinkedIn) {
//!     println!("{} allows {} characters", client.name(), client.character_limit());
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::{PlatformError, Result};
use crate::types::{PlatformPostPayload, SocialAccount, SocialPlatform};

pub mod facebook;
mod http;
pub mod linkedin;
pub mod stubs;

// Mock client is available for all builds (not just tests) to support integration tests
pub mod mock;

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Access token obtained from an OAuth authorization code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Outcome of checking a payload against platform rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn ok() -> Self {
        Self::from_errors(Vec::new())
    }

    /// Collapse into a `Validation` error listing every violated rule
    pub fn into_result(self) -> PlatformResult<()> {
        if self.valid {
            Ok(())
        } else {
            Err(PlatformError::Validation(self.errors.join("; ")))
        }
    }
}

/// Client for one social network's publishing API
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> SocialPlatform;

    /// Lowercase identifier (e.g., "linkedin")
    fn name(&self) -> &'static str {
        self.platform().as_str()
    }

    /// Maximum post text length the platform accepts
    fn character_limit(&self) -> usize;

    /// Exchange an OAuth authorization code for an access token
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` when the platform rejects the
    /// code or the client credentials are not configured.
    async fn exchange_code_for_token(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> PlatformResult<TokenGrant>;

    /// Publish `payload` on behalf of `account`
    ///
    /// Metadata on the account (organization or page ids) decides whether
    /// the post is made as that organization or as the account's user.
    ///
    /// # Returns
    ///
    /// The platform's identifier for the created post.
    ///
    /// # Errors
    ///
    /// Transport failures come back as `Network` or `Timeout`; platform
    /// error bodies are normalized into the other [`PlatformError`] variants.
    async fn publish(
        &self,
        account: &SocialAccount,
        payload: &PlatformPostPayload,
    ) -> PlatformResult<String>;

    /// Check a payload against platform rules without any network access
    fn validate(&self, payload: &PlatformPostPayload) -> ValidationReport;
}

/// Registry of platform clients keyed by platform
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    clients: HashMap<SocialPlatform, Arc<dyn PlatformClient>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client, replacing any previous client for its platform
    pub fn register(&mut self, client: Arc<dyn PlatformClient>) {
        self.clients.insert(client.platform(), client);
    }

    pub fn with(mut self, client: Arc<dyn PlatformClient>) -> Self {
        self.register(client);
        self
    }

    pub fn get(&self, platform: SocialPlatform) -> Option<Arc<dyn PlatformClient>> {
        self.clients.get(&platform).cloned()
    }

    /// Registered platforms in a stable order
    pub fn platforms(&self) -> Vec<SocialPlatform> {
        let mut platforms: Vec<SocialPlatform> = self.clients.keys().copied().collect();
        platforms.sort();
        platforms
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl std::fmt::Debug for PlatformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformRegistry")
            .field("platforms", &self.platforms())
            .finish()
    }
}

/// Build clients for every platform enabled in the configuration
///
/// # Errors
///
/// Returns an error if a client cannot be constructed (for example an
/// unparseable request timeout).
pub fn create_clients(config: &Config) -> Result<PlatformRegistry> {
    let mut registry = PlatformRegistry::new();

    if let Some(linkedin) = config.linkedin.as_ref().filter(|c| c.enabled) {
        info!("Creating LinkedIn client");
        registry.register(Arc::new(linkedin::LinkedInClient::new(linkedin)?));
    }

    if let Some(facebook) = config.facebook.as_ref().filter(|c| c.enabled) {
        info!("Creating Facebook client");
        registry.register(Arc::new(facebook::FacebookClient::new(facebook)?));
    }

    if config.twitter.as_ref().is_some_and(|c| c.enabled) {
        info!("Creating Twitter client (publishing not implemented)");
        registry.register(Arc::new(stubs::TwitterClient));
    }

    if config.instagram.as_ref().is_some_and(|c| c.enabled) {
        info!("Creating Instagram client (publishing not implemented)");
        registry.register(Arc::new(stubs::InstagramClient));
    }

    Ok(registry)
}

/// Shared check for an optional link: absolute http(s) URL with a host
pub(crate) fn validate_url(url: Option<&str>, errors: &mut Vec<String>) {
    let Some(raw) = url else {
        return;
    };

    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some() => {}
        _ => errors.push(format!("URL '{}' is not a valid absolute http(s) URL", raw)),
    }
}

/// Shared check for required text within a character limit
pub(crate) fn validate_text(text: &str, limit: usize, errors: &mut Vec<String>) {
    if text.trim().is_empty() {
        errors.push("Text is required".to_string());
        return;
    }

    let count = text.chars().count();
    if count > limit {
        errors.push(format!(
            "Text is {} characters, exceeding the {} character limit",
            count, limit
        ));
    }
}
