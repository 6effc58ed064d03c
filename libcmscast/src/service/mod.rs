//! Service layer for Cmscast
//!
//! `SocialService` is the single entry point the binaries use. It wires two
//! sub-services over shared, injected dependencies:
//!
//! - `PublishingService`: the creation path, turning published content
//!   into scheduled posts
//! - `DispatchService`: the dispatch path and manual controls (publish now,
//!   cancel, reschedule, stats)
//! - `EventBus`: progress events for both
//!
//! # Example
//!
//! ```no_run
//! use libcmscast::service::publishing::PublishOptions;
//! use libcmscast::service::SocialService;
//! use libcmscast::types::ContentItem;
//! use libcmscast::Config;
//!
//! # async fn example(content: ContentItem) -> libcmscast::Result<()> {
//! let service = SocialService::from_config(Config::load()?).await?;
//!
//! let results = service
//!     .handle_content_published(&content, &PublishOptions::default())
//!     .await?;
//! println!("Scheduled {} posts", results.iter().filter(|r| r.success).count());
//!
//! let summary = service.process_pending_posts().await?;
//! println!("Published {}", summary.successful_posts);
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod events;
pub mod publishing;

use chrono::{DateTime, Utc};
use std::sync::Arc;

use self::dispatch::{CancelResult, DispatchPolicy, DispatchService, DispatchSummary, ManualPublishResult};
use self::events::{EventBus, EventReceiver};
use self::publishing::{PublishOptions, PublishResult, PublishingService};
use crate::branding::BrandingProfile;
use crate::platforms::{create_clients, PlatformRegistry};
use crate::store::{AccountStore, PostStore};
use crate::types::{ContentItem, PostFilter, PostStats, SocialPost};
use crate::{Config, Database, Result};

/// Facade over the publishing and dispatch services
///
/// Both sub-services share the same stores and event bus. Cloning the
/// facade is cheap and clones share the dispatch re-entrancy flag.
#[derive(Clone)]
pub struct SocialService {
    publishing: PublishingService,
    dispatch: DispatchService,
    event_bus: EventBus,
}

impl SocialService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        accounts: Arc<dyn AccountStore>,
        registry: PlatformRegistry,
        branding: BrandingProfile,
        policy: DispatchPolicy,
    ) -> Self {
        let event_bus = EventBus::default();

        let publishing = PublishingService::new(
            Arc::clone(&posts),
            Arc::clone(&accounts),
            Arc::new(branding),
            registry.platforms(),
            policy.max_retries,
            event_bus.clone(),
        );
        let dispatch = DispatchService::new(posts, accounts, registry, policy, event_bus.clone());

        Self {
            publishing,
            dispatch,
            event_bus,
        }
    }

    /// Build the service from configuration: open the database, create
    /// platform clients and read the branding and retry settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated, or if
    /// a duration in the configuration is invalid.
    pub async fn from_config(config: Config) -> Result<Self> {
        let db = Arc::new(Database::new(&config.database.path).await?);
        let registry = create_clients(&config)?;
        let policy = DispatchPolicy::from_config(&config.scheduling)?;

        let mut service = Self::new(db.clone(), db, registry, config.branding_profile(), policy);
        if let Some(linkedin) = &config.linkedin {
            service.set_linkedin_visibility(&linkedin.default_visibility);
        }

        Ok(service)
    }

    pub fn set_linkedin_visibility(&mut self, visibility: &str) {
        self.publishing.set_linkedin_visibility(visibility);
    }

    pub fn publishing(&self) -> &PublishingService {
        &self.publishing
    }

    pub fn dispatch(&self) -> &DispatchService {
        &self.dispatch
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    pub async fn handle_content_published(
        &self,
        content: &ContentItem,
        options: &PublishOptions,
    ) -> Result<Vec<PublishResult>> {
        self.publishing.handle_content_published(content, options).await
    }

    pub async fn process_pending_posts(&self) -> Result<DispatchSummary> {
        self.dispatch.process_pending_posts().await
    }

    pub async fn publish_post_now(&self, post_id: &str) -> Result<ManualPublishResult> {
        self.dispatch.publish_post_now(post_id).await
    }

    pub async fn cancel_post(&self, post_id: &str) -> Result<CancelResult> {
        self.dispatch.cancel_post(post_id).await
    }

    pub async fn reschedule_post(&self, post_id: &str, at: DateTime<Utc>) -> Result<SocialPost> {
        self.dispatch.reschedule_post(post_id, at).await
    }

    pub async fn get_stats(&self) -> Result<PostStats> {
        self.dispatch.get_stats().await
    }

    pub async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<SocialPost>> {
        self.dispatch.list_posts(filter).await
    }
}
