//! Creation path: turn a published content item into scheduled posts
//!
//! Each active account on each target platform gets one [`SocialPost`]
//! plus its [`ContentSocialMapping`]. Accounts are handled independently;
//! a failure for one is reported in its [`PublishResult`] and the rest
//! carry on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::branding::BrandingProfile;
use crate::error::{CmscastError, Result};
use crate::scheduling::{compute_scheduled_time, ScheduleOption};
use crate::service::events::{Event, EventBus};
use crate::store::{AccountStore, PostStore};
use crate::transform::{transform_with_message, DEFAULT_VISIBILITY};
use crate::types::{
    ContentItem, ContentSocialMapping, PlatformPostPayload, SocialAccount, SocialPlatform,
    SocialPost,
};

/// How a content item should be fanned out
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub schedule: ScheduleOption,
    /// Required when `schedule` is [`ScheduleOption::Custom`]
    pub custom_datetime: Option<String>,
    /// Replaces the content body in the generated text
    pub custom_message: Option<String>,
    /// Target platforms; `None` means every registered platform
    pub platforms: Option<Vec<SocialPlatform>>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            schedule: ScheduleOption::Optimal,
            custom_datetime: None,
            custom_message: None,
            platforms: None,
        }
    }
}

/// Outcome for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResult {
    pub platform: SocialPlatform,
    pub account_id: String,
    pub account_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublishResult {
    fn scheduled(account: &SocialAccount, post: &SocialPost) -> Self {
        Self {
            platform: account.platform,
            account_id: account.id.clone(),
            account_name: account.account_name.clone(),
            success: true,
            post_id: Some(post.id.clone()),
            scheduled_time: Some(post.scheduled_time),
            error: None,
        }
    }

    fn failed(account: &SocialAccount, error: String) -> Self {
        Self {
            platform: account.platform,
            account_id: account.id.clone(),
            account_name: account.account_name.clone(),
            success: false,
            post_id: None,
            scheduled_time: None,
            error: Some(error),
        }
    }
}

#[derive(Clone)]
pub struct PublishingService {
    posts: Arc<dyn PostStore>,
    accounts: Arc<dyn AccountStore>,
    branding: Arc<BrandingProfile>,
    default_platforms: Vec<SocialPlatform>,
    max_retries: u32,
    linkedin_visibility: String,
    event_bus: EventBus,
}

impl PublishingService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        accounts: Arc<dyn AccountStore>,
        branding: Arc<BrandingProfile>,
        default_platforms: Vec<SocialPlatform>,
        max_retries: u32,
        event_bus: EventBus,
    ) -> Self {
        Self {
            posts,
            accounts,
            branding,
            default_platforms,
            max_retries,
            linkedin_visibility: DEFAULT_VISIBILITY.to_string(),
            event_bus,
        }
    }

    /// Visibility used for LinkedIn posts, as configured in
    /// `linkedin.default_visibility`
    pub fn set_linkedin_visibility(&mut self, visibility: impl Into<String>) {
        self.linkedin_visibility = visibility.into();
    }

    /// Schedule posts for every active account on the target platforms.
    ///
    /// # Errors
    ///
    /// Only systemic problems are returned as errors: the content is not
    /// published, the schedule cannot be computed, or an account query
    /// fails. Account queries all run before the first insert, so an error
    /// means nothing was written. Per-account failures are reported in the
    /// result list.
    pub async fn handle_content_published(
        &self,
        content: &ContentItem,
        options: &PublishOptions,
    ) -> Result<Vec<PublishResult>> {
        if !content.is_published() {
            return Err(CmscastError::InvalidInput(format!(
                "Content '{}' has status '{}', only published content is shared",
                content.id, content.status
            )));
        }

        let scheduled_time = compute_scheduled_time(
            options.schedule,
            options.custom_datetime.as_deref(),
            Utc::now(),
        )?;

        let platforms = options
            .platforms
            .clone()
            .unwrap_or_else(|| self.default_platforms.clone());

        info!(
            content_id = %content.id,
            schedule = %options.schedule,
            scheduled_time = %scheduled_time,
            platforms = ?platforms,
            "Scheduling social posts for published content"
        );

        // Accounts for every platform are loaded before anything is written,
        // so a failing query leaves no posts behind.
        let mut targets = Vec::with_capacity(platforms.len());
        for platform in platforms {
            let accounts = self.accounts.active_accounts(platform).await?;
            if accounts.is_empty() {
                debug!(platform = %platform, "No active accounts, skipping platform");
                continue;
            }
            targets.push((platform, accounts));
        }

        let mut results = Vec::new();
        for (platform, accounts) in targets {
            let mut payload = transform_with_message(
                content,
                platform,
                &self.branding,
                options.custom_message.as_deref(),
            );
            if platform == SocialPlatform::LinkedIn {
                payload.visibility = self.linkedin_visibility.clone();
            }

            for account in &accounts {
                let result = match self
                    .schedule_for_account(content, account, &payload, scheduled_time, options)
                    .await
                {
                    Ok(post) => PublishResult::scheduled(account, &post),
                    Err(e) => {
                        warn!(
                            content_id = %content.id,
                            account_id = %account.id,
                            platform = %platform,
                            error = %e,
                            "Could not schedule post for account"
                        );
                        PublishResult::failed(account, e.to_string())
                    }
                };
                results.push(result);
            }
        }

        Ok(results)
    }

    /// Insert the post and mapping as a pair, deleting the post if the
    /// mapping cannot be written
    async fn schedule_for_account(
        &self,
        content: &ContentItem,
        account: &SocialAccount,
        payload: &PlatformPostPayload,
        scheduled_time: DateTime<Utc>,
        options: &PublishOptions,
    ) -> Result<SocialPost> {
        let post_data = serde_json::to_value(payload).map_err(|e| {
            CmscastError::InvalidInput(format!("Payload could not be encoded: {}", e))
        })?;
        let post = SocialPost::new(&content.id, account, scheduled_time, post_data, self.max_retries);

        let mut mapping = ContentSocialMapping::for_post(&post, payload.hashtags.clone());
        mapping.publish_immediately = options.schedule == ScheduleOption::Immediate;
        mapping.custom_message = options.custom_message.clone();

        self.posts.insert_post(&post).await?;

        if let Err(e) = self.posts.insert_mapping(&mapping).await {
            if let Err(cleanup) = self.posts.delete_post(&post.id).await {
                error!(
                    post_id = %post.id,
                    error = %cleanup,
                    "Compensating delete failed, post is left without a mapping"
                );
            }
            return Err(e);
        }

        self.event_bus.emit(Event::PostScheduled {
            post_id: post.id.clone(),
            content_id: post.content_id.clone(),
            platform: post.platform,
            account_id: post.account_id.clone(),
            scheduled_time: post.scheduled_time,
        });

        Ok(post)
    }
}
