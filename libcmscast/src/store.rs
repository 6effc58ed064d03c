//! Persistence seams used by the publishing service
//!
//! The service only talks to these traits. [`crate::db::Database`] is the
//! SQLite implementation; tests substitute wrappers to inject failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    ContentSocialMapping, PostFilter, PostStats, SocialAccount, SocialPlatform, SocialPost,
};

/// A state change applied to a post that is still `scheduled`
///
/// Every variant also updates the post's mapping, so a post and its
/// mapping never disagree after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum PostTransition {
    /// post → published, mapping → published
    Published {
        platform_post_id: String,
        at: DateTime<Utc>,
    },
    /// post stays scheduled with a later time, mapping keeps the error
    RetryScheduled {
        retry_count: u32,
        at: DateTime<Utc>,
        error: String,
    },
    /// post → failed, mapping → failed
    Failed { error: String },
    /// post → cancelled, mapping → skipped
    Cancelled,
    /// post stays scheduled at a new time
    Rescheduled { at: DateTime<Utc> },
}

impl PostTransition {
    pub fn name(&self) -> &'static str {
        match self {
            PostTransition::Published { .. } => "published",
            PostTransition::RetryScheduled { .. } => "retry_scheduled",
            PostTransition::Failed { .. } => "failed",
            PostTransition::Cancelled => "cancelled",
            PostTransition::Rescheduled { .. } => "rescheduled",
        }
    }
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert_post(&self, post: &SocialPost) -> Result<()>;

    async fn insert_mapping(&self, mapping: &ContentSocialMapping) -> Result<()>;

    /// Remove a post and any mapping pointing at it
    async fn delete_post(&self, post_id: &str) -> Result<()>;

    async fn get_post(&self, post_id: &str) -> Result<Option<SocialPost>>;

    async fn get_mapping_for_post(&self, post_id: &str) -> Result<Option<ContentSocialMapping>>;

    /// Scheduled posts with `scheduled_time <= now`, earliest first
    async fn due_posts(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<SocialPost>>;

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<SocialPost>>;

    /// Apply `transition` only if the post is still `scheduled`.
    ///
    /// Returns `false` without writing anything when the post is missing
    /// or already terminal.
    async fn apply_transition(&self, post_id: &str, transition: &PostTransition) -> Result<bool>;

    async fn stats(&self) -> Result<PostStats>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn active_accounts(&self, platform: SocialPlatform) -> Result<Vec<SocialAccount>>;

    async fn get_account(&self, account_id: &str) -> Result<Option<SocialAccount>>;
}
