//! Dispatch path: publish due posts and drive the post state machine
//!
//! ```text
//! scheduled --success--> published
//! scheduled --failure, retry_count < max_retries--> scheduled (retry_count + 1, later time)
//! scheduled --failure, retry_count >= max_retries--> failed
//! scheduled --validation failure / missing account--> failed
//! scheduled --cancel--> cancelled
//! ```
//!
//! Every write goes through [`PostStore::apply_transition`], which only
//! touches posts that are still `scheduled`. A cancel that lands while a
//! publish is in flight therefore wins, and the late result is discarded.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::SchedulingConfig;
use crate::error::{CmscastError, Result};
use crate::platforms::PlatformRegistry;
use crate::scheduling::retry_at;
use crate::service::events::{Event, EventBus};
use crate::store::{AccountStore, PostStore, PostTransition};
use crate::types::{PostFilter, PostStats, SocialPlatform, SocialPost};

/// Retry and batching rules for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Retry budget stamped on new posts
    pub max_retries: u32,
    /// Fixed delay between attempts, regardless of `retry_count`
    pub retry_delay: Duration,
    /// Fail non-transient platform errors (auth, 4xx) without retrying
    pub retry_transient_only: bool,
    pub batch_size: u32,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5 * 60),
            retry_transient_only: false,
            batch_size: 50,
        }
    }
}

impl DispatchPolicy {
    pub fn from_config(config: &SchedulingConfig) -> Result<Self> {
        Ok(Self {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay()?,
            retry_transient_only: config.retry_transient_only,
            batch_size: config.batch_size.max(1),
        })
    }
}

/// One failed post in a dispatch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchError {
    pub post_id: String,
    pub platform: SocialPlatform,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub posts_processed: usize,
    pub successful_posts: usize,
    pub failed_posts: usize,
    pub errors: Vec<DispatchError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualPublishResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_post_id: Option<String>,
}

impl ManualPublishResult {
    fn rejected(post_id: &str, error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            post_id: Some(post_id.to_string()),
            platform_post_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one publish attempt, before it is written back
#[derive(Debug)]
enum Attempt {
    Published(String),
    Failed { error: String, terminal: bool },
}

/// What happened to a post after its attempt was settled
#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Published(String),
    Retrying(String),
    Failed(String),
    /// The post left `scheduled` while the attempt was running
    Discarded,
}

/// Resets the in-progress flag when a dispatch run ends, even on early return
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct DispatchService {
    posts: Arc<dyn PostStore>,
    accounts: Arc<dyn AccountStore>,
    registry: PlatformRegistry,
    policy: DispatchPolicy,
    event_bus: EventBus,
    running: Arc<AtomicBool>,
}

impl DispatchService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        accounts: Arc<dyn AccountStore>,
        registry: PlatformRegistry,
        policy: DispatchPolicy,
        event_bus: EventBus,
    ) -> Self {
        Self {
            posts,
            accounts,
            registry,
            policy,
            event_bus,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Publish every due post, earliest first, one at a time.
    ///
    /// # Errors
    ///
    /// Returns [`CmscastError::DispatchInProgress`] if another run is still
    /// going, or a database error if the due posts cannot be queried.
    /// Failures of individual posts never abort the run.
    pub async fn process_pending_posts(&self) -> Result<DispatchSummary> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CmscastError::DispatchInProgress);
        }
        let _guard = RunGuard(&self.running);

        let due = self.posts.due_posts(Utc::now(), self.policy.batch_size).await?;
        debug!(count = due.len(), "Found due posts");

        let mut summary = DispatchSummary::default();
        for post in &due {
            summary.posts_processed += 1;
            match self.run(post).await {
                Ok(Outcome::Published(_)) => summary.successful_posts += 1,
                Ok(Outcome::Retrying(error)) | Ok(Outcome::Failed(error)) => {
                    summary.failed_posts += 1;
                    summary.errors.push(DispatchError {
                        post_id: post.id.clone(),
                        platform: post.platform,
                        error,
                    });
                }
                Ok(Outcome::Discarded) => {}
                Err(e) => {
                    error!(post_id = %post.id, error = %e, "Could not record dispatch result");
                    summary.failed_posts += 1;
                    summary.errors.push(DispatchError {
                        post_id: post.id.clone(),
                        platform: post.platform,
                        error: e.to_string(),
                    });
                }
            }
        }

        if summary.posts_processed > 0 {
            info!(
                processed = summary.posts_processed,
                successful = summary.successful_posts,
                failed = summary.failed_posts,
                "Dispatch run finished"
            );
        }
        self.event_bus.emit(Event::DispatchCompleted {
            posts_processed: summary.posts_processed,
            successful_posts: summary.successful_posts,
            failed_posts: summary.failed_posts,
        });

        Ok(summary)
    }

    /// Publish one post immediately, ignoring its scheduled time.
    ///
    /// Posts that are missing or already terminal are rejected without any
    /// write. A failed attempt follows the normal retry rules.
    pub async fn publish_post_now(&self, post_id: &str) -> Result<ManualPublishResult> {
        let Some(post) = self.posts.get_post(post_id).await? else {
            return Ok(ManualPublishResult::rejected(post_id, format!("Post {} not found", post_id)));
        };

        if post.status.is_terminal() {
            return Ok(ManualPublishResult::rejected(
                post_id,
                format!("Post is already {}", post.status),
            ));
        }

        if post.is_due(Utc::now()) {
            info!(post_id = %post.id, platform = %post.platform, "Publishing post now");
        } else {
            info!(
                post_id = %post.id,
                platform = %post.platform,
                scheduled_time = %post.scheduled_time,
                "Publishing post ahead of its scheduled time"
            );
        }

        let result = match self.run(&post).await? {
            Outcome::Published(platform_post_id) => ManualPublishResult {
                success: true,
                error: None,
                post_id: Some(post.id),
                platform_post_id: Some(platform_post_id),
            },
            Outcome::Retrying(error) | Outcome::Failed(error) => {
                ManualPublishResult::rejected(&post.id, error)
            }
            Outcome::Discarded => ManualPublishResult::rejected(
                &post.id,
                "Post left the scheduled state while publishing".to_string(),
            ),
        };

        Ok(result)
    }

    /// Cancel a scheduled post and mark its mapping skipped
    pub async fn cancel_post(&self, post_id: &str) -> Result<CancelResult> {
        let Some(post) = self.posts.get_post(post_id).await? else {
            return Ok(CancelResult {
                success: false,
                error: Some(format!("Post {} not found", post_id)),
            });
        };

        if post.status.is_terminal() {
            return Ok(CancelResult {
                success: false,
                error: Some(format!("Cannot cancel a {} post", post.status)),
            });
        }

        if !self.posts.apply_transition(post_id, &PostTransition::Cancelled).await? {
            return Ok(CancelResult {
                success: false,
                error: Some("Post is no longer scheduled".to_string()),
            });
        }

        info!(post_id = %post_id, "Cancelled post");
        self.event_bus.emit(Event::PostCancelled {
            post_id: post_id.to_string(),
        });

        Ok(CancelResult {
            success: true,
            error: None,
        })
    }

    /// Move a scheduled post to a new time
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id and `InvalidInput` for a terminal post.
    pub async fn reschedule_post(&self, post_id: &str, at: DateTime<Utc>) -> Result<SocialPost> {
        let post = self
            .posts
            .get_post(post_id)
            .await?
            .ok_or_else(|| CmscastError::NotFound(format!("Post {}", post_id)))?;

        if post.status.is_terminal()
            || !self
                .posts
                .apply_transition(post_id, &PostTransition::Rescheduled { at })
                .await?
        {
            return Err(CmscastError::InvalidInput(format!(
                "Cannot reschedule a {} post",
                post.status
            )));
        }

        info!(post_id = %post_id, scheduled_time = %at, "Rescheduled post");

        self.posts
            .get_post(post_id)
            .await?
            .ok_or_else(|| CmscastError::NotFound(format!("Post {}", post_id)))
    }

    pub async fn get_stats(&self) -> Result<PostStats> {
        self.posts.stats().await
    }

    pub async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<SocialPost>> {
        self.posts.list_posts(filter).await
    }

    /// Attempt a post with panics contained, then write the result back
    async fn run(&self, post: &SocialPost) -> Result<Outcome> {
        let attempt = match AssertUnwindSafe(self.attempt(post)).catch_unwind().await {
            Ok(attempt) => attempt,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(post_id = %post.id, platform = %post.platform, reason = %reason, "Platform client panicked");
                Attempt::Failed {
                    error: format!("Unexpected error while publishing: {}", reason),
                    terminal: false,
                }
            }
        };

        self.settle(post, attempt).await
    }

    /// Everything between picking a post and knowing its fate. Never writes.
    async fn attempt(&self, post: &SocialPost) -> Attempt {
        let Some(client) = self.registry.get(post.platform) else {
            return Attempt::Failed {
                error: format!("No client configured for platform {}", post.platform),
                terminal: true,
            };
        };

        let account = match self.accounts.get_account(&post.account_id).await {
            Ok(Some(account)) if account.is_active => account,
            Ok(Some(_)) => {
                return Attempt::Failed {
                    error: format!("Account {} is inactive", post.account_id),
                    terminal: true,
                }
            }
            Ok(None) => {
                return Attempt::Failed {
                    error: format!("Account {} not found", post.account_id),
                    terminal: true,
                }
            }
            Err(e) => {
                return Attempt::Failed {
                    error: format!("Could not load account {}: {}", post.account_id, e),
                    terminal: false,
                }
            }
        };

        let payload = match post.payload() {
            Ok(payload) => payload,
            Err(e) => {
                return Attempt::Failed {
                    error: format!("Stored post data is not a valid payload: {}", e),
                    terminal: true,
                }
            }
        };

        if let Err(e) = client.validate(&payload).into_result() {
            return Attempt::Failed {
                error: e.to_string(),
                terminal: true,
            };
        }

        debug!(post_id = %post.id, platform = %post.platform, account_id = %account.id, "Publishing post");
        match client.publish(&account, &payload).await {
            Ok(platform_post_id) => Attempt::Published(platform_post_id),
            Err(e) => {
                let normalized = e.normalize();
                Attempt::Failed {
                    error: format!("[{}] {}", normalized.code, normalized.message),
                    terminal: e.is_terminal()
                        || (self.policy.retry_transient_only && !e.is_transient()),
                }
            }
        }
    }

    async fn settle(&self, post: &SocialPost, attempt: Attempt) -> Result<Outcome> {
        let now = Utc::now();

        let (transition, outcome, event) = match attempt {
            Attempt::Published(platform_post_id) => (
                PostTransition::Published {
                    platform_post_id: platform_post_id.clone(),
                    at: now,
                },
                Outcome::Published(platform_post_id.clone()),
                Event::PostPublished {
                    post_id: post.id.clone(),
                    platform: post.platform,
                    platform_post_id,
                },
            ),
            Attempt::Failed { error, terminal } if !terminal && post.retry_count < post.max_retries => {
                let retry_count = post.retry_count + 1;
                let next_attempt = retry_at(now, self.policy.retry_delay);
                (
                    PostTransition::RetryScheduled {
                        retry_count,
                        at: next_attempt,
                        error: error.clone(),
                    },
                    Outcome::Retrying(error.clone()),
                    Event::RetryScheduled {
                        post_id: post.id.clone(),
                        platform: post.platform,
                        retry_count,
                        next_attempt,
                        error,
                    },
                )
            }
            Attempt::Failed { error, .. } => (
                PostTransition::Failed {
                    error: error.clone(),
                },
                Outcome::Failed(error.clone()),
                Event::PostFailed {
                    post_id: post.id.clone(),
                    platform: post.platform,
                    error,
                },
            ),
        };

        if !self.posts.apply_transition(&post.id, &transition).await? {
            warn!(
                post_id = %post.id,
                transition = transition.name(),
                "Post left the scheduled state during dispatch, discarding result"
            );
            return Ok(Outcome::Discarded);
        }

        match &outcome {
            Outcome::Published(id) => {
                info!(post_id = %post.id, platform = %post.platform, platform_post_id = %id, "Published post")
            }
            Outcome::Retrying(error) => {
                warn!(post_id = %post.id, platform = %post.platform, retry = post.retry_count + 1, error = %error, "Publish failed, retry scheduled")
            }
            Outcome::Failed(error) => {
                warn!(post_id = %post.id, platform = %post.platform, error = %error, "Post failed")
            }
            Outcome::Discarded => {}
        }
        self.event_bus.emit(event);

        Ok(outcome)
    }
}
