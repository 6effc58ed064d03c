//! Core types for Cmscast

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CmscastError;

/// Supported social networks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    LinkedIn,
    Facebook,
    Twitter,
    Instagram,
}

impl SocialPlatform {
    pub const ALL: [SocialPlatform; 4] = [
        SocialPlatform::LinkedIn,
        SocialPlatform::Facebook,
        SocialPlatform::Twitter,
        SocialPlatform::Instagram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SocialPlatform::LinkedIn => "linkedin",
            SocialPlatform::Facebook => "facebook",
            SocialPlatform::Twitter => "twitter",
            SocialPlatform::Instagram => "instagram",
        }
    }
}

impl std::fmt::Display for SocialPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SocialPlatform {
    type Err = CmscastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linkedin" => Ok(SocialPlatform::LinkedIn),
            "facebook" | "fb" => Ok(SocialPlatform::Facebook),
            "twitter" | "x" => Ok(SocialPlatform::Twitter),
            "instagram" | "ig" => Ok(SocialPlatform::Instagram),
            other => Err(CmscastError::InvalidInput(format!(
                "Unknown platform '{}'. Valid options: linkedin, facebook, twitter, instagram",
                other
            ))),
        }
    }
}

/// Lifecycle of a [`SocialPost`]
///
/// `Scheduled` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Scheduled,
    Published,
    Failed,
    Cancelled,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
            PostStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PostStatus::Scheduled)
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = CmscastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(PostStatus::Scheduled),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            "cancelled" => Ok(PostStatus::Cancelled),
            other => Err(CmscastError::InvalidInput(format!(
                "Unknown post status '{}'",
                other
            ))),
        }
    }
}

/// Coarse status shown on a content item's mapping
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MappingStatus {
    Pending,
    Published,
    Failed,
    Skipped,
}

impl MappingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingStatus::Pending => "pending",
            MappingStatus::Published => "published",
            MappingStatus::Failed => "failed",
            MappingStatus::Skipped => "skipped",
        }
    }
}

impl From<PostStatus> for MappingStatus {
    fn from(status: PostStatus) -> Self {
        match status {
            PostStatus::Scheduled => MappingStatus::Pending,
            PostStatus::Published => MappingStatus::Published,
            PostStatus::Failed => MappingStatus::Failed,
            PostStatus::Cancelled => MappingStatus::Skipped,
        }
    }
}

impl FromStr for MappingStatus {
    type Err = CmscastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MappingStatus::Pending),
            "published" => Ok(MappingStatus::Published),
            "failed" => Ok(MappingStatus::Failed),
            "skipped" => Ok(MappingStatus::Skipped),
            other => Err(CmscastError::InvalidInput(format!(
                "Unknown mapping status '{}'",
                other
            ))),
        }
    }
}

/// A CMS content record. Owned by the CMS and only read here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: Map<String, Value>,
    #[serde(default)]
    pub slug: Option<String>,
    pub status: String,
}

impl ContentItem {
    pub fn is_published(&self) -> bool {
        self.status.eq_ignore_ascii_case("published")
    }

    /// First non-empty string stored under any of `keys`
    pub fn field(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.content.get(*key))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

/// A connected social account and its credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct SocialAccount {
    pub id: String,
    pub platform: SocialPlatform,
    pub account_name: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub account_data: Map<String, Value>,
}

impl SocialAccount {
    pub fn new(platform: SocialPlatform, account_name: &str, access_token: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            platform,
            account_name: account_name.to_string(),
            access_token: access_token.to_string(),
            refresh_token: None,
            is_active: true,
            account_data: Map::new(),
        }
    }

    /// Metadata value as a string; numeric ids are accepted too
    pub fn data_str(&self, key: &str) -> Option<String> {
        match self.account_data.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for SocialAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialAccount")
            .field("id", &self.id)
            .field("platform", &self.platform)
            .field("account_name", &self.account_name)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("is_active", &self.is_active)
            .field("account_data", &self.account_data)
            .finish()
    }
}

/// Platform-shaped post body, stored as the post's `post_data`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformPostPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub visibility: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// A scheduled or executed unit of publishing work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocialPost {
    pub id: String,
    pub content_id: String,
    pub platform: SocialPlatform,
    pub account_id: String,
    pub status: PostStatus,
    pub scheduled_time: DateTime<Utc>,
    pub published_time: Option<DateTime<Utc>>,
    pub post_data: Value,
    pub platform_post_id: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error_message: Option<String>,
    pub analytics_data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SocialPost {
    /// New post in the `scheduled` state
    pub fn new(
        content_id: &str,
        account: &SocialAccount,
        scheduled_time: DateTime<Utc>,
        post_data: Value,
        max_retries: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            content_id: content_id.to_string(),
            platform: account.platform,
            account_id: account.id.clone(),
            status: PostStatus::Scheduled,
            scheduled_time,
            published_time: None,
            post_data,
            platform_post_id: None,
            retry_count: 0,
            max_retries,
            error_message: None,
            analytics_data: Value::Object(Map::new()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Decode `post_data` back into a payload
    pub fn payload(&self) -> Result<PlatformPostPayload, serde_json::Error> {
        serde_json::from_value(self.post_data.clone())
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Scheduled && self.scheduled_time <= now
    }
}

/// Join/audit record pairing a content item with one social post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentSocialMapping {
    pub id: String,
    pub content_item_id: String,
    pub social_post_id: String,
    pub platform: SocialPlatform,
    pub auto_publish: bool,
    pub publish_immediately: bool,
    pub custom_message: Option<String>,
    pub hashtags: Vec<String>,
    pub status: MappingStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ContentSocialMapping {
    pub fn for_post(post: &SocialPost, hashtags: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content_item_id: post.content_id.clone(),
            social_post_id: post.id.clone(),
            platform: post.platform,
            auto_publish: true,
            publish_immediately: false,
            custom_message: None,
            hashtags,
            status: MappingStatus::Pending,
            published_at: None,
            error_message: None,
            created_at: post.created_at,
        }
    }
}

/// Selection criteria for listing posts
#[derive(Debug, Clone)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub platform: Option<SocialPlatform>,
    pub content_id: Option<String>,
    pub limit: u32,
}

impl Default for PostFilter {
    fn default() -> Self {
        Self {
            status: None,
            platform: None,
            content_id: None,
            limit: 100,
        }
    }
}

/// Aggregate post counts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostStats {
    pub total_posts: i64,
    pub scheduled_posts: i64,
    pub published_posts: i64,
    pub failed_posts: i64,
    pub cancelled_posts: i64,
    pub platforms: BTreeMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_platform_parsing_accepts_aliases() {
        assert_eq!("LinkedIn".parse::<SocialPlatform>().unwrap(), SocialPlatform::LinkedIn);
        assert_eq!("fb".parse::<SocialPlatform>().unwrap(), SocialPlatform::Facebook);
        assert_eq!("x".parse::<SocialPlatform>().unwrap(), SocialPlatform::Twitter);
        assert_eq!("ig".parse::<SocialPlatform>().unwrap(), SocialPlatform::Instagram);
        assert!("myspace".parse::<SocialPlatform>().is_err());
    }

    #[test]
    fn test_platform_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SocialPlatform::LinkedIn).unwrap(), "\"linkedin\"");
        for platform in SocialPlatform::ALL {
            assert_eq!(platform.to_string().parse::<SocialPlatform>().unwrap(), platform);
        }
    }

    #[test]
    fn test_only_scheduled_is_non_terminal() {
        assert!(!PostStatus::Scheduled.is_terminal());
        assert!(PostStatus::Published.is_terminal());
        assert!(PostStatus::Failed.is_terminal());
        assert!(PostStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_mapping_status_follows_post_status() {
        assert_eq!(MappingStatus::from(PostStatus::Scheduled), MappingStatus::Pending);
        assert_eq!(MappingStatus::from(PostStatus::Published), MappingStatus::Published);
        assert_eq!(MappingStatus::from(PostStatus::Failed), MappingStatus::Failed);
        assert_eq!(MappingStatus::from(PostStatus::Cancelled), MappingStatus::Skipped);
    }

    #[test]
    fn test_content_field_priority_skips_blank_values() {
        let item: ContentItem = serde_json::from_value(json!({
            "id": "c1",
            "title": "Hello",
            "status": "published",
            "content": { "text": "   ", "body": "Body wins", "excerpt": "Excerpt" }
        }))
        .unwrap();

        assert!(item.is_published());
        assert_eq!(item.field(&["text", "body", "excerpt"]), Some("Body wins"));
        assert_eq!(item.field(&["missing"]), None);
    }

    #[test]
    fn test_account_debug_redacts_tokens() {
        let mut account = SocialAccount::new(SocialPlatform::LinkedIn, "Haidrun", "secret-token");
        account.refresh_token = Some("refresh-secret".to_string());

        let debug = format!("{:?}", account);
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("refresh-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_account_data_str_accepts_numbers() {
        let mut account = SocialAccount::new(SocialPlatform::LinkedIn, "Haidrun", "t");
        account.account_data.insert("organization_id".into(), json!(12345));
        account.account_data.insert("page_id".into(), json!("  "));

        assert_eq!(account.data_str("organization_id").as_deref(), Some("12345"));
        assert_eq!(account.data_str("page_id"), None);
    }

    #[test]
    fn test_payload_uses_camel_case_keys() {
        let payload = PlatformPostPayload {
            text: "Hello".to_string(),
            url: None,
            title: None,
            description: None,
            image_url: Some("https://cdn.test/a.png".to_string()),
            visibility: "PUBLIC".to_string(),
            hashtags: vec!["#CFO".to_string()],
            category: None,
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["imageUrl"], "https://cdn.test/a.png");
        assert!(value.get("url").is_none());
    }

    #[test]
    fn test_new_post_starts_scheduled() {
        let account = SocialAccount::new(SocialPlatform::Facebook, "Page", "t");
        let when = Utc::now();
        let post = SocialPost::new("content-1", &account, when, json!({}), 3);

        assert_eq!(post.status, PostStatus::Scheduled);
        assert_eq!(post.retry_count, 0);
        assert_eq!(post.platform, SocialPlatform::Facebook);
        assert!(post.published_time.is_none());
        assert!(post.is_due(when));
        assert!(!post.is_due(when - chrono::Duration::seconds(1)));
    }
}
