//! Cmscast - social publishing for a headless CMS
//!
//! When a content item is published, this library turns it into
//! platform-specific posts, schedules them, and later dispatches due posts
//! to LinkedIn and Facebook with retries and status tracking.

pub mod branding;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod scheduling;
pub mod service;
pub mod store;
pub mod transform;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{CmscastError, Result};
pub use service::SocialService;
pub use types::{
    ContentItem, ContentSocialMapping, MappingStatus, PlatformPostPayload, PostStatus,
    SocialAccount, SocialPlatform, SocialPost,
};
