//! Content transformation
//!
//! Turns a CMS [`ContentItem`] into a [`PlatformPostPayload`] for one
//! platform. Everything here is pure: the same content, platform and
//! branding profile always yield the same payload.
//!
//! # Example
//!
//! ```
//! use libcmscast::branding::BrandingProfile;
//! use libcmscast::transform::transform_to_platform;
//! use libcmscast::types::{ContentItem, SocialPlatform};
//!
//! let content: ContentItem = serde_json::from_value(serde_json::json!({
//!     "id": "42",
//!     "title": "CFO Appointment",
//!     "slug": "cfo-appointment",
//!     "status": "published",
//!     "content": { "body": "<p>Strong financial leadership.</p>" }
//! })).unwrap();
//!
//! let payload = transform_to_platform(&content, SocialPlatform::LinkedIn, &BrandingProfile::haidrun());
//! assert!(payload.text.contains("#CFO"));
//! assert_eq!(payload.url.as_deref(), Some("https://haidrun.com/cfo-appointment"));
//! ```

pub mod hashtags;
pub mod text;

use serde_json::Value;

use crate::branding::BrandingProfile;
use crate::types::{ContentItem, PlatformPostPayload, SocialPlatform};

pub use hashtags::generate_hashtags;
pub use text::{clean_html, truncate_description, truncate_text};

/// Keys holding the body text, in priority order
pub const BODY_KEYS: &[&str] = &["text", "body", "content", "excerpt", "post_content"];

pub const LINKEDIN_BODY_BUDGET: usize = 2600;
pub const FACEBOOK_BODY_BUDGET: usize = 2000;
pub const INSTAGRAM_BODY_BUDGET: usize = 2000;
pub const DESCRIPTION_BUDGET: usize = 300;
pub const TWITTER_LIMIT: usize = 280;
/// Length Twitter counts for any link, plus the joining space
pub const TWITTER_URL_RESERVE: usize = 24;

/// Visibility written into every payload unless the caller overrides it
pub const DEFAULT_VISIBILITY: &str = "PUBLIC";

/// Transform content for `platform` using its own body text
pub fn transform_to_platform(
    content: &ContentItem,
    platform: SocialPlatform,
    branding: &BrandingProfile,
) -> PlatformPostPayload {
    transform_with_message(content, platform, branding, None)
}

/// Transform content, replacing the body with `custom_message` when given
pub fn transform_with_message(
    content: &ContentItem,
    platform: SocialPlatform,
    branding: &BrandingProfile,
    custom_message: Option<&str>,
) -> PlatformPostPayload {
    let title = clean_html(&content.title);
    let source_body = extract_body(content);
    let hashtags = generate_hashtags(&title, &source_body, branding);

    let body = match custom_message.map(clean_html) {
        Some(message) if !message.is_empty() => message,
        _ => source_body.clone(),
    };

    let text = match platform {
        SocialPlatform::LinkedIn => join_sections(&[
            &title,
            &truncate_text(&body, LINKEDIN_BODY_BUDGET),
            &branding.call_to_action,
            &hashtags.join(" "),
        ]),
        SocialPlatform::Facebook => join_sections(&[
            &title,
            &truncate_text(&body, FACEBOOK_BODY_BUDGET),
            &hashtags.join(" "),
        ]),
        SocialPlatform::Twitter => {
            let has_url = content_url(content, branding).is_some();
            format_tweet(&title, &body, &hashtags, has_url)
        }
        SocialPlatform::Instagram => join_sections(&[
            &truncate_text(&body, INSTAGRAM_BODY_BUDGET),
            &hashtags.join(" "),
        ]),
    };

    let description = content
        .field(&["excerpt"])
        .map(clean_html)
        .unwrap_or_else(|| source_body.clone());
    let description = truncate_description(&description, DESCRIPTION_BUDGET);

    PlatformPostPayload {
        text,
        url: content_url(content, branding),
        title: non_empty(title),
        description: non_empty(description),
        image_url: content
            .field(&["featured_image", "image_url", "imageUrl"])
            .map(str::to_string),
        visibility: DEFAULT_VISIBILITY.to_string(),
        hashtags,
        category: category(content),
    }
}

/// Cleaned body text from the highest-priority populated key
pub fn extract_body(content: &ContentItem) -> String {
    content.field(BODY_KEYS).map(clean_html).unwrap_or_default()
}

/// Canonical URL for the content item
///
/// An explicit `url`/`link` wins; otherwise the slug (or one derived from
/// the title) is appended to the brand's site.
pub fn content_url(content: &ContentItem, branding: &BrandingProfile) -> Option<String> {
    if let Some(url) = content.field(&["url", "link"]) {
        return Some(url.to_string());
    }

    let slug = match content.slug.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => slug.to_string(),
        _ => slug::slugify(&content.title),
    };

    if slug.is_empty() {
        None
    } else {
        Some(format!("{}/{}", branding.base_url(), slug))
    }
}

fn category(content: &ContentItem) -> Option<String> {
    if let Some(category) = content.field(&["category"]) {
        return Some(category.to_string());
    }
    content
        .content
        .get("categories")
        .and_then(Value::as_array)
        .and_then(|categories| categories.iter().filter_map(Value::as_str).next())
        .map(str::to_string)
}

fn format_tweet(title: &str, body: &str, hashtags: &[String], has_url: bool) -> String {
    let budget = if has_url {
        TWITTER_LIMIT - TWITTER_URL_RESERVE
    } else {
        TWITTER_LIMIT
    };

    let headline = if title.is_empty() { body } else { title };
    let tags = hashtags.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
    let line = join_inline(&[headline.replace('\n', " ").as_str(), &tags]);

    // leave room for the ellipsis so the result stays inside the budget
    truncate_text(&line, budget.saturating_sub(3))
}

fn join_sections(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn join_inline(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
