//! Platforms that validate content but have no publishing backend yet
//!
//! Posts routed here fail with `NOT_IMPLEMENTED`, which the dispatcher
//! treats as terminal so they are never retried.

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::platforms::{
    validate_text, validate_url, PlatformClient, PlatformResult, TokenGrant, ValidationReport,
};
use crate::types::{PlatformPostPayload, SocialAccount, SocialPlatform};

pub const TWITTER_CHARACTER_LIMIT: usize = 280;
pub const INSTAGRAM_CHARACTER_LIMIT: usize = 2200;

fn not_implemented(platform: SocialPlatform, what: &str) -> PlatformError {
    PlatformError::NotImplemented(format!("{} {} is not implemented", platform, what))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TwitterClient;

#[async_trait]
impl PlatformClient for TwitterClient {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::Twitter
    }

    fn character_limit(&self) -> usize {
        TWITTER_CHARACTER_LIMIT
    }

    async fn exchange_code_for_token(&self, _code: &str, _redirect_uri: &str) -> PlatformResult<TokenGrant> {
        Err(not_implemented(SocialPlatform::Twitter, "OAuth"))
    }

    async fn publish(
        &self,
        _account: &SocialAccount,
        _payload: &PlatformPostPayload,
    ) -> PlatformResult<String> {
        Err(not_implemented(SocialPlatform::Twitter, "publishing"))
    }

    fn validate(&self, payload: &PlatformPostPayload) -> ValidationReport {
        let mut errors = Vec::new();
        validate_text(&payload.text, TWITTER_CHARACTER_LIMIT, &mut errors);
        validate_url(payload.url.as_deref(), &mut errors);
        ValidationReport::from_errors(errors)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstagramClient;

#[async_trait]
impl PlatformClient for InstagramClient {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::Instagram
    }

    fn character_limit(&self) -> usize {
        INSTAGRAM_CHARACTER_LIMIT
    }

    async fn exchange_code_for_token(&self, _code: &str, _redirect_uri: &str) -> PlatformResult<TokenGrant> {
        Err(not_implemented(SocialPlatform::Instagram, "OAuth"))
    }

    async fn publish(
        &self,
        _account: &SocialAccount,
        _payload: &PlatformPostPayload,
    ) -> PlatformResult<String> {
        Err(not_implemented(SocialPlatform::Instagram, "publishing"))
    }

    /// Instagram posts are image-first: a caption alone is rejected
    fn validate(&self, payload: &PlatformPostPayload) -> ValidationReport {
        let mut errors = Vec::new();
        validate_text(&payload.text, INSTAGRAM_CHARACTER_LIMIT, &mut errors);
        match payload.image_url.as_deref() {
            None => errors.push("Instagram posts require an image URL".to_string()),
            Some(image) => validate_url(Some(image), &mut errors),
        }
        ValidationReport::from_errors(errors)
    }
}
