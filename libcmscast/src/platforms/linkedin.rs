//! LinkedIn platform implementation
//!
//! Publishes through the UGC Posts API. Accounts whose metadata carries an
//! `organization_urn` or `organization_id` post as that organization;
//! otherwise the member behind the access token is looked up first.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LinkedInConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::http::{self, ApiResponse};
use crate::platforms::{
    validate_text, validate_url, PlatformClient, PlatformResult, TokenGrant, ValidationReport,
};
use crate::types::{PlatformPostPayload, SocialAccount, SocialPlatform};

pub const LINKEDIN_CHARACTER_LIMIT: usize = 3000;
pub const VISIBILITIES: &[&str] = &["PUBLIC", "CONNECTIONS", "LOGGED_IN"];

const NAME: &str = "LinkedIn";
const ERROR_POINTERS: &[&str] = &["/message", "/error_description", "/error"];

pub struct LinkedInClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: String,
}

impl LinkedInClient {
    pub fn new(config: &LinkedInConfig) -> Result<Self> {
        Ok(Self {
            http: http::build_client("linkedin", config.request_timeout()?)?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            oauth_base: config.oauth_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    /// Author URN for the post
    ///
    /// Organization metadata wins; otherwise `/v2/userinfo` is asked for the
    /// member id behind the token.
    async fn resolve_author(&self, account: &SocialAccount) -> PlatformResult<String> {
        if let Some(urn) = account.data_str("organization_urn") {
            return Ok(urn);
        }
        if let Some(id) = account.data_str("organization_id") {
            return Ok(format!("urn:li:organization:{}", id));
        }

        debug!(account_id = %account.id, "Resolving LinkedIn member id");
        let response = self
            .http
            .get(format!("{}/v2/userinfo", self.api_base))
            .bearer_auth(&account.access_token)
            .send()
            .await
            .map_err(|e| http::map_transport_error(NAME, "profile lookup", e))?;

        let ApiResponse { body, .. } =
            http::read_response(NAME, "profile lookup", response, |s, b, raw| {
                map_error("profile lookup", s, b, raw)
            })
            .await?;

        body.as_ref()
            .and_then(|b| b.get("sub"))
            .and_then(Value::as_str)
            .map(|sub| format!("urn:li:person:{}", sub))
            .ok_or_else(|| {
                PlatformError::Authentication(
                    "LinkedIn profile lookup returned no member id".to_string(),
                )
            })
    }
}

/// UGC post body for `payload` authored by `author`
pub fn build_share(author: &str, payload: &PlatformPostPayload) -> Value {
    let mut share = json!({
        "shareCommentary": { "text": payload.text },
        "shareMediaCategory": "NONE",
    });

    if let Some(url) = &payload.url {
        let mut media = json!({ "status": "READY", "originalUrl": url });
        if let Some(title) = &payload.title {
            media["title"] = json!({ "text": title });
        }
        if let Some(description) = &payload.description {
            media["description"] = json!({ "text": description });
        }
        share["shareMediaCategory"] = json!("ARTICLE");
        share["media"] = json!([media]);
    }

    json!({
        "author": author,
        "lifecycleState": "PUBLISHED",
        "specificContent": { "com.linkedin.ugc.ShareContent": share },
        "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": payload.visibility },
    })
}

fn map_error(context: &str, status: StatusCode, body: Option<&Value>, raw: &str) -> PlatformError {
    let message = http::body_message(body, raw, ERROR_POINTERS);
    http::map_status_error(NAME, context, status, message, body.cloned())
}

#[async_trait]
impl PlatformClient for LinkedInClient {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::LinkedIn
    }

    fn character_limit(&self) -> usize {
        LINKEDIN_CHARACTER_LIMIT
    }

    async fn exchange_code_for_token(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> PlatformResult<TokenGrant> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(PlatformError::Authentication(
                "LinkedIn client_id and client_secret must be configured".to_string(),
            ));
        }

        let response = self
            .http
            .post(format!("{}/accessToken", self.oauth_base))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| http::map_transport_error(NAME, "token exchange", e))?;

        let ApiResponse { body, .. } =
            http::read_response(NAME, "token exchange", response, |s, b, raw| {
                match map_error("token exchange", s, b, raw) {
                    // a bad code is an auth failure whatever the status
                    PlatformError::Api { message, .. } => PlatformError::Authentication(message),
                    other => other,
                }
            })
            .await?;

        body.and_then(|b| serde_json::from_value::<TokenGrant>(b).ok())
            .ok_or_else(|| {
                PlatformError::Authentication(
                    "LinkedIn token response did not contain an access_token".to_string(),
                )
            })
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        payload: &PlatformPostPayload,
    ) -> PlatformResult<String> {
        let author = self.resolve_author(account).await?;
        debug!(account_id = %account.id, author = %author, "Publishing to LinkedIn");

        let response = self
            .http
            .post(format!("{}/v2/ugcPosts", self.api_base))
            .bearer_auth(&account.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&build_share(&author, payload))
            .send()
            .await
            .map_err(|e| http::map_transport_error(NAME, "publish", e))?;

        let ApiResponse { headers, body } =
            http::read_response(NAME, "publish", response, |s, b, raw| {
                map_error("publish", s, b, raw)
            })
            .await?;

        body.as_ref()
            .and_then(|b| b.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                headers
                    .get("x-restli-id")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .ok_or_else(|| {
                PlatformError::Posting("LinkedIn accepted the post but returned no id".to_string())
            })
    }

    fn validate(&self, payload: &PlatformPostPayload) -> ValidationReport {
        let mut errors = Vec::new();

        validate_text(&payload.text, LINKEDIN_CHARACTER_LIMIT, &mut errors);
        validate_url(payload.url.as_deref(), &mut errors);

        if !VISIBILITIES.contains(&payload.visibility.as_str()) {
            errors.push(format!(
                "Visibility '{}' must be one of {}",
                payload.visibility,
                VISIBILITIES.join(", ")
            ));
        }

        ValidationReport::from_errors(errors)
    }
}
