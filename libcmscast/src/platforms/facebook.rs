//! Facebook platform implementation
//!
//! Posts to a Page feed through the Graph API when the account carries a
//! `page_id` (or `organization_id`), and to the token owner's own feed
//! otherwise.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::config::FacebookConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::http::{self, ApiResponse};
use crate::platforms::{
    validate_text, validate_url, PlatformClient, PlatformResult, TokenGrant, ValidationReport,
};
use crate::types::{PlatformPostPayload, SocialAccount, SocialPlatform};

pub const FACEBOOK_CHARACTER_LIMIT: usize = 63_206;

const NAME: &str = "Facebook";
const ERROR_POINTERS: &[&str] = &["/error/message", "/error_description", "/message"];

/// Graph API error codes that mean the token is no longer usable
const AUTH_ERROR_CODES: &[i64] = &[102, 190];
/// Graph API throttling codes (app, user, page and custom limits)
const RATE_LIMIT_CODES: &[i64] = &[4, 17, 32, 613];

pub struct FacebookClient {
    http: reqwest::Client,
    graph_base: String,
    app_id: String,
    app_secret: String,
}

impl FacebookClient {
    pub fn new(config: &FacebookConfig) -> Result<Self> {
        Ok(Self {
            http: http::build_client("facebook", config.request_timeout()?)?,
            graph_base: config.graph_base.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
        })
    }

    /// Feed id and token to post with
    async fn resolve_target(&self, account: &SocialAccount) -> PlatformResult<(String, String)> {
        let page_id = account
            .data_str("page_id")
            .or_else(|| account.data_str("organization_id"));

        if let Some(page_id) = page_id {
            let token = account
                .data_str("page_access_token")
                .unwrap_or_else(|| account.access_token.clone());
            return Ok((page_id, token));
        }

        debug!(account_id = %account.id, "Resolving Facebook user id");
        let response = self
            .http
            .get(format!("{}/me", self.graph_base))
            .query(&[("fields", "id"), ("access_token", account.access_token.as_str())])
            .send()
            .await
            .map_err(|e| http::map_transport_error(NAME, "profile lookup", e))?;

        let ApiResponse { body, .. } =
            http::read_response(NAME, "profile lookup", response, |s, b, raw| {
                map_graph_error("profile lookup", s, b, raw)
            })
            .await?;

        let user_id = body
            .as_ref()
            .and_then(|b| b.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::Authentication(
                    "Facebook profile lookup returned no user id".to_string(),
                )
            })?;

        Ok((user_id, account.access_token.clone()))
    }
}

/// Map a Graph API error response, honouring its numeric error code
fn map_graph_error(
    context: &str,
    status: StatusCode,
    body: Option<&Value>,
    raw: &str,
) -> PlatformError {
    let message = http::body_message(body, raw, ERROR_POINTERS);
    let code = body
        .and_then(|b| b.pointer("/error/code"))
        .and_then(Value::as_i64);

    match code {
        Some(c) if AUTH_ERROR_CODES.contains(&c) => PlatformError::Authentication(format!(
            "Facebook rejected the access token during {} (code {}): {}. \
             Suggestion: reconnect the page to obtain a fresh token.",
            context, c, message
        )),
        Some(c) if RATE_LIMIT_CODES.contains(&c) => PlatformError::RateLimit(format!(
            "Facebook throttled {} (code {}): {}",
            context, c, message
        )),
        _ => http::map_status_error(NAME, context, status, message, body.cloned()),
    }
}

#[async_trait]
impl PlatformClient for FacebookClient {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::Facebook
    }

    fn character_limit(&self) -> usize {
        FACEBOOK_CHARACTER_LIMIT
    }

    async fn exchange_code_for_token(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> PlatformResult<TokenGrant> {
        if self.app_id.is_empty() || self.app_secret.is_empty() {
            return Err(PlatformError::Authentication(
                "Facebook app_id and app_secret must be configured".to_string(),
            ));
        }

        let response = self
            .http
            .get(format!("{}/oauth/access_token", self.graph_base))
            .query(&[
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| http::map_transport_error(NAME, "token exchange", e))?;

        let ApiResponse { body, .. } =
            http::read_response(NAME, "token exchange", response, |s, b, raw| {
                match map_graph_error("token exchange", s, b, raw) {
                    PlatformError::Api { message, .. } => PlatformError::Authentication(message),
                    other => other,
                }
            })
            .await?;

        body.and_then(|b| serde_json::from_value::<TokenGrant>(b).ok())
            .ok_or_else(|| {
                PlatformError::Authentication(
                    "Facebook token response did not contain an access_token".to_string(),
                )
            })
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        payload: &PlatformPostPayload,
    ) -> PlatformResult<String> {
        let (target, token) = self.resolve_target(account).await?;
        debug!(account_id = %account.id, target = %target, "Publishing to Facebook");

        let mut form: Vec<(&str, &str)> = vec![
            ("message", payload.text.as_str()),
            ("access_token", token.as_str()),
        ];
        if let Some(url) = payload.url.as_deref() {
            form.push(("link", url));
        }

        let response = self
            .http
            .post(format!("{}/{}/feed", self.graph_base, target))
            .form(&form)
            .send()
            .await
            .map_err(|e| http::map_transport_error(NAME, "publish", e))?;

        let ApiResponse { body, .. } =
            http::read_response(NAME, "publish", response, |s, b, raw| {
                map_graph_error("publish", s, b, raw)
            })
            .await?;

        body.as_ref()
            .and_then(|b| b.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::Posting("Facebook accepted the post but returned no id".to_string())
            })
    }

    fn validate(&self, payload: &PlatformPostPayload) -> ValidationReport {
        let mut errors = Vec::new();
        validate_text(&payload.text, FACEBOOK_CHARACTER_LIMIT, &mut errors);
        validate_url(payload.url.as_deref(), &mut errors);
        ValidationReport::from_errors(errors)
    }
}
