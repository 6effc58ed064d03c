//! Mock platform implementation for testing
//!
//! A configurable [`PlatformClient`] that can succeed, fail with a given
//! error, panic, or follow a per-call script. It records every publish so
//! tests can verify dispatch logic without credentials or network access.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PlatformError;
use crate::platforms::{PlatformClient, PlatformResult, TokenGrant, ValidationReport};
use crate::types::{PlatformPostPayload, SocialAccount, SocialPlatform};

/// What a single publish call does
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Succeed,
    Fail(PlatformError),
    Panic,
}

/// Mock client for one platform
///
/// Clones share their counters and script, so a test can keep a handle
/// while the registry owns another.
#[derive(Debug, Clone)]
pub struct MockClient {
    platform: SocialPlatform,
    default_behavior: MockBehavior,
    script: Arc<Mutex<VecDeque<MockBehavior>>>,
    validation_errors: Vec<String>,
    delay: Duration,
    character_limit: usize,
    publish_calls: Arc<AtomicUsize>,
    published: Arc<Mutex<Vec<String>>>,
}

impl MockClient {
    pub fn new(platform: SocialPlatform, default_behavior: MockBehavior) -> Self {
        Self {
            platform,
            default_behavior,
            script: Arc::new(Mutex::new(VecDeque::new())),
            validation_errors: Vec::new(),
            delay: Duration::ZERO,
            character_limit: 10_000,
            publish_calls: Arc::new(AtomicUsize::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every publish succeeds
    pub fn success(platform: SocialPlatform) -> Self {
        Self::new(platform, MockBehavior::Succeed)
    }

    /// Every publish fails with `error`
    pub fn failing(platform: SocialPlatform, error: PlatformError) -> Self {
        Self::new(platform, MockBehavior::Fail(error))
    }

    /// Every publish panics
    pub fn panicking(platform: SocialPlatform) -> Self {
        Self::new(platform, MockBehavior::Panic)
    }

    /// Calls follow `script` in order, then succeed
    pub fn scripted(platform: SocialPlatform, script: Vec<MockBehavior>) -> Self {
        let client = Self::success(platform);
        *lock(&client.script) = script.into();
        client
    }

    /// Validation always reports `errors`
    pub fn invalid(platform: SocialPlatform, errors: Vec<String>) -> Self {
        Self {
            validation_errors: errors,
            ..Self::success(platform)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.character_limit = limit;
        self
    }

    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    /// Texts that were published successfully, in call order
    pub fn published_texts(&self) -> Vec<String> {
        lock(&self.published).clone()
    }

    fn next_behavior(&self) -> MockBehavior {
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.default_behavior.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking publish must not poison the recorder for later calls
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl PlatformClient for MockClient {
    fn platform(&self) -> SocialPlatform {
        self.platform
    }

    fn character_limit(&self) -> usize {
        self.character_limit
    }

    async fn exchange_code_for_token(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> PlatformResult<TokenGrant> {
        if code.is_empty() {
            return Err(PlatformError::Authentication(
                "Mock rejected an empty code".to_string(),
            ));
        }
        Ok(TokenGrant {
            access_token: format!("mock-token-{}", code),
            expires_in: Some(3600),
            refresh_token: None,
        })
    }

    async fn publish(
        &self,
        _account: &SocialAccount,
        payload: &PlatformPostPayload,
    ) -> PlatformResult<String> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_behavior() {
            MockBehavior::Succeed => {
                lock(&self.published).push(payload.text.clone());
                Ok(format!("{}:mock-{}", self.platform, uuid::Uuid::new_v4()))
            }
            MockBehavior::Fail(error) => Err(error),
            MockBehavior::Panic => panic!("mock {} client panicked", self.platform),
        }
    }

    fn validate(&self, payload: &PlatformPostPayload) -> ValidationReport {
        let mut errors = self.validation_errors.clone();
        super::validate_text(&payload.text, self.character_limit, &mut errors);
        ValidationReport::from_errors(errors)
    }
}
