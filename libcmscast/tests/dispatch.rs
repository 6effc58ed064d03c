//! Integration tests for the dispatch path and manual controls

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use libcmscast::branding::BrandingProfile;
use libcmscast::error::PlatformError;
use libcmscast::platforms::mock::{MockBehavior, MockClient};
use libcmscast::platforms::{stubs, PlatformRegistry};
use libcmscast::scheduling::ScheduleOption;
use libcmscast::service::dispatch::DispatchPolicy;
use libcmscast::service::events::Event;
use libcmscast::service::publishing::PublishOptions;
use libcmscast::store::PostStore;
use libcmscast::{
    CmscastError, ContentItem, Database, MappingStatus, PostStatus, SocialAccount,
    SocialPlatform, SocialService,
};

struct Harness {
    service: SocialService,
    db: Arc<Database>,
    accounts: Vec<SocialAccount>,
}

fn content() -> ContentItem {
    serde_json::from_value(json!({
        "id": "content-1",
        "title": "Board Insight",
        "slug": "board-insight",
        "status": "published",
        "content": { "text": "How boards evaluate executive talent." }
    }))
    .unwrap()
}

/// Policy whose retries are due again immediately
fn instant_retries() -> DispatchPolicy {
    DispatchPolicy {
        retry_delay: Duration::ZERO,
        ..Default::default()
    }
}

async fn harness(registry: PlatformRegistry, policy: DispatchPolicy, accounts: usize) -> Harness {
    let db = Arc::new(Database::in_memory().await.unwrap());
    let platform = registry.platforms()[0];

    let mut created = Vec::new();
    for i in 0..accounts {
        let account = SocialAccount::new(platform, &format!("account-{}", i), "token");
        db.insert_account(&account).await.unwrap();
        created.push(account);
    }

    let service = SocialService::new(
        db.clone(),
        db.clone(),
        registry,
        BrandingProfile::haidrun(),
        policy,
    );

    Harness {
        service,
        db,
        accounts: created,
    }
}

fn with_client(client: MockClient) -> PlatformRegistry {
    PlatformRegistry::new().with(Arc::new(client))
}

/// Schedule the test content for every account and return the post ids
async fn schedule(h: &Harness, schedule: ScheduleOption) -> Vec<String> {
    let options = PublishOptions {
        schedule,
        ..Default::default()
    };
    h.service
        .handle_content_published(&content(), &options)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.post_id.unwrap())
        .collect()
}

#[tokio::test]
async fn test_due_post_is_published() {
    let client = MockClient::success(SocialPlatform::LinkedIn);
    let h = harness(with_client(client.clone()), DispatchPolicy::default(), 1).await;
    let ids = schedule(&h, ScheduleOption::Immediate).await;

    let summary = h.service.process_pending_posts().await.unwrap();

    assert_eq!(summary.posts_processed, 1);
    assert_eq!(summary.successful_posts, 1);
    assert_eq!(summary.failed_posts, 0);
    assert!(summary.errors.is_empty());

    let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Published);
    assert!(post.published_time.is_some());
    assert!(post.platform_post_id.unwrap().starts_with("linkedin:mock-"));

    let mapping = h.db.get_mapping_for_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(mapping.status, MappingStatus::Published);
    assert!(mapping.published_at.is_some());

    assert_eq!(client.published_texts().len(), 1);
    assert!(client.published_texts()[0].starts_with("Board Insight"));
}

#[tokio::test]
async fn test_future_posts_are_not_dispatched() {
    let client = MockClient::success(SocialPlatform::LinkedIn);
    let h = harness(with_client(client.clone()), DispatchPolicy::default(), 1).await;
    schedule(&h, ScheduleOption::Tomorrow9am).await;

    let summary = h.service.process_pending_posts().await.unwrap();

    assert_eq!(summary.posts_processed, 0);
    assert_eq!(client.publish_calls(), 0);
}

#[tokio::test]
async fn test_panic_in_one_post_does_not_stop_the_others() {
    let client = MockClient::scripted(
        SocialPlatform::LinkedIn,
        vec![MockBehavior::Succeed, MockBehavior::Panic, MockBehavior::Succeed],
    );
    let h = harness(with_client(client.clone()), DispatchPolicy::default(), 3).await;
    schedule(&h, ScheduleOption::Immediate).await;

    let summary = h.service.process_pending_posts().await.unwrap();

    assert_eq!(summary.posts_processed, 3);
    assert_eq!(summary.successful_posts, 2);
    assert_eq!(summary.failed_posts, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].error.contains("panicked"));
    assert_eq!(client.publish_calls(), 3);

    // The panicking post stays scheduled with one retry used
    let failed = h.db.get_post(&summary.errors[0].post_id).await.unwrap().unwrap();
    assert_eq!(failed.status, PostStatus::Scheduled);
    assert_eq!(failed.retry_count, 1);
}

#[tokio::test]
async fn test_retry_count_never_exceeds_max_retries() {
    let client = MockClient::failing(
        SocialPlatform::LinkedIn,
        PlatformError::Network("connection reset".to_string()),
    );
    let h = harness(with_client(client.clone()), instant_retries(), 1).await;
    let ids = schedule(&h, ScheduleOption::Immediate).await;

    for expected_retry in 1..=3 {
        let summary = h.service.process_pending_posts().await.unwrap();
        assert_eq!(summary.failed_posts, 1);

        let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Scheduled);
        assert_eq!(post.retry_count, expected_retry);
        assert!(post.error_message.as_deref().unwrap().contains("NETWORK_ERROR"));
    }

    // Fourth failure exhausts the budget
    h.service.process_pending_posts().await.unwrap();
    let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Failed);
    assert_eq!(post.retry_count, 3);
    assert!(post.published_time.is_none());

    let mapping = h.db.get_mapping_for_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(mapping.status, MappingStatus::Failed);

    // Terminal posts are never picked up again
    let summary = h.service.process_pending_posts().await.unwrap();
    assert_eq!(summary.posts_processed, 0);
    assert_eq!(client.publish_calls(), 4);
}

#[tokio::test]
async fn test_retry_uses_fixed_delay() {
    let client = MockClient::failing(
        SocialPlatform::LinkedIn,
        PlatformError::Timeout("slow".to_string()),
    );
    let h = harness(with_client(client), DispatchPolicy::default(), 1).await;
    let ids = schedule(&h, ScheduleOption::Immediate).await;
    let mut events = h.service.subscribe();

    let before = chrono::Utc::now();
    h.service.process_pending_posts().await.unwrap();

    let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
    let delay = post.scheduled_time - before;
    assert!(delay >= chrono::Duration::seconds(299));
    assert!(delay <= chrono::Duration::seconds(301));

    match events.recv().await.unwrap() {
        Event::RetryScheduled { retry_count, .. } => assert_eq!(retry_count, 1),
        other => panic!("Expected RetryScheduled, got {:?}", other),
    }
}

#[tokio::test]
async fn test_validation_failure_is_terminal() {
    let client = MockClient::invalid(
        SocialPlatform::LinkedIn,
        vec!["Visibility 'SECRET' is not supported".to_string()],
    );
    let h = harness(with_client(client.clone()), DispatchPolicy::default(), 1).await;
    let ids = schedule(&h, ScheduleOption::Immediate).await;

    let summary = h.service.process_pending_posts().await.unwrap();
    assert_eq!(summary.failed_posts, 1);

    let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Failed);
    assert_eq!(post.retry_count, 0);
    let error = post.error_message.unwrap();
    assert!(error.starts_with("Content validation failed"));
    assert!(error.contains("SECRET"));
    assert_eq!(client.publish_calls(), 0);
}

#[tokio::test]
async fn test_inactive_account_is_terminal() {
    let client = MockClient::success(SocialPlatform::LinkedIn);
    let h = harness(with_client(client.clone()), DispatchPolicy::default(), 1).await;
    let ids = schedule(&h, ScheduleOption::Immediate).await;
    h.db.deactivate_account(&h.accounts[0].id).await.unwrap();

    h.service.process_pending_posts().await.unwrap();

    let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Failed);
    assert_eq!(post.retry_count, 0);
    assert!(post.error_message.unwrap().contains("inactive"));
    assert_eq!(client.publish_calls(), 0);
}

#[tokio::test]
async fn test_stub_platform_fails_without_retry() {
    let registry = PlatformRegistry::new().with(Arc::new(stubs::TwitterClient));
    let h = harness(registry, DispatchPolicy::default(), 1).await;
    let ids = schedule(&h, ScheduleOption::Immediate).await;

    h.service.process_pending_posts().await.unwrap();

    let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Failed);
    assert!(post.error_message.unwrap().contains("NOT_IMPLEMENTED"));
}

#[tokio::test]
async fn test_auth_errors_retry_unless_transient_only() {
    let expired = PlatformError::Authentication("token expired".to_string());

    let h = harness(
        with_client(MockClient::failing(SocialPlatform::LinkedIn, expired.clone())),
        DispatchPolicy::default(),
        1,
    )
    .await;
    let ids = schedule(&h, ScheduleOption::Immediate).await;
    h.service.process_pending_posts().await.unwrap();
    let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Scheduled);
    assert_eq!(post.retry_count, 1);

    let strict = DispatchPolicy {
        retry_transient_only: true,
        ..Default::default()
    };
    let h = harness(
        with_client(MockClient::failing(SocialPlatform::LinkedIn, expired)),
        strict,
        1,
    )
    .await;
    let ids = schedule(&h, ScheduleOption::Immediate).await;
    h.service.process_pending_posts().await.unwrap();
    let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Failed);
    assert_eq!(post.retry_count, 0);
}

#[tokio::test]
async fn test_overlapping_dispatch_is_rejected() {
    let client = MockClient::success(SocialPlatform::LinkedIn).with_delay(Duration::from_millis(300));
    let h = harness(with_client(client), DispatchPolicy::default(), 1).await;
    schedule(&h, ScheduleOption::Immediate).await;

    let background = h.service.clone();
    let first = tokio::spawn(async move { background.process_pending_posts().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = h.service.process_pending_posts().await;
    assert!(matches!(second, Err(CmscastError::DispatchInProgress)));

    let summary = first.await.unwrap().unwrap();
    assert_eq!(summary.successful_posts, 1);

    // The flag is released once the run ends
    assert!(h.service.process_pending_posts().await.is_ok());
}

#[tokio::test]
async fn test_cancel_during_publish_wins() {
    let client = MockClient::success(SocialPlatform::LinkedIn).with_delay(Duration::from_millis(300));
    let h = harness(with_client(client.clone()), DispatchPolicy::default(), 1).await;
    let ids = schedule(&h, ScheduleOption::Immediate).await;

    let background = h.service.clone();
    let dispatch = tokio::spawn(async move { background.process_pending_posts().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let cancelled = h.service.cancel_post(&ids[0]).await.unwrap();
    assert!(cancelled.success);

    let summary = dispatch.await.unwrap().unwrap();
    assert_eq!(summary.posts_processed, 1);
    assert_eq!(summary.successful_posts, 0);
    assert_eq!(client.publish_calls(), 1);

    let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Cancelled);
    assert!(post.platform_post_id.is_none());
    assert!(post.published_time.is_none());
    let mapping = h.db.get_mapping_for_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(mapping.status, MappingStatus::Skipped);
}

#[tokio::test]
async fn test_cancel_rules() {
    let h = harness(
        with_client(MockClient::success(SocialPlatform::LinkedIn)),
        DispatchPolicy::default(),
        1,
    )
    .await;
    let ids = schedule(&h, ScheduleOption::Tomorrow5pm).await;

    let result = h.service.cancel_post(&ids[0]).await.unwrap();
    assert!(result.success);
    assert!(result.error.is_none());

    let again = h.service.cancel_post(&ids[0]).await.unwrap();
    assert!(!again.success);
    assert!(again.error.unwrap().contains("cancelled"));

    let missing = h.service.cancel_post("no-such-post").await.unwrap();
    assert!(!missing.success);
    assert!(missing.error.unwrap().contains("not found"));
}

#[tokio::test]
async fn test_terminal_states_are_closed() {
    let client = MockClient::success(SocialPlatform::LinkedIn);
    let h = harness(with_client(client.clone()), DispatchPolicy::default(), 1).await;
    let ids = schedule(&h, ScheduleOption::Immediate).await;
    h.service.process_pending_posts().await.unwrap();

    // published cannot be cancelled, rescheduled or published again
    assert!(!h.service.cancel_post(&ids[0]).await.unwrap().success);
    let later = chrono::Utc::now() + chrono::Duration::hours(1);
    assert!(matches!(
        h.service.reschedule_post(&ids[0], later).await,
        Err(CmscastError::InvalidInput(_))
    ));
    let again = h.service.publish_post_now(&ids[0]).await.unwrap();
    assert!(!again.success);
    assert!(again.error.unwrap().contains("published"));

    assert_eq!(client.publish_calls(), 1);
    let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Published);
}

#[tokio::test]
async fn test_publish_now_bypasses_schedule() {
    let client = MockClient::success(SocialPlatform::LinkedIn);
    let h = harness(with_client(client.clone()), DispatchPolicy::default(), 1).await;
    let ids = schedule(&h, ScheduleOption::Tomorrow9am).await;

    let result = h.service.publish_post_now(&ids[0]).await.unwrap();

    assert!(result.success);
    assert_eq!(result.post_id.as_deref(), Some(ids[0].as_str()));
    assert!(result.platform_post_id.is_some());
    assert_eq!(client.publish_calls(), 1);

    let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Published);
}

#[tokio::test]
async fn test_publish_now_rejects_cancelled_and_missing() {
    let client = MockClient::success(SocialPlatform::LinkedIn);
    let h = harness(with_client(client.clone()), DispatchPolicy::default(), 1).await;
    let ids = schedule(&h, ScheduleOption::Tomorrow9am).await;
    h.service.cancel_post(&ids[0]).await.unwrap();

    let result = h.service.publish_post_now(&ids[0]).await.unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("cancelled"));

    let missing = h.service.publish_post_now("no-such-post").await.unwrap();
    assert!(!missing.success);

    assert_eq!(client.publish_calls(), 0);
}

#[tokio::test]
async fn test_publish_now_failure_follows_retry_rules() {
    let client = MockClient::failing(
        SocialPlatform::LinkedIn,
        PlatformError::Api {
            status: 503,
            message: "unavailable".to_string(),
            details: None,
        },
    );
    let h = harness(with_client(client), DispatchPolicy::default(), 1).await;
    let ids = schedule(&h, ScheduleOption::Tomorrow9am).await;

    let result = h.service.publish_post_now(&ids[0]).await.unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("PLATFORM_ERROR"));

    let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Scheduled);
    assert_eq!(post.retry_count, 1);
}

#[tokio::test]
async fn test_publish_now_survives_client_panic() {
    let client = MockClient::panicking(SocialPlatform::LinkedIn);
    let h = harness(with_client(client.clone()), DispatchPolicy::default(), 1).await;
    let ids = schedule(&h, ScheduleOption::Tomorrow9am).await;

    let result = h.service.publish_post_now(&ids[0]).await.unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("Unexpected error while publishing"));
    assert_eq!(client.publish_calls(), 1);

    let post = h.db.get_post(&ids[0]).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Scheduled);
    assert_eq!(post.retry_count, 1);
}

#[tokio::test]
async fn test_reschedule_moves_post() {
    let h = harness(
        with_client(MockClient::success(SocialPlatform::LinkedIn)),
        DispatchPolicy::default(),
        1,
    )
    .await;
    let ids = schedule(&h, ScheduleOption::Tomorrow9am).await;

    let at = chrono::DateTime::parse_from_rfc3339("2031-01-02T03:04:05Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let post = h.service.reschedule_post(&ids[0], at).await.unwrap();
    assert_eq!(post.scheduled_time, at);
    assert_eq!(post.status, PostStatus::Scheduled);

    assert!(matches!(
        h.service.reschedule_post("no-such-post", at).await,
        Err(CmscastError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_stats_after_mixed_outcomes() {
    let client = MockClient::scripted(
        SocialPlatform::LinkedIn,
        vec![MockBehavior::Succeed, MockBehavior::Fail(PlatformError::Validation("no".into()))],
    );
    let h = harness(with_client(client), DispatchPolicy::default(), 3).await;
    let ids = schedule(&h, ScheduleOption::Immediate).await;
    h.service.cancel_post(&ids[2]).await.unwrap();

    h.service.process_pending_posts().await.unwrap();

    let stats = h.service.get_stats().await.unwrap();
    assert_eq!(stats.total_posts, 3);
    assert_eq!(stats.published_posts, 1);
    assert_eq!(stats.failed_posts, 1);
    assert_eq!(stats.cancelled_posts, 1);
    assert_eq!(stats.scheduled_posts, 0);
    assert_eq!(stats.platforms.get("linkedin"), Some(&3));
}
