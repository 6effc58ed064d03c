//! CLI integration tests for cmscast-publish

use assert_cmd::Command;
use libcmscast::store::PostStore;
use libcmscast::types::PostFilter;
use libcmscast::{Database, MappingStatus, PostStatus, SocialAccount, SocialPlatform};
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

struct TestEnv {
    dir: TempDir,
    config_path: String,
    db_path: String,
}

/// Temp config and database with one active account per platform given
async fn setup_test_env(platforms: &[SocialPlatform]) -> TestEnv {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    let db_path = dir.path().join("cmscast.db");

    let config = format!(
        r#"
[database]
path = "{}"

[defaults]
platforms = ["linkedin"]
"#,
        db_path.display().to_string().replace('\\', "/")
    );
    fs::write(&config_path, config).unwrap();

    let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
    for platform in platforms {
        let account = SocialAccount::new(*platform, &format!("Haidrun {}", platform), "token");
        db.insert_account(&account).await.unwrap();
    }

    TestEnv {
        config_path: config_path.to_str().unwrap().to_string(),
        db_path: db_path.to_str().unwrap().to_string(),
        dir,
    }
}

fn content(status: &str) -> String {
    json!({
        "id": "content-cfo",
        "title": "CFO Appointment",
        "slug": "cfo-appointment",
        "status": status,
        "content": {
            "body": "<p>We are delighted to announce a new CFO with deep financial expertise.</p>"
        }
    })
    .to_string()
}

fn publish_cmd(env: &TestEnv) -> Command {
    let mut cmd = Command::cargo_bin("cmscast-publish").unwrap();
    cmd.env("CMSCAST_CONFIG", &env.config_path);
    cmd
}

#[tokio::test]
async fn test_schedules_from_stdin() {
    let env = setup_test_env(&[SocialPlatform::LinkedIn]).await;

    publish_cmd(&env)
        .write_stdin(content("published"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("linkedin:Haidrun linkedin:"))
        .stdout(predicate::str::contains("scheduled for"));

    let db = Database::new(&env.db_path).await.unwrap();
    let posts = db.list_posts(&PostFilter::default()).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].status, PostStatus::Scheduled);
    assert_eq!(posts[0].content_id, "content-cfo");

    let mapping = db.get_mapping_for_post(&posts[0].id).await.unwrap().unwrap();
    assert_eq!(mapping.status, MappingStatus::Pending);
}

#[tokio::test]
async fn test_reads_file_and_outputs_json() {
    let env = setup_test_env(&[SocialPlatform::LinkedIn, SocialPlatform::Facebook]).await;
    let item_path = env.dir.path().join("item.json");
    fs::write(&item_path, content("published")).unwrap();

    let output = publish_cmd(&env)
        .arg(item_path.to_str().unwrap())
        .args(["--platform", "linkedin,facebook", "--format", "json"])
        .args(["--at", "2030-06-01T10:00:00Z", "--message", "Meet our new CFO."])
        .output()
        .unwrap();

    assert!(output.status.success());
    let results: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(results.len(), 2);
    for result in &results {
        assert_eq!(result["success"], true);
        assert_eq!(result["scheduled_time"], "2030-06-01T10:00:00Z");
    }

    let db = Database::new(&env.db_path).await.unwrap();
    let posts = db.list_posts(&PostFilter::default()).await.unwrap();
    assert_eq!(posts.len(), 2);
    for post in posts {
        let text = post.post_data["text"].as_str().unwrap();
        assert!(text.contains("Meet our new CFO."));
    }
}

#[tokio::test]
async fn test_unpublished_content_exits_with_invalid_input() {
    let env = setup_test_env(&[SocialPlatform::LinkedIn]).await;

    publish_cmd(&env)
        .write_stdin(content("draft"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("only published content is shared"));

    let db = Database::new(&env.db_path).await.unwrap();
    assert_eq!(db.stats().await.unwrap().total_posts, 0);
}

#[tokio::test]
async fn test_invalid_json_exits_with_invalid_input() {
    let env = setup_test_env(&[]).await;

    publish_cmd(&env)
        .write_stdin("{not json")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not valid JSON"));
}

#[tokio::test]
async fn test_custom_schedule_requires_datetime() {
    let env = setup_test_env(&[SocialPlatform::LinkedIn]).await;

    publish_cmd(&env)
        .args(["--schedule", "custom"])
        .write_stdin(content("published"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid schedule"));
}

#[tokio::test]
async fn test_unknown_platform_is_rejected() {
    let env = setup_test_env(&[SocialPlatform::LinkedIn]).await;

    publish_cmd(&env)
        .args(["--platform", "myspace"])
        .write_stdin(content("published"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Unknown platform 'myspace'"));
}

#[tokio::test]
async fn test_no_accounts_schedules_nothing() {
    let env = setup_test_env(&[]).await;

    publish_cmd(&env)
        .write_stdin(content("published"))
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_unknown_schedule_option_is_a_usage_error() {
    Command::cargo_bin("cmscast-publish")
        .unwrap()
        .args(["--schedule", "whenever"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
