//! Database operations for Cmscast

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::store::{AccountStore, PostStore, PostTransition};
use crate::types::{
    ContentSocialMapping, MappingStatus, PostFilter, PostStats, PostStatus, SocialAccount,
    SocialPlatform, SocialPost,
};

const POST_COLUMNS: &str = "id, content_id, platform, account_id, status, scheduled_time, \
     published_time, post_data, platform_post_id, retry_count, max_retries, error_message, \
     analytics_data, created_at, updated_at";

const ACCOUNT_COLUMNS: &str =
    "id, platform, account_name, access_token, refresh_token, is_active, account_data";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // mode=rwc creates the file on first use
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        Self::migrate(pool).await
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn in_memory() -> Result<Self> {
        // Every SQLite memory connection is its own database, so pin the pool to one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(DbError::SqlxError)?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Store a connected account
    pub async fn insert_account(&self, account: &SocialAccount) -> Result<()> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO social_accounts
                (id, platform, account_name, access_token, refresh_token, is_active, account_data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(account.platform.as_str())
        .bind(&account.account_name)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(i64::from(account.is_active))
        .bind(to_json(&account.account_data)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Mark an account inactive. Returns `false` if it does not exist.
    pub async fn deactivate_account(&self, account_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE social_accounts SET is_active = 0, updated_at = ? WHERE id = ?
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace an account's tokens after a new OAuth grant
    pub async fn update_account_token(
        &self,
        account_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE social_accounts
            SET access_token = ?, refresh_token = COALESCE(?, refresh_token), is_active = 1, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(Utc::now().timestamp())
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// All accounts, active or not, optionally for one platform
    pub async fn list_accounts(&self, platform: Option<SocialPlatform>) -> Result<Vec<SocialAccount>> {
        let rows = match platform {
            Some(platform) => {
                sqlx::query(&format!(
                    "SELECT {} FROM social_accounts WHERE platform = ? ORDER BY account_name",
                    ACCOUNT_COLUMNS
                ))
                .bind(platform.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM social_accounts ORDER BY platform, account_name",
                    ACCOUNT_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_account).collect()
    }
}

#[async_trait]
impl PostStore for Database {
    async fn insert_post(&self, post: &SocialPost) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO social_posts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            POST_COLUMNS
        ))
        .bind(&post.id)
        .bind(&post.content_id)
        .bind(post.platform.as_str())
        .bind(&post.account_id)
        .bind(post.status.as_str())
        .bind(post.scheduled_time.timestamp())
        .bind(post.published_time.map(|t| t.timestamp()))
        .bind(to_json(&post.post_data)?)
        .bind(&post.platform_post_id)
        .bind(i64::from(post.retry_count))
        .bind(i64::from(post.max_retries))
        .bind(&post.error_message)
        .bind(to_json(&post.analytics_data)?)
        .bind(post.created_at.timestamp())
        .bind(post.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn insert_mapping(&self, mapping: &ContentSocialMapping) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO content_social_mappings
                (id, content_item_id, social_post_id, platform, auto_publish, publish_immediately,
                 custom_message, hashtags, status, published_at, error_message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&mapping.id)
        .bind(&mapping.content_item_id)
        .bind(&mapping.social_post_id)
        .bind(mapping.platform.as_str())
        .bind(i64::from(mapping.auto_publish))
        .bind(i64::from(mapping.publish_immediately))
        .bind(&mapping.custom_message)
        .bind(to_json(&mapping.hashtags)?)
        .bind(mapping.status.as_str())
        .bind(mapping.published_at.map(|t| t.timestamp()))
        .bind(&mapping.error_message)
        .bind(mapping.created_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn delete_post(&self, post_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query("DELETE FROM content_social_mappings WHERE social_post_id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::query("DELETE FROM social_posts WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    async fn get_post(&self, post_id: &str) -> Result<Option<SocialPost>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM social_posts WHERE id = ?",
            POST_COLUMNS
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_post).transpose()
    }

    async fn get_mapping_for_post(&self, post_id: &str) -> Result<Option<ContentSocialMapping>> {
        let row = sqlx::query(
            r#"
            SELECT id, content_item_id, social_post_id, platform, auto_publish, publish_immediately,
                   custom_message, hashtags, status, published_at, error_message, created_at
            FROM content_social_mappings WHERE social_post_id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_mapping).transpose()
    }

    async fn due_posts(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<SocialPost>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM social_posts \
             WHERE status = 'scheduled' AND scheduled_time <= ? \
             ORDER BY scheduled_time ASC, created_at ASC LIMIT ?",
            POST_COLUMNS
        ))
        .bind(now.timestamp())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_post).collect()
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<SocialPost>> {
        let mut where_clauses = vec!["1=1"];
        if filter.status.is_some() {
            where_clauses.push("status = ?");
        }
        if filter.platform.is_some() {
            where_clauses.push("platform = ?");
        }
        if filter.content_id.is_some() {
            where_clauses.push("content_id = ?");
        }

        let query_str = format!(
            "SELECT {} FROM social_posts WHERE {} ORDER BY scheduled_time ASC LIMIT ?",
            POST_COLUMNS,
            where_clauses.join(" AND ")
        );

        let mut query = sqlx::query(&query_str);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(platform) = filter.platform {
            query = query.bind(platform.as_str());
        }
        if let Some(content_id) = &filter.content_id {
            query = query.bind(content_id);
        }
        query = query.bind(i64::from(filter.limit));

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_post).collect()
    }

    async fn apply_transition(&self, post_id: &str, transition: &PostTransition) -> Result<bool> {
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        // Every statement is guarded on status so a concurrent terminal write wins
        let post_update = match transition {
            PostTransition::Published {
                platform_post_id,
                at,
            } => sqlx::query(
                r#"
                UPDATE social_posts
                SET status = 'published', published_time = ?, platform_post_id = ?,
                    error_message = NULL, updated_at = ?
                WHERE id = ? AND status = 'scheduled'
                "#,
            )
            .bind(at.timestamp())
            .bind(platform_post_id)
            .bind(now)
            .bind(post_id),
            PostTransition::RetryScheduled {
                retry_count,
                at,
                error,
            } => sqlx::query(
                r#"
                UPDATE social_posts
                SET retry_count = ?, scheduled_time = ?, error_message = ?, updated_at = ?
                WHERE id = ? AND status = 'scheduled'
                "#,
            )
            .bind(i64::from(*retry_count))
            .bind(at.timestamp())
            .bind(error)
            .bind(now)
            .bind(post_id),
            PostTransition::Failed { error } => sqlx::query(
                r#"
                UPDATE social_posts
                SET status = 'failed', error_message = ?, updated_at = ?
                WHERE id = ? AND status = 'scheduled'
                "#,
            )
            .bind(error)
            .bind(now)
            .bind(post_id),
            PostTransition::Cancelled => sqlx::query(
                r#"
                UPDATE social_posts
                SET status = 'cancelled', updated_at = ?
                WHERE id = ? AND status = 'scheduled'
                "#,
            )
            .bind(now)
            .bind(post_id),
            PostTransition::Rescheduled { at } => sqlx::query(
                r#"
                UPDATE social_posts
                SET scheduled_time = ?, updated_at = ?
                WHERE id = ? AND status = 'scheduled'
                "#,
            )
            .bind(at.timestamp())
            .bind(now)
            .bind(post_id),
        };

        let applied = post_update
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?
            .rows_affected()
            > 0;

        if !applied {
            tx.rollback().await.map_err(DbError::SqlxError)?;
            return Ok(false);
        }

        let mapping_update = match transition {
            PostTransition::Published { at, .. } => Some(
                sqlx::query(
                    r#"
                    UPDATE content_social_mappings
                    SET status = 'published', published_at = ?, error_message = NULL
                    WHERE social_post_id = ?
                    "#,
                )
                .bind(at.timestamp())
                .bind(post_id),
            ),
            PostTransition::RetryScheduled { error, .. } => Some(
                sqlx::query(
                    "UPDATE content_social_mappings SET error_message = ? WHERE social_post_id = ?",
                )
                .bind(error)
                .bind(post_id),
            ),
            PostTransition::Failed { error } => Some(
                sqlx::query(
                    r#"
                    UPDATE content_social_mappings
                    SET status = 'failed', error_message = ?
                    WHERE social_post_id = ?
                    "#,
                )
                .bind(error)
                .bind(post_id),
            ),
            PostTransition::Cancelled => Some(
                sqlx::query(
                    "UPDATE content_social_mappings SET status = 'skipped' WHERE social_post_id = ?",
                )
                .bind(post_id),
            ),
            PostTransition::Rescheduled { .. } => None,
        };

        if let Some(update) = mapping_update {
            update
                .execute(&mut *tx)
                .await
                .map_err(DbError::SqlxError)?;
        }

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(true)
    }

    async fn stats(&self) -> Result<PostStats> {
        let status_rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS count FROM social_posts GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let mut stats = PostStats::default();
        for row in &status_rows {
            let count: i64 = row.get("count");
            stats.total_posts += count;
            match parse_column::<PostStatus>(row, "status")? {
                PostStatus::Scheduled => stats.scheduled_posts = count,
                PostStatus::Published => stats.published_posts = count,
                PostStatus::Failed => stats.failed_posts = count,
                PostStatus::Cancelled => stats.cancelled_posts = count,
            }
        }

        let platform_rows = sqlx::query(
            r#"
            SELECT platform, COUNT(*) AS count FROM social_posts GROUP BY platform
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        for row in &platform_rows {
            stats
                .platforms
                .insert(row.get::<String, _>("platform"), row.get::<i64, _>("count"));
        }

        Ok(stats)
    }
}

#[async_trait]
impl AccountStore for Database {
    async fn active_accounts(&self, platform: SocialPlatform) -> Result<Vec<SocialAccount>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM social_accounts WHERE platform = ? AND is_active = 1 ORDER BY created_at",
            ACCOUNT_COLUMNS
        ))
        .bind(platform.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_account).collect()
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<SocialAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM social_accounts WHERE id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_account).transpose()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| DbError::Corrupt(format!("could not encode JSON column: {}", e)).into())
}

fn json_column<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.get(column);
    serde_json::from_str(&raw)
        .map_err(|e| DbError::Corrupt(format!("{} is not valid JSON: {}", column, e)).into())
}

fn parse_column<T: std::str::FromStr>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.get(column);
    raw.parse()
        .map_err(|_| DbError::Corrupt(format!("unexpected {} value '{}'", column, raw)).into())
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| DbError::Corrupt(format!("timestamp {} out of range", secs)).into())
}

fn count_column(row: &SqliteRow, column: &str) -> Result<u32> {
    let raw: i64 = row.get(column);
    u32::try_from(raw).map_err(|_| DbError::Corrupt(format!("{} is negative: {}", column, raw)).into())
}

fn row_to_post(r: &SqliteRow) -> Result<SocialPost> {
    Ok(SocialPost {
        id: r.get("id"),
        content_id: r.get("content_id"),
        platform: parse_column(r, "platform")?,
        account_id: r.get("account_id"),
        status: parse_column(r, "status")?,
        scheduled_time: timestamp(r.get("scheduled_time"))?,
        published_time: r
            .get::<Option<i64>, _>("published_time")
            .map(timestamp)
            .transpose()?,
        post_data: json_column(r, "post_data")?,
        platform_post_id: r.get("platform_post_id"),
        retry_count: count_column(r, "retry_count")?,
        max_retries: count_column(r, "max_retries")?,
        error_message: r.get("error_message"),
        analytics_data: json_column(r, "analytics_data")?,
        created_at: timestamp(r.get("created_at"))?,
        updated_at: timestamp(r.get("updated_at"))?,
    })
}

fn row_to_mapping(r: &SqliteRow) -> Result<ContentSocialMapping> {
    Ok(ContentSocialMapping {
        id: r.get("id"),
        content_item_id: r.get("content_item_id"),
        social_post_id: r.get("social_post_id"),
        platform: parse_column(r, "platform")?,
        auto_publish: r.get::<i64, _>("auto_publish") != 0,
        publish_immediately: r.get::<i64, _>("publish_immediately") != 0,
        custom_message: r.get("custom_message"),
        hashtags: json_column(r, "hashtags")?,
        status: parse_column::<MappingStatus>(r, "status")?,
        published_at: r
            .get::<Option<i64>, _>("published_at")
            .map(timestamp)
            .transpose()?,
        error_message: r.get("error_message"),
        created_at: timestamp(r.get("created_at"))?,
    })
}

fn row_to_account(r: &SqliteRow) -> Result<SocialAccount> {
    Ok(SocialAccount {
        id: r.get("id"),
        platform: parse_column(r, "platform")?,
        account_name: r.get("account_name"),
        access_token: r.get("access_token"),
        refresh_token: r.get("refresh_token"),
        is_active: r.get::<i64, _>("is_active") != 0,
        account_data: json_column(r, "account_data")?,
    })
}
