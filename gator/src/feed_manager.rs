use crate::traits::{FeedStore, SubscriptionStore};
use crate::types::{
    AggregatorError, Feed, FeedFollow, InsertOutcome, NewPost, Post, Result, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use tracing::{debug, info};
use uuid::Uuid;

/// PostgreSQL-backed store.
pub struct FeedManager {
    db: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct FeedWithOwner {
    #[sqlx(flatten)]
    feed: Feed,
    user_name: String,
}

impl FeedManager {
    pub async fn new(database_url: &str) -> Result<Self> {
        let db = PgPool::connect(database_url).await?;
        Ok(Self { db })
    }

    /// Applies the migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.db).await?;
        debug!("Database schema is up to date");
        Ok(())
    }
}

/// Maps a unique-constraint violation to `AlreadyExists`.
fn conflict(err: sqlx::Error, what: impl Into<String>) -> AggregatorError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AggregatorError::AlreadyExists { what: what.into() }
        }
        _ => AggregatorError::Database(err),
    }
}

/// `LIMIT` bound for a row count, saturating at the largest BIGINT.
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl FeedStore for FeedManager {
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>(
            "SELECT * FROM feeds ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC LIMIT 1",
        )
        .fetch_optional(&self.db)
        .await?;

        Ok(feed)
    }

    async fn mark_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE feeds SET last_fetched_at = $1, updated_at = $1 WHERE id = $2")
            .bind(at)
            .bind(feed_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (feed_id, url) DO NOTHING
            "#,
        )
        .bind(post.id)
        .bind(post.created_at)
        .bind(post.updated_at)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(post.feed_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() > 0 {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::Duplicate)
        }
    }
}

#[async_trait]
impl SubscriptionStore for FeedManager {
    async fn create_user(&self, name: &str) -> Result<User> {
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, created_at, updated_at, name)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(name)
        .fetch_one(&self.db)
        .await
        .map_err(|e| conflict(e, format!("user {}", name)))?;

        info!("Created user {} ({})", user.name, user.id);
        Ok(user)
    }

    async fn get_user(&self, name: &str) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AggregatorError::UserNotFound {
                name: name.to_string(),
            })
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at")
            .fetch_all(&self.db)
            .await?;

        Ok(users)
    }

    async fn delete_users(&self) -> Result<()> {
        let result = sqlx::query("DELETE FROM users").execute(&self.db).await?;
        info!("Deleted {} users", result.rows_affected());
        Ok(())
    }

    async fn add_feed(&self, name: &str, url: &str, user_id: Uuid) -> Result<Feed> {
        let now = Utc::now();

        let feed = sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(name)
        .bind(url)
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| conflict(e, format!("feed {}", url)))?;

        info!("Added new feed: {} with ID: {}", feed.url, feed.id);
        Ok(feed)
    }

    async fn get_feed_by_url(&self, url: &str) -> Result<Feed> {
        sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AggregatorError::FeedNotFound {
                url: url.to_string(),
            })
    }

    async fn list_feeds(&self) -> Result<Vec<(Feed, String)>> {
        let rows = sqlx::query_as::<_, FeedWithOwner>(
            r#"
            SELECT feeds.*, users.name AS user_name
            FROM feeds
            JOIN users ON users.id = feeds.user_id
            ORDER BY feeds.created_at
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|row| (row.feed, row.user_name)).collect())
    }

    async fn create_feed_follow(&self, user_id: Uuid, feed_id: Uuid) -> Result<FeedFollow> {
        let now = Utc::now();

        let follow = sqlx::query_as::<_, FeedFollow>(
            r#"
            WITH inserted AS (
                INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT inserted.*, feeds.name AS feed_name, users.name AS user_name
            FROM inserted
            JOIN feeds ON feeds.id = inserted.feed_id
            JOIN users ON users.id = inserted.user_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(feed_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| conflict(e, "feed follow"))?;

        Ok(follow)
    }

    async fn feed_follows_for_user(&self, user_id: Uuid) -> Result<Vec<FeedFollow>> {
        let follows = sqlx::query_as::<_, FeedFollow>(
            r#"
            SELECT feed_follows.*, feeds.name AS feed_name, users.name AS user_name
            FROM feed_follows
            JOIN feeds ON feeds.id = feed_follows.feed_id
            JOIN users ON users.id = feed_follows.user_id
            WHERE feed_follows.user_id = $1
            ORDER BY feed_follows.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(follows)
    }

    async fn delete_feed_follow(&self, user_id: Uuid, url: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM feed_follows
            USING feeds
            WHERE feed_follows.feed_id = feeds.id
              AND feed_follows.user_id = $1
              AND feeds.url = $2
            "#,
        )
        .bind(user_id)
        .bind(url)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AggregatorError::FeedNotFound {
                url: url.to_string(),
            });
        }
        Ok(())
    }

    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            "SELECT * FROM posts ORDER BY published_at DESC LIMIT $1",
        )
        .bind(sql_limit(limit))
        .fetch_all(&self.db)
        .await?;

        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_saturates_instead_of_wrapping() {
        assert_eq!(sql_limit(2), 2);
        assert_eq!(sql_limit(i64::MAX as usize), i64::MAX);
        assert_eq!(sql_limit(usize::MAX), i64::MAX);
    }
}
