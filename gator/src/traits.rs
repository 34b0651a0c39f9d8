use crate::types::{Feed, FeedFollow, InsertOutcome, NewPost, Post, Result, RssFeed, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Storage operations the aggregation loop depends on.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// The feed that has gone longest without a fetch. Never-fetched feeds
    /// come first. `None` when no feeds are registered.
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>>;

    async fn mark_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Stores the post unless the feed already has one with the same URL.
    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome>;
}

/// Users, feeds and follows, as used by the command handlers.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn create_user(&self, name: &str) -> Result<User>;

    async fn get_user(&self, name: &str) -> Result<User>;

    async fn list_users(&self) -> Result<Vec<User>>;

    /// Removes every user together with their feeds, follows and posts.
    async fn delete_users(&self) -> Result<()>;

    async fn add_feed(&self, name: &str, url: &str, user_id: Uuid) -> Result<Feed>;

    async fn get_feed_by_url(&self, url: &str) -> Result<Feed>;

    /// Feeds paired with the name of the user who added them.
    async fn list_feeds(&self) -> Result<Vec<(Feed, String)>>;

    async fn create_feed_follow(&self, user_id: Uuid, feed_id: Uuid) -> Result<FeedFollow>;

    async fn feed_follows_for_user(&self, user_id: Uuid) -> Result<Vec<FeedFollow>>;

    async fn delete_feed_follow(&self, user_id: Uuid, url: &str) -> Result<()>;

    /// Newest posts first, by publish date.
    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>>;
}

/// Retrieves and decodes a feed document.
#[async_trait]
pub trait FetchFeed: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RssFeed>;
}

#[async_trait]
impl<T: FetchFeed + ?Sized> FetchFeed for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<RssFeed> {
        (**self).fetch(url).await
    }
}

/// Source of scheduler ticks.
pub trait Ticker: Send {
    fn tick(&mut self) -> impl Future<Output = ()> + Send;
}

impl Ticker for tokio::time::Interval {
    async fn tick(&mut self) {
        tokio::time::Interval::tick(self).await;
    }
}
