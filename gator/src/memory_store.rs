use crate::traits::{FeedStore, SubscriptionStore};
use crate::types::{
    AggregatorError, Feed, FeedFollow, InsertOutcome, NewPost, Post, Result, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    feeds: Vec<Feed>,
    follows: Vec<(Uuid, DateTime<Utc>, Uuid, Uuid)>,
    posts: Vec<Post>,
}

/// Store that keeps everything in process memory, with the same uniqueness
/// rules as the PostgreSQL schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn post_count(&self, feed_id: Uuid) -> usize {
        let tables = self.tables.read().await;
        tables.posts.iter().filter(|p| p.feed_id == feed_id).count()
    }

    pub async fn posts_for_feed(&self, feed_id: Uuid) -> Vec<Post> {
        let tables = self.tables.read().await;
        tables
            .posts
            .iter()
            .filter(|p| p.feed_id == feed_id)
            .cloned()
            .collect()
    }

    pub async fn get_feed(&self, feed_id: Uuid) -> Option<Feed> {
        let tables = self.tables.read().await;
        tables.feeds.iter().find(|f| f.id == feed_id).cloned()
    }
}

impl Tables {
    fn follow_view(
        &self,
        id: Uuid,
        created_at: DateTime<Utc>,
        user_id: Uuid,
        feed_id: Uuid,
    ) -> Option<FeedFollow> {
        let user = self.users.iter().find(|u| u.id == user_id)?;
        let feed = self.feeds.iter().find(|f| f.id == feed_id)?;
        Some(FeedFollow {
            id,
            created_at,
            updated_at: created_at,
            user_id,
            feed_id,
            feed_name: feed.name.clone(),
            user_name: user.name.clone(),
        })
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>> {
        let tables = self.tables.read().await;
        // `None` orders before any `Some`, so never-fetched feeds win.
        let feed = tables
            .feeds
            .iter()
            .min_by_key(|f| (f.last_fetched_at, f.created_at))
            .cloned();
        Ok(feed)
    }

    async fn mark_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(feed) = tables.feeds.iter_mut().find(|f| f.id == feed_id) {
            feed.last_fetched_at = Some(at);
            feed.updated_at = at;
        }
        Ok(())
    }

    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome> {
        let mut tables = self.tables.write().await;
        if tables
            .posts
            .iter()
            .any(|p| p.feed_id == post.feed_id && p.url == post.url)
        {
            return Ok(InsertOutcome::Duplicate);
        }
        tables.posts.push(post.clone().into());
        Ok(InsertOutcome::Inserted)
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn create_user(&self, name: &str) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.name == name) {
            return Err(AggregatorError::AlreadyExists {
                what: format!("user {}", name),
            });
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            name: name.to_string(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, name: &str) -> Result<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .iter()
            .find(|u| u.name == name)
            .cloned()
            .ok_or_else(|| AggregatorError::UserNotFound {
                name: name.to_string(),
            })
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.tables.read().await.users.clone())
    }

    async fn delete_users(&self) -> Result<()> {
        *self.tables.write().await = Tables::default();
        Ok(())
    }

    async fn add_feed(&self, name: &str, url: &str, user_id: Uuid) -> Result<Feed> {
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == user_id) {
            return Err(AggregatorError::UserNotFound {
                name: user_id.to_string(),
            });
        }
        if tables.feeds.iter().any(|f| f.url == url) {
            return Err(AggregatorError::AlreadyExists {
                what: format!("feed {}", url),
            });
        }
        let now = Utc::now();
        let feed = Feed {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            name: name.to_string(),
            url: url.to_string(),
            user_id,
            last_fetched_at: None,
        };
        tables.feeds.push(feed.clone());
        Ok(feed)
    }

    async fn get_feed_by_url(&self, url: &str) -> Result<Feed> {
        let tables = self.tables.read().await;
        tables
            .feeds
            .iter()
            .find(|f| f.url == url)
            .cloned()
            .ok_or_else(|| AggregatorError::FeedNotFound {
                url: url.to_string(),
            })
    }

    async fn list_feeds(&self) -> Result<Vec<(Feed, String)>> {
        let tables = self.tables.read().await;
        let feeds = tables
            .feeds
            .iter()
            .filter_map(|feed| {
                let owner = tables.users.iter().find(|u| u.id == feed.user_id)?;
                Some((feed.clone(), owner.name.clone()))
            })
            .collect();
        Ok(feeds)
    }

    async fn create_feed_follow(&self, user_id: Uuid, feed_id: Uuid) -> Result<FeedFollow> {
        let mut tables = self.tables.write().await;
        if tables
            .follows
            .iter()
            .any(|(_, _, u, f)| *u == user_id && *f == feed_id)
        {
            return Err(AggregatorError::AlreadyExists {
                what: "feed follow".to_string(),
            });
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let view = tables
            .follow_view(id, now, user_id, feed_id)
            .ok_or_else(|| AggregatorError::FeedNotFound {
                url: feed_id.to_string(),
            })?;
        tables.follows.push((id, now, user_id, feed_id));
        Ok(view)
    }

    async fn feed_follows_for_user(&self, user_id: Uuid) -> Result<Vec<FeedFollow>> {
        let tables = self.tables.read().await;
        let follows = tables
            .follows
            .iter()
            .filter(|(_, _, u, _)| *u == user_id)
            .filter_map(|(id, created_at, u, f)| tables.follow_view(*id, *created_at, *u, *f))
            .collect();
        Ok(follows)
    }

    async fn delete_feed_follow(&self, user_id: Uuid, url: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let feed_id = tables
            .feeds
            .iter()
            .find(|f| f.url == url)
            .map(|f| f.id)
            .ok_or_else(|| AggregatorError::FeedNotFound {
                url: url.to_string(),
            })?;

        let before = tables.follows.len();
        tables
            .follows
            .retain(|(_, _, u, f)| !(*u == user_id && *f == feed_id));
        if tables.follows.len() == before {
            return Err(AggregatorError::FeedNotFound {
                url: url.to_string(),
            });
        }
        Ok(())
    }

    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;
        let mut posts = tables.posts.clone();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        posts.truncate(limit);
        Ok(posts)
    }
}
