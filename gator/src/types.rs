use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feed {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    /// `None` until the aggregator has picked the feed at least once.
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// A follow joined with the names it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeedFollow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub feed_id: Uuid,
    pub feed_name: String,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub feed_id: Uuid,
}

/// A normalized item ready to be stored as a [`Post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub feed_id: Uuid,
}

impl From<NewPost> for Post {
    fn from(post: NewPost) -> Self {
        Self {
            id: post.id,
            created_at: post.created_at,
            updated_at: post.updated_at,
            title: post.title,
            url: post.url,
            description: post.description,
            published_at: post.published_at,
            feed_id: post.feed_id,
        }
    }
}

/// What happened to a post handed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The feed already has a post with this URL.
    Duplicate,
}

/// Decoded RSS document. Lives for the duration of one fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RssFeed {
    #[serde(default)]
    pub channel: RssChannel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RssChannel {
    #[serde(default, deserialize_with = "first_text")]
    pub title: String,
    #[serde(default, deserialize_with = "first_text")]
    pub link: String,
    #[serde(default, deserialize_with = "first_text")]
    pub description: String,
    #[serde(rename = "item", default)]
    pub items: Vec<RssItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RssItem {
    #[serde(default, deserialize_with = "first_text")]
    pub title: String,
    #[serde(default, deserialize_with = "first_text")]
    pub link: String,
    #[serde(default, deserialize_with = "first_text")]
    pub description: String,
    #[serde(rename = "pubDate", default)]
    pub pub_date: String,
}

#[derive(Deserialize)]
struct TextElement {
    #[serde(rename = "$text", default)]
    text: String,
}

/// Namespaced siblings such as `<atom:link rel="self" href=".."/>` or
/// `<itunes:title>` land on the same field as the plain element. Every
/// occurrence is collected and the first one carrying text is kept.
fn first_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let elements = Vec::<TextElement>::deserialize(deserializer)?;
    Ok(elements
        .into_iter()
        .map(|e| e.text)
        .find(|text| !text.trim().is_empty())
        .unwrap_or_default())
}

/// An item the aggregator could not turn into a post.
#[derive(Debug, Clone)]
pub struct SkippedItem {
    pub link: String,
    pub reason: String,
}

/// Summary of one aggregation cycle over a single feed.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub feed_id: Uuid,
    pub feed_url: String,
    pub entries_found: usize,
    pub new_entries: usize,
    pub duplicates: usize,
    pub skipped: Vec<SkippedItem>,
    pub fetch_time: DateTime<Utc>,
    pub response_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "gator".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Unrecognized publish date: {value:?}")]
    DateParse { value: String },

    #[error("Item has no link")]
    MissingLink,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid interval {0:?}")]
    InvalidInterval(String),

    #[error("User not found: {name}")]
    UserNotFound { name: String },

    #[error("Feed not found: {url}")]
    FeedNotFound { url: String },

    #[error("{what} already exists")]
    AlreadyExists { what: String },

    #[error("No user is logged in, run `register` or `login` first")]
    NoCurrentUser,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Aggregator task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
