#![allow(dead_code)]

use async_trait::async_trait;
use gator::{
    AggregatorError, Config, Feed, FeedParser, FetchFeed, MemoryStore, Result, RssFeed,
    SubscriptionStore,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::mpsc;

pub const SAMPLE_FEED: &str = include_str!("../fixtures/sample_feed.xml");
pub const MIXED_DATES_FEED: &str = include_str!("../fixtures/mixed_dates_feed.xml");
pub const BLOG_FEED: &str = include_str!("../fixtures/blog_feed.xml");

/// Serves canned documents by URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct StubFetcher {
    documents: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
    notify: Option<mpsc::UnboundedSender<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &str, xml: &str) -> Self {
        self.documents.insert(url.to_string(), xml.to_string());
        self
    }

    /// Reports every requested URL on the returned channel.
    pub fn notifying(mut self) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.notify = Some(tx);
        (self, rx)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FetchFeed for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<RssFeed> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(tx) = &self.notify {
            let _ = tx.send(url.to_string());
        }
        match self.documents.get(url) {
            Some(xml) => FeedParser::parse_feed(xml),
            None => Err(AggregatorError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Never answers.
pub struct HangingFetcher;

#[async_trait]
impl FetchFeed for HangingFetcher {
    async fn fetch(&self, _url: &str) -> Result<RssFeed> {
        std::future::pending().await
    }
}

/// Panics inside the aggregation task.
pub struct PanickingFetcher;

#[async_trait]
impl FetchFeed for PanickingFetcher {
    async fn fetch(&self, url: &str) -> Result<RssFeed> {
        panic!("decoder crashed on {}", url);
    }
}

/// A store holding one user who owns a feed for each of `urls`.
pub async fn store_with_feeds(urls: &[&str]) -> (MemoryStore, Vec<Feed>) {
    let store = MemoryStore::new();
    let user = store.create_user("owner").await.unwrap();
    let mut feeds = Vec::new();
    for (i, url) in urls.iter().enumerate() {
        let feed = store
            .add_feed(&format!("feed-{}", i), url, user.id)
            .await
            .unwrap();
        feeds.push(feed);
    }
    (store, feeds)
}

pub fn write_config(dir: &Path, current_user: &str) -> Config {
    let path = dir.join(".gatorconfig.json");
    let json = serde_json::json!({
        "db_url": "postgres://localhost/gator_test",
        "current_user_name": current_user,
    });
    std::fs::write(&path, json.to_string()).unwrap();
    Config::read_from(&path).unwrap()
}
