use crate::parser::FeedParser;
use crate::traits::FetchFeed;
use crate::types::{AggregatorError, FetchConfig, Result, RssFeed};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Single GET of `url`, returning the body of a 2xx response.
    pub async fn fetch_body(&self, url: &str) -> Result<String> {
        let url = Url::parse(url)?;
        let start_time = Instant::now();

        debug!("Fetching feed: {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(AggregatorError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content = response.text().await?;
        info!(
            "Fetched feed: {} ({} bytes in {}ms)",
            url,
            content.len(),
            start_time.elapsed().as_millis()
        );
        Ok(content)
    }
}

#[async_trait]
impl FetchFeed for Fetcher {
    async fn fetch(&self, url: &str) -> Result<RssFeed> {
        let content = self.fetch_body(url).await?;
        FeedParser::parse_feed(&content)
    }
}
