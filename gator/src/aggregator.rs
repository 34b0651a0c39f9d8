use crate::normalizer;
use crate::traits::{FeedStore, FetchFeed, Ticker};
use crate::types::{FetchResult, InsertOutcome, Result, SkippedItem};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Messages accepted by a running aggregation loop.
pub enum AggregatorMessage {
    Shutdown,
}

/// Handle for stopping a spawned aggregation loop.
#[derive(Clone)]
pub struct AggregatorHandle {
    sender: mpsc::Sender<AggregatorMessage>,
}

impl AggregatorHandle {
    /// Stops the loop, aborting the in-flight cycle if there is one.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(AggregatorMessage::Shutdown).await;
    }
}

/// Fetches one feed per tick and stores its new posts.
pub struct RssAggregator<S, F> {
    store: Arc<S>,
    fetcher: F,
}

impl<S, F> RssAggregator<S, F>
where
    S: FeedStore + 'static,
    F: FetchFeed + 'static,
{
    pub fn new(store: Arc<S>, fetcher: F) -> Self {
        Self { store, fetcher }
    }

    /// Runs one cycle: picks the least recently fetched feed, marks it
    /// fetched, downloads it and inserts every item not already stored.
    ///
    /// Items that fail to normalize are reported in
    /// [`FetchResult::skipped`]; store, network and decode failures abort
    /// the cycle. Returns `None` when there are no feeds.
    pub async fn scrape_next_feed(&self) -> Result<Option<FetchResult>> {
        let Some(feed) = self.store.next_feed_to_fetch().await? else {
            debug!("No feeds to fetch");
            return Ok(None);
        };

        let fetch_time = Utc::now();
        // Marked before the request so a slow or failing feed does not
        // keep its place at the front of the queue.
        self.store.mark_fetched(feed.id, fetch_time).await?;

        info!("Fetching RSS feed from {}", feed.url);
        let start_time = Instant::now();
        let document = self.fetcher.fetch(&feed.url).await?;
        let response_time_ms = start_time.elapsed().as_millis() as u64;

        let mut result = FetchResult {
            feed_id: feed.id,
            feed_url: feed.url.clone(),
            entries_found: document.channel.items.len(),
            new_entries: 0,
            duplicates: 0,
            skipped: Vec::new(),
            fetch_time,
            response_time_ms,
        };

        for item in &document.channel.items {
            let post = match normalizer::normalize(item, feed.id) {
                Ok(post) => post,
                Err(e) => {
                    warn!("Skipping item {:?} from {}: {}", item.link, feed.url, e);
                    result.skipped.push(SkippedItem {
                        link: item.link.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match self.store.insert_post(&post).await? {
                InsertOutcome::Inserted => result.new_entries += 1,
                InsertOutcome::Duplicate => {
                    debug!("Already stored: {}", post.url);
                    result.duplicates += 1;
                }
            }
        }

        info!(
            "Feed {}: found {} entries, stored {} new, {} duplicates, {} skipped",
            feed.url,
            result.entries_found,
            result.new_entries,
            result.duplicates,
            result.skipped.len()
        );
        Ok(Some(result))
    }

    /// Runs a cycle on every tick until a shutdown message arrives or every
    /// handle is dropped. A failed cycle is logged and the loop carries on.
    pub async fn run<T: Ticker>(
        self,
        mut ticker: T,
        mut receiver: mpsc::Receiver<AggregatorMessage>,
    ) {
        info!("Aggregator started");

        loop {
            tokio::select! {
                biased;
                msg = receiver.recv() => match msg {
                    Some(AggregatorMessage::Shutdown) | None => break,
                },
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                msg = receiver.recv() => match msg {
                    Some(AggregatorMessage::Shutdown) | None => {
                        warn!("Shutdown requested, abandoning the current fetch");
                        break;
                    }
                },
                outcome = self.scrape_next_feed() => {
                    if let Err(e) = outcome {
                        error!("Aggregation cycle failed: {}", e);
                    }
                }
            }
        }

        info!("Aggregator stopped");
    }
}

/// Spawns the loop with a production ticker: the first cycle runs right
/// away, then one per `interval`, skipping ticks missed while busy.
pub fn spawn_aggregator<S, F>(
    aggregator: RssAggregator<S, F>,
    interval: Duration,
) -> (AggregatorHandle, JoinHandle<()>)
where
    S: FeedStore + 'static,
    F: FetchFeed + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    spawn_with_ticker(aggregator, ticker)
}

pub fn spawn_with_ticker<S, F, T>(
    aggregator: RssAggregator<S, F>,
    ticker: T,
) -> (AggregatorHandle, JoinHandle<()>)
where
    S: FeedStore + 'static,
    F: FetchFeed + 'static,
    T: Ticker + 'static,
{
    let (sender, receiver) = mpsc::channel(8);
    let task = tokio::spawn(aggregator.run(ticker, receiver));
    (AggregatorHandle { sender }, task)
}
