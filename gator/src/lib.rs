pub mod types;
pub mod traits;
pub mod config;
pub mod fetcher;
pub mod parser;
pub mod normalizer;
pub mod feed_manager;
pub mod memory_store;
pub mod aggregator;
pub mod commands;
pub mod utils;

pub use types::*;
pub use traits::{FeedStore, FetchFeed, SubscriptionStore, Ticker};
pub use config::Config;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use feed_manager::FeedManager;
pub use memory_store::MemoryStore;
pub use aggregator::{spawn_aggregator, spawn_with_ticker, AggregatorHandle, RssAggregator};
pub use commands::{Cli, Command, State};
