use crate::aggregator::{spawn_aggregator, RssAggregator};
use crate::config::Config;
use crate::traits::{FeedStore, FetchFeed, SubscriptionStore};
use crate::types::{AggregatorError, Result, User};
use crate::utils::time::{format_duration, parse_interval};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_BROWSE_LIMIT: usize = 2;

#[derive(Parser, Debug)]
#[command(name = "gator", about = "Aggregate RSS feeds into a local database")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Switch the current user
    Login { name: String },
    /// Create a user and make it current
    Register { name: String },
    /// Delete every user, feed, follow and post
    Reset,
    /// List users
    Users,
    /// Fetch feeds continuously, one per interval (e.g. 30s, 1m, 1h30m)
    Agg { time_between_reqs: String },
    /// Add a feed and follow it
    Addfeed { name: String, url: String },
    /// List all feeds
    Feeds,
    /// Follow an existing feed
    Follow { url: String },
    /// List feeds followed by the current user
    Following,
    /// Stop following a feed
    Unfollow { url: String },
    /// Show the newest posts
    Browse { limit: Option<usize> },
    /// Fetch a feed once and print its items
    Fetch { url: String },
}

/// Everything a command handler may touch.
pub struct State<S, F> {
    pub store: Arc<S>,
    pub fetcher: Arc<F>,
    pub config: Config,
}

impl<S, F> State<S, F>
where
    S: FeedStore + SubscriptionStore + 'static,
    F: FetchFeed + 'static,
{
    pub fn new(store: Arc<S>, fetcher: Arc<F>, config: Config) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    /// Runs `command`, writing user-facing output to `out`. `agg` runs
    /// until `shutdown` resolves.
    pub async fn dispatch<W, Sd>(
        &mut self,
        command: Command,
        out: &mut W,
        shutdown: Sd,
    ) -> Result<()>
    where
        W: Write,
        Sd: Future<Output = ()>,
    {
        match command {
            Command::Login { name } => self.login(&name, out).await,
            Command::Register { name } => self.register(&name, out).await,
            Command::Reset => self.reset(out).await,
            Command::Users => self.users(out).await,
            Command::Agg { time_between_reqs } => {
                self.agg(&time_between_reqs, out, shutdown).await
            }
            Command::Addfeed { name, url } => self.add_feed(&name, &url, out).await,
            Command::Feeds => self.feeds(out).await,
            Command::Follow { url } => self.follow(&url, out).await,
            Command::Following => self.following(out).await,
            Command::Unfollow { url } => self.unfollow(&url, out).await,
            Command::Browse { limit } => {
                self.browse(limit.unwrap_or(DEFAULT_BROWSE_LIMIT), out).await
            }
            Command::Fetch { url } => self.fetch(&url, out).await,
        }
    }

    /// The user named in the config, which must exist in the store.
    pub async fn current_user(&self) -> Result<User> {
        if self.config.current_user_name.is_empty() {
            return Err(AggregatorError::NoCurrentUser);
        }
        self.store.get_user(&self.config.current_user_name).await
    }

    async fn login(&mut self, name: &str, out: &mut impl Write) -> Result<()> {
        let user = self.store.get_user(name).await?;
        self.config.set_user(&user.name)?;
        writeln!(out, "Logged in as {}", user.name)?;
        Ok(())
    }

    async fn register(&mut self, name: &str, out: &mut impl Write) -> Result<()> {
        let user = self.store.create_user(name).await?;
        self.config.set_user(&user.name)?;
        writeln!(out, "User has been created")?;
        writeln!(out, "{} ({})", user.name, user.id)?;
        Ok(())
    }

    async fn reset(&mut self, out: &mut impl Write) -> Result<()> {
        self.store.delete_users().await?;
        writeln!(out, "Database reset successful")?;
        Ok(())
    }

    async fn users(&mut self, out: &mut impl Write) -> Result<()> {
        for user in self.store.list_users().await? {
            if user.name == self.config.current_user_name {
                writeln!(out, "* {} (current)", user.name)?;
            } else {
                writeln!(out, "* {}", user.name)?;
            }
        }
        Ok(())
    }

    async fn agg<Sd>(
        &mut self,
        time_between_reqs: &str,
        out: &mut impl Write,
        shutdown: Sd,
    ) -> Result<()>
    where
        Sd: Future<Output = ()>,
    {
        let interval = parse_interval(time_between_reqs)?;
        writeln!(out, "Collecting feeds every {}", format_duration(interval))?;
        out.flush()?;

        let aggregator = RssAggregator::new(self.store.clone(), self.fetcher.clone());
        let (handle, task) = spawn_aggregator(aggregator, interval);

        shutdown.await;
        info!("Stopping aggregator");
        handle.shutdown().await;
        if let Err(e) = task.await {
            error!("Aggregator task ended abnormally: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    async fn add_feed(&mut self, name: &str, url: &str, out: &mut impl Write) -> Result<()> {
        let user = self.current_user().await?;
        let feed = self.store.add_feed(name, url, user.id).await?;
        self.store.create_feed_follow(user.id, feed.id).await?;
        writeln!(out, "{} {} ({})", feed.name, feed.url, feed.id)?;
        Ok(())
    }

    async fn feeds(&mut self, out: &mut impl Write) -> Result<()> {
        for (feed, owner) in self.store.list_feeds().await? {
            writeln!(out, "{} {} {}", feed.name, feed.url, owner)?;
        }
        Ok(())
    }

    async fn follow(&mut self, url: &str, out: &mut impl Write) -> Result<()> {
        let user = self.current_user().await?;
        let feed = self.store.get_feed_by_url(url).await?;
        let follow = self.store.create_feed_follow(user.id, feed.id).await?;
        writeln!(out, "{} {}", follow.feed_name, follow.user_name)?;
        Ok(())
    }

    async fn following(&mut self, out: &mut impl Write) -> Result<()> {
        let user = self.current_user().await?;
        for follow in self.store.feed_follows_for_user(user.id).await? {
            writeln!(out, "{}", follow.feed_name)?;
        }
        Ok(())
    }

    async fn unfollow(&mut self, url: &str, out: &mut impl Write) -> Result<()> {
        let user = self.current_user().await?;
        self.store.delete_feed_follow(user.id, url).await?;
        writeln!(out, "Unfollowed {}", url)?;
        Ok(())
    }

    async fn browse(&mut self, limit: usize, out: &mut impl Write) -> Result<()> {
        for post in self.store.recent_posts(limit).await? {
            writeln!(out, "Title: {}", post.title)?;
            writeln!(out, "Published at: {}", post.published_at.to_rfc2822())?;
            writeln!(out, "URL: {}", post.url)?;
            writeln!(out)?;
        }
        Ok(())
    }

    async fn fetch(&mut self, url: &str, out: &mut impl Write) -> Result<()> {
        let feed = self.fetcher.fetch(url).await?;
        writeln!(out, "{}", feed.channel.title)?;
        if !feed.channel.description.is_empty() {
            writeln!(out, "{}", feed.channel.description)?;
        }
        for item in &feed.channel.items {
            writeln!(out, "- {} ({})", item.title, item.link)?;
        }
        Ok(())
    }
}
