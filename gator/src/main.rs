use anyhow::Context;
use clap::Parser;
use gator::{Cli, Config, FeedManager, FetchConfig, Fetcher, State};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::read().context("reading gator config")?;
    info!("Connecting to database: {}", redact(&config.db_url));

    let store = FeedManager::new(&config.db_url)
        .await
        .context("connecting to the database")?;
    store.migrate().await.context("migrating the database")?;

    let fetcher = Fetcher::new(FetchConfig::default()).context("building HTTP client")?;
    let mut state = State::new(Arc::new(store), Arc::new(fetcher), config);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let mut stdout = std::io::stdout();
    state.dispatch(cli.command, &mut stdout, shutdown).await?;
    Ok(())
}

/// Hides the password in a connection string before it is logged.
fn redact(database_url: &str) -> String {
    match Url::parse(database_url) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        Ok(url) => url.to_string(),
        Err(_) => "<unparseable database url>".to_string(),
    }
}
