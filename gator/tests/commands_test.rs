mod common;

use common::{store_with_feeds, write_config, PanickingFetcher, StubFetcher, SAMPLE_FEED};
use gator::{
    AggregatorError, Command, Config, MemoryStore, Result, RssAggregator, State,
    SubscriptionStore,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TECH_URL: &str = "https://news.example.com/rss";
const OTHER_URL: &str = "https://other.example.com/rss";

struct Harness {
    state: State<MemoryStore, StubFetcher>,
    dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "");
        let fetcher = StubFetcher::new().with_document(TECH_URL, SAMPLE_FEED);
        let state = State::new(Arc::new(MemoryStore::new()), Arc::new(fetcher), config);
        Self { state, dir }
    }

    async fn run(&mut self, command: Command) -> Result<String> {
        self.run_until(command, async {}).await
    }

    async fn run_until(
        &mut self,
        command: Command,
        shutdown: impl Future<Output = ()>,
    ) -> Result<String> {
        let mut out = Vec::new();
        self.state.dispatch(command, &mut out, shutdown).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn config_on_disk(&self) -> Config {
        Config::read_from(&self.dir.path().join(".gatorconfig.json")).unwrap()
    }
}

fn register(name: &str) -> Command {
    Command::Register {
        name: name.to_string(),
    }
}

fn login(name: &str) -> Command {
    Command::Login {
        name: name.to_string(),
    }
}

fn add_feed(name: &str, url: &str) -> Command {
    Command::Addfeed {
        name: name.to_string(),
        url: url.to_string(),
    }
}

#[tokio::test]
async fn test_register_sets_the_current_user() {
    let mut h = Harness::new();

    let out = h.run(register("alice")).await.unwrap();
    assert!(out.starts_with("User has been created\nalice ("));
    assert_eq!(h.state.config.current_user_name, "alice");
    assert_eq!(h.config_on_disk().current_user_name, "alice");
    assert_eq!(
        h.config_on_disk().db_url,
        "postgres://localhost/gator_test"
    );

    let err = h.run(register("alice")).await.unwrap_err();
    assert!(matches!(err, AggregatorError::AlreadyExists { .. }));
}

#[tokio::test]
async fn test_login_requires_an_existing_user() {
    let mut h = Harness::new();
    h.run(register("alice")).await.unwrap();
    h.run(register("bob")).await.unwrap();

    let out = h.run(login("alice")).await.unwrap();
    assert_eq!(out, "Logged in as alice\n");
    assert_eq!(h.config_on_disk().current_user_name, "alice");

    let err = h.run(login("mallory")).await.unwrap_err();
    assert!(matches!(err, AggregatorError::UserNotFound { .. }));
    assert_eq!(h.config_on_disk().current_user_name, "alice");
}

#[tokio::test]
async fn test_users_marks_the_current_one() {
    let mut h = Harness::new();
    h.run(register("alice")).await.unwrap();
    h.run(register("bob")).await.unwrap();

    let out = h.run(Command::Users).await.unwrap();
    assert_eq!(out, "* alice\n* bob (current)\n");
}

#[tokio::test]
async fn test_feed_commands_need_a_logged_in_user() {
    let mut h = Harness::new();

    let err = h.run(add_feed("Tech", TECH_URL)).await.unwrap_err();
    assert!(matches!(err, AggregatorError::NoCurrentUser));
    let err = h.run(Command::Following).await.unwrap_err();
    assert!(matches!(err, AggregatorError::NoCurrentUser));

    // A name in the config that the store does not know.
    h.state.config.current_user_name = "ghost".to_string();
    let err = h.run(add_feed("Tech", TECH_URL)).await.unwrap_err();
    assert!(matches!(err, AggregatorError::UserNotFound { .. }));
}

#[tokio::test]
async fn test_addfeed_follows_the_new_feed() {
    let mut h = Harness::new();
    h.run(register("alice")).await.unwrap();

    let out = h.run(add_feed("Tech", TECH_URL)).await.unwrap();
    assert!(out.starts_with(&format!("Tech {} (", TECH_URL)));

    assert_eq!(h.run(Command::Following).await.unwrap(), "Tech\n");
    assert_eq!(
        h.run(Command::Feeds).await.unwrap(),
        format!("Tech {} alice\n", TECH_URL)
    );

    let err = h.run(add_feed("Again", TECH_URL)).await.unwrap_err();
    assert!(matches!(err, AggregatorError::AlreadyExists { .. }));
}

#[tokio::test]
async fn test_follow_and_unfollow() {
    let mut h = Harness::new();
    h.run(register("alice")).await.unwrap();
    h.run(add_feed("Tech", TECH_URL)).await.unwrap();
    h.run(add_feed("Other", OTHER_URL)).await.unwrap();
    h.run(register("bob")).await.unwrap();

    let out = h
        .run(Command::Follow {
            url: TECH_URL.to_string(),
        })
        .await
        .unwrap();
    assert_eq!(out, "Tech bob\n");

    let err = h
        .run(Command::Follow {
            url: TECH_URL.to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AggregatorError::AlreadyExists { .. }));

    let err = h
        .run(Command::Follow {
            url: "https://nowhere.example.com/rss".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AggregatorError::FeedNotFound { .. }));

    assert_eq!(h.run(Command::Following).await.unwrap(), "Tech\n");

    let out = h
        .run(Command::Unfollow {
            url: TECH_URL.to_string(),
        })
        .await
        .unwrap();
    assert_eq!(out, format!("Unfollowed {}\n", TECH_URL));
    assert_eq!(h.run(Command::Following).await.unwrap(), "");

    // Alice's follows are untouched.
    h.run(login("alice")).await.unwrap();
    assert_eq!(h.run(Command::Following).await.unwrap(), "Tech\nOther\n");
}

#[tokio::test]
async fn test_reset_clears_everything() {
    let mut h = Harness::new();
    h.run(register("alice")).await.unwrap();
    h.run(add_feed("Tech", TECH_URL)).await.unwrap();

    let out = h.run(Command::Reset).await.unwrap();
    assert_eq!(out, "Database reset successful\n");
    assert!(h.state.store.list_users().await.unwrap().is_empty());
    assert!(h.state.store.list_feeds().await.unwrap().is_empty());
    assert_eq!(h.run(Command::Users).await.unwrap(), "");
}

#[tokio::test]
async fn test_browse_shows_newest_posts_first() {
    let mut h = Harness::new();
    h.run(register("alice")).await.unwrap();
    h.run(add_feed("Tech", TECH_URL)).await.unwrap();
    RssAggregator::new(h.state.store.clone(), h.state.fetcher.clone())
        .scrape_next_feed()
        .await
        .unwrap();

    let out = h.run(Command::Browse { limit: None }).await.unwrap();
    let titles: Vec<_> = out
        .lines()
        .filter_map(|l| l.strip_prefix("Title: "))
        .collect();
    assert_eq!(titles, vec!["Async in practice", "Borrowing, explained"]);
    assert!(out.contains("URL: https://news.example.com/async"));

    let out = h.run(Command::Browse { limit: Some(10) }).await.unwrap();
    assert_eq!(out.matches("Title: ").count(), 3);
}

#[tokio::test]
async fn test_agg_rejects_a_bad_interval_before_fetching() {
    let mut h = Harness::new();
    h.run(register("alice")).await.unwrap();
    h.run(add_feed("Tech", TECH_URL)).await.unwrap();

    for bad in ["soon", "0s", "-1m", "10"] {
        let err = h
            .run(Command::Agg {
                time_between_reqs: bad.to_string(),
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, AggregatorError::InvalidInterval(_)),
            "{} gave {:?}",
            bad,
            err
        );
    }
    assert!(h.state.fetcher.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_agg_runs_until_shutdown() {
    let mut h = Harness::new();
    h.run(register("alice")).await.unwrap();
    h.run(add_feed("Tech", TECH_URL)).await.unwrap();

    let out = h
        .run_until(
            Command::Agg {
                time_between_reqs: "1m".to_string(),
            },
            tokio::time::sleep(Duration::from_secs(90)),
        )
        .await
        .unwrap();

    assert_eq!(out, "Collecting feeds every 1m0s\n");
    // Ticks at 0s and 60s, both for the only feed.
    assert_eq!(h.state.fetcher.calls(), vec![TECH_URL, TECH_URL]);
    let feed = h.state.store.get_feed_by_url(TECH_URL).await.unwrap();
    assert_eq!(h.state.store.post_count(feed.id).await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_agg_reports_a_crashed_aggregator() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "owner");
    let (store, _feeds) = store_with_feeds(&[TECH_URL]).await;
    let mut state = State::new(Arc::new(store), Arc::new(PanickingFetcher), config);

    let mut out = Vec::new();
    let err = state
        .dispatch(
            Command::Agg {
                time_between_reqs: "1m".to_string(),
            },
            &mut out,
            tokio::time::sleep(Duration::from_secs(30)),
        )
        .await
        .unwrap_err();

    match err {
        AggregatorError::Task(e) => assert!(e.is_panic()),
        other => panic!("expected a task failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_prints_the_decoded_channel() {
    let mut h = Harness::new();

    let out = h
        .run(Command::Fetch {
            url: TECH_URL.to_string(),
        })
        .await
        .unwrap();
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines[0], "Tech & Science");
    assert_eq!(lines[1], "Daily notes on tech & science");
    assert_eq!(
        lines[2],
        "- Compilers & you (https://news.example.com/compilers)"
    );
    assert_eq!(lines.len(), 5);

    let err = h
        .run(Command::Fetch {
            url: OTHER_URL.to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AggregatorError::Status { status: 404, .. }));
}
