use bot_service::{filter_eligible, Bot, RepublishOutcome, Scheduler};
use chrono::{TimeZone, Utc};
use post_store::{DirectoryStore, PostStore, Sanitizer};
use reddit_client::fake::{submission, FakeMediaFetcher, FakeReddit};
use repostbot_core::{BotConfig, CoreError, ManualClock, Submission};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const SEED: u64 = 20240310;

fn config(seed: u64) -> BotConfig {
    BotConfig {
        selection_seed: Some(seed),
        ..BotConfig::default()
    }
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
    ))
}

/// Ten hot posts of which exactly three are eligible.
fn hot_posts() -> Vec<Submission> {
    let mut pinned = submission("pin", "Weekly discussion thread", 500);
    pinned.stickied = true;

    vec![
        pinned,
        submission("h1", "Sunset over the bay", 70),
        submission("h2", "Barely noticed", 3),
        submission("h3", "Already republished", 120),
        submission("h4", "Exactly the threshold", 10),
        submission("h5", "Old lighthouse", 45),
        submission("h6", "Nine points", 9),
        submission("h7", "Foggy morning walk", 33),
        submission("h8", "Zero", 0),
        submission("h9", "Negative vibes", -4),
    ]
}

fn open_store(base: &Path) -> DirectoryStore {
    let mut store = DirectoryStore::open(base, Sanitizer::default()).unwrap();
    store.insert("Already republished").unwrap();
    store
}

fn fake_reddit() -> Arc<FakeReddit> {
    Arc::new(
        FakeReddit::new("bot")
            .with_subreddit("pics", 5_000, 0.0)
            .with_hot_posts("pics", hot_posts()),
    )
}

fn bot(api: Arc<FakeReddit>, clock: Arc<ManualClock>, base: &Path, config: &BotConfig) -> Bot {
    Bot::new(
        api,
        Arc::new(FakeMediaFetcher::new()),
        clock,
        Box::new(open_store(base)),
        "bot",
        config,
    )
}

#[test]
fn test_fixture_has_three_eligible_posts() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open_store(tmp.path());
    let posts = hot_posts();
    let titles: Vec<&str> = filter_eligible(&posts, &store, 10)
        .iter()
        .map(|p| p.title.as_str())
        .collect();
    assert_eq!(
        titles,
        vec!["Sunset over the bay", "Old lighthouse", "Foggy morning walk"]
    );
}

#[tokio::test]
async fn test_fixed_seed_selects_same_post() {
    let mut picks = Vec::new();
    for _ in 0..3 {
        let tmp = tempfile::tempdir().unwrap();
        let mut bot = bot(fake_reddit(), clock(), tmp.path(), &config(SEED));
        let summary = bot.run_cycle().await.unwrap();
        picks.push(summary.published()[0].to_string());
    }

    assert!(picks.iter().all(|p| p == &picks[0]));
    assert!(["Sunset over the bay", "Old lighthouse", "Foggy morning walk"]
        .contains(&picks[0].as_str()));
}

#[tokio::test]
async fn test_published_title_leaves_the_eligible_set() {
    let tmp = tempfile::tempdir().unwrap();
    let api = fake_reddit();
    let clock = clock();
    let mut bot = bot(api.clone(), clock.clone(), tmp.path(), &config(SEED));

    let first = bot.run_cycle().await.unwrap();
    let title = first.published()[0].to_string();
    assert!(bot.store().contains(&title));
    assert!(tmp.path().join(&title).is_dir());

    let posts = hot_posts();
    let remaining: Vec<&str> = filter_eligible(&posts, bot.store(), 10)
        .iter()
        .map(|p| p.title.as_str())
        .collect();
    assert_eq!(remaining.len(), 2);
    assert!(!remaining.contains(&title.as_str()));

    let second = bot.run_cycle().await.unwrap();
    let next = second.published()[0].to_string();
    assert_ne!(next, title);

    let submitted: Vec<String> = api.submissions().into_iter().map(|s| s.title).collect();
    assert_eq!(submitted, vec![title, next]);
}

#[tokio::test]
async fn test_cycle_runs_trends_moderation_and_republish() {
    let tmp = tempfile::tempdir().unwrap();
    let api = Arc::new(
        FakeReddit::new("bot")
            .with_subreddit("pics", 5_000, 0.0)
            .with_hot_posts("pics", hot_posts())
            .with_new_posts("pics", vec![submission("n1", "Newest post here", 2)])
            .with_own_posts(vec![submission("mine", "Earlier repost", 12)]),
    );
    let clock = clock();
    let mut bot = bot(api.clone(), clock.clone(), tmp.path(), &config(SEED));

    let summary = bot.run_cycle().await.unwrap();

    assert_eq!(summary.communities, vec!["pics"]);
    assert_eq!(summary.trends["pics"].basic.subscribers, 5_000);
    assert_eq!(summary.moderation.approved, 1);
    assert_eq!(summary.moderation.upvoted, 1);
    assert_eq!(api.upvoted(), vec!["t3_n1"]);
    // own post approved during the sweep, then the new repost
    assert_eq!(api.approved(), vec!["t3_mine", "t3_new1"]);

    // stats delay, one approval, one upvote, then the post delay
    assert_eq!(
        clock.sleeps(),
        vec![
            Duration::from_secs(2),
            Duration::from_secs(2),
            Duration::from_secs(2),
            Duration::from_secs(60)
        ]
    );
}

#[tokio::test]
async fn test_failing_community_is_isolated() {
    let tmp = tempfile::tempdir().unwrap();
    let api = Arc::new(
        FakeReddit::new("bot")
            .with_subreddit("broken", 10, 0.0)
            .with_subreddit("pics", 5_000, 0.0)
            .with_hot_posts("pics", hot_posts())
            .failing_subreddit("broken"),
    );
    let mut bot = bot(api.clone(), clock(), tmp.path(), &config(SEED));

    let summary = bot.run_cycle().await.unwrap();

    assert_eq!(summary.republish_failures, 1);
    assert!(!summary.trends.contains_key("broken"));
    assert!(summary.trends.contains_key("pics"));
    assert_eq!(summary.published().len(), 1);
    assert_eq!(summary.outcomes[0].0, "pics");
}

#[tokio::test]
async fn test_subreddit_limit_caps_communities() {
    let tmp = tempfile::tempdir().unwrap();
    let api = Arc::new(
        FakeReddit::new("bot")
            .with_subreddit("a", 1, 0.0)
            .with_subreddit("b", 1, 0.0)
            .with_subreddit("c", 1, 0.0),
    );
    let config = BotConfig {
        subreddit_limit: Some(2),
        ..config(SEED)
    };
    let mut bot = bot(api, clock(), tmp.path(), &config);

    let summary = bot.run_cycle().await.unwrap();
    assert_eq!(summary.communities, vec!["a", "b"]);
    assert!(summary
        .outcomes
        .iter()
        .all(|(_, o)| *o == RepublishOutcome::NoEligible));
}

#[tokio::test]
async fn test_every_subscription_processed_without_limit() {
    let tmp = tempfile::tempdir().unwrap();
    let names: Vec<String> = (1..=12).map(|i| format!("community{:02}", i)).collect();
    let mut fake = FakeReddit::new("bot");
    for name in &names {
        fake = fake.with_subreddit(name, 100, 0.0);
    }
    let mut config = config(SEED);
    config.subreddit_limit = None;
    let mut bot = bot(Arc::new(fake), clock(), tmp.path(), &config);

    let summary = bot.run_cycle().await.unwrap();

    assert_eq!(summary.communities, names);
    assert_eq!(summary.outcomes.len(), 12);
    assert_eq!(summary.trends.len(), 12);
}

#[tokio::test]
async fn test_scheduler_backs_off_after_failed_cycle() {
    let tmp = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeReddit::new("bot").failing_subscriptions());
    let clock = clock();
    let mut bot = bot(api, clock.clone(), tmp.path(), &config(SEED));
    let scheduler = Scheduler::new(clock.clone(), &config(SEED));

    let results = scheduler.run_cycles(&mut bot, 2).await;

    assert!(results
        .iter()
        .all(|r| matches!(r, Err(CoreError::RedditApi(_)))));
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(60); 2]);
}

#[tokio::test]
async fn test_scheduler_waits_between_good_cycles() {
    let tmp = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeReddit::new("bot"));
    let clock = clock();
    let mut bot = bot(api, clock.clone(), tmp.path(), &config(SEED));
    let scheduler = Scheduler::new(clock.clone(), &config(SEED));

    let results = scheduler.run_cycles(&mut bot, 3).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(1800); 3]);
}
