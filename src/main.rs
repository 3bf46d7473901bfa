use bot_service::{Bot, Scheduler};
use post_store::{DirectoryStore, Sanitizer};
use reddit_client::{HttpMediaFetcher, RedditClient};
use repostbot_core::{BotConfig, CoreError, ErrorExt, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "repostbot=info,bot_service=info,trend_analysis=info,reddit_client=info,post_store=info";

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting repostbot");

    if let Err(e) = run().await {
        tracing::error!("{}", e.user_friendly_message());
        e.log_error();
        return Err(e);
    }
    Ok(())
}

async fn run() -> Result<(), CoreError> {
    let config = BotConfig::load()?;

    let client = RedditClient::new(&config.credentials, &config.api)?;
    let username = authenticate(&client, config.error_backoff()).await?;
    tracing::info!("Authenticated as u/{}", username);

    let store = DirectoryStore::open(
        config.base_folder.clone(),
        Sanitizer::new(config.max_title_length),
    )?;
    let media = HttpMediaFetcher::new(&config.credentials.user_agent)?;
    let clock = Arc::new(SystemClock);

    let mut bot = Bot::new(
        Arc::new(client),
        Arc::new(media),
        clock.clone(),
        Box::new(store),
        &username,
        &config,
    );
    let scheduler = Scheduler::new(clock, &config);

    tokio::select! {
        () = scheduler.run(&mut bot) => {}
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::info!("Shutdown requested, stopping"),
                Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    Ok(())
}

/// Rejected credentials stop the bot. Anything else (Reddit down, network
/// trouble) is retried after `backoff`.
async fn authenticate(client: &RedditClient, backoff: Duration) -> Result<String, CoreError> {
    loop {
        match client.authenticate().await {
            Ok(username) => return Ok(username),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    "Authentication attempt failed, retrying in {}s",
                    backoff.as_secs()
                );
                e.log_warn();
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
