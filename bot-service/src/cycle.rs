use crate::moderation::{ModerationSummary, Moderator};
use crate::republish::{RepublishOutcome, Republisher};
use post_store::PostStore;
use reddit_client::{MediaFetcher, RedditApi};
use repostbot_core::{BotConfig, Clock, CoreError, ErrorExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use trend_analysis::{TrendAnalyzer, TrendReport};

/// What one full pass over the subscribed communities did.
#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    pub communities: Vec<String>,
    pub trends: TrendReport,
    pub moderation: ModerationSummary,
    /// Republish result per community, in processing order.
    pub outcomes: Vec<(String, RepublishOutcome)>,
    pub republish_failures: usize,
}

impl CycleSummary {
    pub fn published(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| match outcome {
                RepublishOutcome::Published { title, .. }
                | RepublishOutcome::PublishedUnapproved { title, .. } => Some(title.as_str()),
                RepublishOutcome::NoEligible => None,
            })
            .collect()
    }
}

pub struct Bot {
    api: Arc<dyn RedditApi>,
    clock: Arc<dyn Clock>,
    username: String,
    analyzer: TrendAnalyzer,
    moderator: Moderator,
    republisher: Republisher,
    subreddit_limit: Option<usize>,
    post_delay: Duration,
}

impl Bot {
    pub fn new(
        api: Arc<dyn RedditApi>,
        media: Arc<dyn MediaFetcher>,
        clock: Arc<dyn Clock>,
        store: Box<dyn PostStore>,
        username: &str,
        config: &BotConfig,
    ) -> Self {
        Self {
            analyzer: TrendAnalyzer::new(api.clone(), clock.clone(), config),
            moderator: Moderator::new(api.clone(), clock.clone(), config),
            republisher: Republisher::new(api.clone(), media, store, username, config),
            api,
            clock,
            username: username.to_string(),
            subreddit_limit: config.subreddit_limit,
            post_delay: config.post_delay(),
        }
    }

    pub fn store(&self) -> &dyn PostStore {
        self.republisher.store()
    }

    /// Trends, then moderation, then one republish attempt per community.
    ///
    /// Only the community listing can fail the cycle. Failures inside a
    /// community are logged and counted, and the next community proceeds.
    pub async fn run_cycle(&mut self) -> Result<CycleSummary, CoreError> {
        let mut communities = self.api.subscribed_subreddits().await?;
        if let Some(limit) = self.subreddit_limit {
            communities.truncate(limit);
        }
        info!("Starting cycle over {} communities", communities.len());

        let trends = self.analyzer.analyze(&communities).await;
        let moderation = self.moderator.sweep(&self.username, &communities).await;

        let mut outcomes = Vec::with_capacity(communities.len());
        let mut republish_failures = 0;
        for community in &communities {
            match self.republisher.republish_from(community).await {
                Ok(outcome) => outcomes.push((community.clone(), outcome)),
                Err(e) => {
                    warn!("Republish from r/{} failed", community);
                    e.log_warn();
                    republish_failures += 1;
                }
            }
            self.clock.sleep(self.post_delay).await;
        }

        let summary = CycleSummary {
            communities,
            trends,
            moderation,
            outcomes,
            republish_failures,
        };
        info!(
            "Cycle complete: {} republished, {} failed, {} posts in store",
            summary.published().len(),
            summary.republish_failures,
            self.store().len()
        );
        Ok(summary)
    }
}
