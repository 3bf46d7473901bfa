use crate::keywords::{top_keywords, KeywordCount};
use crate::stats::{busiest_hours, collect_stats, HourCount, SubredditStats};
use chrono::{DateTime, Utc};
use reddit_client::RedditApi;
use repostbot_core::{BotConfig, Clock, ErrorExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How many hours, keywords and popular posts each report keeps.
pub const REPORT_TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicStats {
    pub subscribers: u64,
    pub active_users: u64,
    pub community_age_days: i64,
    pub average_karma: f64,
    pub average_comments: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub posts_24h: usize,
    pub posts_week: usize,
    pub posts_per_day: f64,
    pub busiest_hours: Vec<HourCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularPost {
    pub id: String,
    pub title: String,
    pub score: i64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentSummary {
    pub keywords: Vec<KeywordCount>,
    pub popular_posts: Vec<PopularPost>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubredditTrend {
    pub basic: BasicStats,
    pub activity: ActivitySummary,
    pub content: ContentSummary,
}

/// Community name to its trend summary, for one cycle.
pub type TrendReport = BTreeMap<String, SubredditTrend>;

impl SubredditTrend {
    pub fn from_stats(stats: &SubredditStats, now: DateTime<Utc>) -> Self {
        let posts_week = stats.posts_week.len();

        let mut hours = busiest_hours(&stats.timestamps);
        hours.truncate(REPORT_TOP_N);

        let mut popular: Vec<_> = stats.posts_24h.iter().collect();
        popular.sort_by(|a, b| b.score.cmp(&a.score));
        let popular_posts = popular
            .into_iter()
            .take(REPORT_TOP_N)
            .map(|p| PopularPost {
                id: p.id.clone(),
                title: p.title.clone(),
                score: p.score,
                url: p.url.clone(),
            })
            .collect();

        Self {
            basic: BasicStats {
                subscribers: stats.subscribers,
                active_users: stats.active_users,
                community_age_days: stats.community_age_days(now),
                average_karma: stats.average_score(),
                average_comments: stats.average_comments(),
            },
            activity: ActivitySummary {
                posts_24h: stats.posts_24h.len(),
                posts_week,
                posts_per_day: posts_week as f64 / 7.0,
                busiest_hours: hours,
            },
            content: ContentSummary {
                keywords: top_keywords(&stats.titles, REPORT_TOP_N),
                popular_posts,
            },
        }
    }
}

/// Builds the per-cycle trend report across communities.
pub struct TrendAnalyzer {
    api: Arc<dyn RedditApi>,
    clock: Arc<dyn Clock>,
    new_limit: usize,
    delay: Duration,
}

impl TrendAnalyzer {
    pub fn new(api: Arc<dyn RedditApi>, clock: Arc<dyn Clock>, config: &BotConfig) -> Self {
        Self {
            api,
            clock,
            new_limit: config.new_limit,
            delay: config.stats_delay(),
        }
    }

    /// A community whose statistics cannot be fetched is logged and left
    /// out of the report; the rest are still analyzed.
    pub async fn analyze(&self, communities: &[String]) -> TrendReport {
        info!("Analyzing trends across {} communities", communities.len());
        let mut report = TrendReport::new();

        for name in communities {
            let now = self.clock.now();
            match collect_stats(self.api.as_ref(), name, self.new_limit, now).await {
                Ok(stats) => {
                    let trend = SubredditTrend::from_stats(&stats, now);
                    log_trend(name, &trend);
                    report.insert(name.clone(), trend);
                }
                Err(e) => {
                    warn!("Skipping statistics for r/{}", name);
                    e.log_warn();
                }
            }

            self.clock.sleep(self.delay).await;
        }

        report
    }
}

fn log_trend(name: &str, trend: &SubredditTrend) {
    info!(
        "r/{}: {} subscribers, {} active, {} posts in 24h, {:.2} posts/day",
        name,
        trend.basic.subscribers,
        trend.basic.active_users,
        trend.activity.posts_24h,
        trend.activity.posts_per_day
    );

    let keywords = trend
        .content
        .keywords
        .iter()
        .map(|k| format!("{} ({})", k.word, k.count))
        .collect::<Vec<_>>()
        .join(", ");
    info!("r/{} keywords: {}", name, keywords);

    let hours = trend
        .activity
        .busiest_hours
        .iter()
        .take(3)
        .map(|h| format!("{:02}:00 ({})", h.hour, h.count))
        .collect::<Vec<_>>()
        .join(", ");
    info!("r/{} busiest hours: {}", name, hours);

    for post in trend.content.popular_posts.iter().take(3) {
        info!("r/{} popular: {} (score {})", name, post.title, post.score);
    }
}
