use chrono::{DateTime, Duration, Timelike, Utc};
use reddit_client::RedditApi;
use repostbot_core::{timestamp_to_utc, CoreError, Submission, SubredditInfo};
use serde::Serialize;
use tracing::debug;

/// Raw per-community aggregates, built fresh for every analysis.
#[derive(Debug, Clone)]
pub struct SubredditStats {
    pub name: String,
    pub subscribers: u64,
    pub active_users: u64,
    pub created_at: DateTime<Utc>,
    /// Posts no older than 24 hours, newest first.
    pub posts_24h: Vec<Submission>,
    /// Posts no older than 7 days, newest first.
    pub posts_week: Vec<Submission>,
    pub timestamps: Vec<f64>,
    pub titles: Vec<String>,
    pub total_score: i64,
    pub total_comments: u64,
}

impl SubredditStats {
    pub fn from_listing(info: SubredditInfo, submissions: &[Submission], now: DateTime<Utc>) -> Self {
        let day = Duration::days(1);
        let week = Duration::days(7);

        let mut stats = Self {
            created_at: info.created_at(),
            name: info.display_name,
            subscribers: info.subscribers,
            active_users: info.active_user_count.unwrap_or(0),
            posts_24h: Vec::new(),
            posts_week: Vec::new(),
            timestamps: Vec::with_capacity(submissions.len()),
            titles: Vec::with_capacity(submissions.len()),
            total_score: 0,
            total_comments: 0,
        };

        for submission in submissions {
            let age = now - submission.created_at();

            stats.timestamps.push(submission.created_utc);
            stats.titles.push(submission.title.clone());
            stats.total_score += submission.score;
            stats.total_comments += submission.num_comments;

            if age <= day {
                stats.posts_24h.push(submission.clone());
            }
            if age <= week {
                stats.posts_week.push(submission.clone());
            }
        }

        stats
    }

    pub fn post_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn average_score(&self) -> f64 {
        match self.post_count() {
            0 => 0.0,
            n => self.total_score as f64 / n as f64,
        }
    }

    pub fn average_comments(&self) -> f64 {
        match self.post_count() {
            0 => 0.0,
            n => self.total_comments as f64 / n as f64,
        }
    }

    pub fn community_age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}

/// Fetch community metadata and up to `limit` newest posts, then aggregate.
pub async fn collect_stats(
    api: &dyn RedditApi,
    subreddit: &str,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<SubredditStats, CoreError> {
    let info = api.subreddit_info(subreddit).await?;
    let submissions = api.new_submissions(subreddit, limit).await?;
    debug!(
        "Fetched {} recent posts from r/{}",
        submissions.len(),
        subreddit
    );
    Ok(SubredditStats::from_listing(info, &submissions, now))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourCount {
    pub hour: u32,
    pub count: usize,
}

/// Posts per UTC hour of day, busiest first; equal counts by hour ascending.
pub fn busiest_hours(timestamps: &[f64]) -> Vec<HourCount> {
    let mut histogram = [0usize; 24];
    for &ts in timestamps {
        histogram[timestamp_to_utc(ts).hour() as usize] += 1;
    }

    let mut hours: Vec<HourCount> = histogram
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > 0)
        .map(|(hour, &count)| HourCount {
            hour: hour as u32,
            count,
        })
        .collect();
    hours.sort_by(|a, b| b.count.cmp(&a.count));
    hours
}
