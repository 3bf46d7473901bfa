//! Reddit API access for the repost bot.
//!
//! The bot only talks to Reddit through the [`RedditApi`] and [`MediaFetcher`]
//! traits. [`RedditClient`] is the production implementation; the `test-util`
//! feature exposes in-memory fakes for exercising whole cycles.

pub mod api;
pub mod auth;
pub mod media;
pub mod rate_limiter;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

#[cfg(test)]
mod tests;

pub use api::RedditClient;
pub use auth::{PasswordAuthenticator, RedditToken};
pub use media::HttpMediaFetcher;
pub use rate_limiter::{RateLimitConfig, RateLimiter};

use async_trait::async_trait;
use repostbot_core::{CoreError, Submission, SubmittedPost, SubredditInfo};
use std::path::Path;

/// The operations the bot needs from Reddit. Any call may fail; callers
/// decide how far a failure propagates.
#[async_trait]
pub trait RedditApi: Send + Sync {
    /// Name of the authenticated account.
    async fn me(&self) -> Result<String, CoreError>;

    /// Display names of every community the account is subscribed to.
    async fn subscribed_subreddits(&self) -> Result<Vec<String>, CoreError>;

    async fn subreddit_info(&self, subreddit: &str) -> Result<SubredditInfo, CoreError>;

    /// Newest submissions first.
    async fn new_submissions(
        &self,
        subreddit: &str,
        limit: usize,
    ) -> Result<Vec<Submission>, CoreError>;

    async fn hot_submissions(
        &self,
        subreddit: &str,
        limit: usize,
    ) -> Result<Vec<Submission>, CoreError>;

    /// Submissions made by `user`, newest first. `None` fetches every page.
    async fn user_submissions(
        &self,
        user: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Submission>, CoreError>;

    /// Approve a post by fullname (`t3_...`).
    async fn approve(&self, fullname: &str) -> Result<(), CoreError>;

    async fn upvote(&self, fullname: &str) -> Result<(), CoreError>;

    async fn submit_link(
        &self,
        subreddit: &str,
        title: &str,
        url: &str,
    ) -> Result<SubmittedPost, CoreError>;

    async fn submit_image(
        &self,
        subreddit: &str,
        title: &str,
        image_path: &Path,
    ) -> Result<SubmittedPost, CoreError>;
}

/// Downloads post content (images) from arbitrary hosts.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CoreError>;
}

/// Community name of a user's profile feed.
pub fn profile_subreddit(username: &str) -> String {
    format!("u_{}", username)
}
