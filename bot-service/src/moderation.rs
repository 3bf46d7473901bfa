use reddit_client::RedditApi;
use repostbot_core::{BotConfig, Clock, ErrorExt};
use std::collections::HashSet;
use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModerationSummary {
    pub approved: usize,
    pub upvoted: usize,
    pub failures: usize,
}

impl AddAssign for ModerationSummary {
    fn add_assign(&mut self, other: Self) {
        self.approved += other.approved;
        self.upvoted += other.upvoted;
        self.failures += other.failures;
    }
}

/// Bulk approve and upvote actions run once per cycle.
pub struct Moderator {
    api: Arc<dyn RedditApi>,
    clock: Arc<dyn Clock>,
    action_delay: Duration,
    upvote_limit: usize,
}

impl Moderator {
    pub fn new(api: Arc<dyn RedditApi>, clock: Arc<dyn Clock>, config: &BotConfig) -> Self {
        Self {
            api,
            clock,
            action_delay: config.action_delay(),
            upvote_limit: config.upvote_limit,
        }
    }

    /// Approve every post in `user`'s submission history, then upvote the
    /// newest posts of each community.
    pub async fn sweep(&self, user: &str, communities: &[String]) -> ModerationSummary {
        let mut summary = self.approve_own_posts(user).await;
        summary += self.upvote_recent(communities).await;
        info!(
            "Moderation sweep done: {} approved, {} upvoted, {} failures",
            summary.approved, summary.upvoted, summary.failures
        );
        summary
    }

    pub async fn approve_own_posts(&self, user: &str) -> ModerationSummary {
        let mut summary = ModerationSummary::default();

        let posts = match self.api.user_submissions(user, None).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!("Could not list own posts for u/{}", user);
                e.log_warn();
                summary.failures += 1;
                return summary;
            }
        };

        info!("Approving {} own posts", posts.len());
        for post in posts {
            match self.api.approve(&post.name).await {
                Ok(()) => {
                    debug!("Approved {}", post.title);
                    summary.approved += 1;
                }
                Err(e) => {
                    warn!("Failed to approve {}", post.name);
                    e.log_warn();
                    summary.failures += 1;
                }
            }
            self.clock.sleep(self.action_delay).await;
        }

        summary
    }

    /// Upvote the newest `upvote_limit` posts per community; a post is voted
    /// at most once per call even if it shows up in several listings.
    pub async fn upvote_recent(&self, communities: &[String]) -> ModerationSummary {
        let mut summary = ModerationSummary::default();
        let mut voted: HashSet<String> = HashSet::new();

        for community in communities {
            let posts = match self.api.new_submissions(community, self.upvote_limit).await {
                Ok(posts) => posts,
                Err(e) => {
                    warn!("Skipping upvotes in r/{}", community);
                    e.log_warn();
                    summary.failures += 1;
                    continue;
                }
            };

            for post in posts {
                if voted.contains(&post.id) {
                    continue;
                }
                match self.api.upvote(&post.name).await {
                    Ok(()) => {
                        debug!("Upvoted {}", post.title);
                        voted.insert(post.id);
                        summary.upvoted += 1;
                    }
                    Err(e) => {
                        warn!("Failed to upvote {}", post.name);
                        e.log_warn();
                        summary.failures += 1;
                    }
                }
                self.clock.sleep(self.action_delay).await;
            }
        }

        summary
    }
}
