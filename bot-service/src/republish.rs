use post_store::PostStore;
use reddit_client::{profile_subreddit, MediaFetcher, RedditApi};
use repostbot_core::{BotConfig, CoreError, ErrorExt, PostKind, Submission, SubmittedPost};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Posts from `posts` that may be republished: not stickied, score strictly
/// above `threshold`, and a title that maps to a usable store key not yet
/// recorded.
pub fn filter_eligible<'a>(
    posts: &'a [Submission],
    store: &dyn PostStore,
    threshold: i64,
) -> Vec<&'a Submission> {
    posts
        .iter()
        .filter(|p| !p.stickied && p.score > threshold)
        .filter(|p| store.key_for(&p.title).is_ok() && !store.contains(&p.title))
        .collect()
}

/// The allowed extension `url` ends with, if any. Query strings and
/// fragments are ignored and the comparison is case-insensitive.
pub fn image_extension<'a>(url: &str, allowed: &'a [String]) -> Option<&'a str> {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    allowed
        .iter()
        .find(|ext| path.ends_with(&ext.to_lowercase()))
        .map(String::as_str)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepublishOutcome {
    NoEligible,
    Published { title: String, kind: PostKind },
    /// Submitted and recorded, but not approved: either the approval call
    /// failed or the new post could not be located.
    PublishedUnapproved { title: String, kind: PostKind },
}

pub struct Republisher {
    api: Arc<dyn RedditApi>,
    media: Arc<dyn MediaFetcher>,
    store: Box<dyn PostStore>,
    rng: fastrand::Rng,
    profile: String,
    score_threshold: i64,
    hot_limit: usize,
    allowed_extensions: Vec<String>,
}

impl Republisher {
    pub fn new(
        api: Arc<dyn RedditApi>,
        media: Arc<dyn MediaFetcher>,
        store: Box<dyn PostStore>,
        username: &str,
        config: &BotConfig,
    ) -> Self {
        let rng = match config.selection_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            api,
            media,
            store,
            rng,
            profile: profile_subreddit(username),
            score_threshold: config.score_threshold,
            hot_limit: config.hot_limit,
            allowed_extensions: config.allowed_extensions.clone(),
        }
    }

    pub fn store(&self) -> &dyn PostStore {
        self.store.as_ref()
    }

    /// Pick one eligible hot post from `community` at random and republish
    /// it to the bot's profile. On error the store is left untouched.
    pub async fn republish_from(&mut self, community: &str) -> Result<RepublishOutcome, CoreError> {
        let hot = self.api.hot_submissions(community, self.hot_limit).await?;
        let eligible = filter_eligible(&hot, self.store.as_ref(), self.score_threshold);
        debug!(
            "r/{}: {} of {} hot posts eligible",
            community,
            eligible.len(),
            hot.len()
        );

        if eligible.is_empty() {
            info!("No eligible posts in r/{}", community);
            return Ok(RepublishOutcome::NoEligible);
        }

        let chosen = eligible[self.rng.usize(..eligible.len())].clone();
        info!(
            "Selected \"{}\" (score {}) from r/{}",
            chosen.title, chosen.score, community
        );

        // nothing is submitted for a title the store could never record
        let key = self.store.key_for(&chosen.title)?;

        let (kind, submitted) = match image_extension(&chosen.url, &self.allowed_extensions) {
            Some(ext) => {
                let ext = ext.to_string();
                let submitted = self.publish_image(&chosen, &key, &ext).await?;
                (PostKind::Image, submitted)
            }
            None => {
                let submitted = self
                    .api
                    .submit_link(&self.profile, &chosen.title, &chosen.url)
                    .await?;
                (PostKind::Link, submitted)
            }
        };

        let approved = match submitted.name.as_deref() {
            Some(fullname) => match self.api.approve(fullname).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Republished {} but could not approve it", fullname);
                    e.log_warn();
                    false
                }
            },
            None => {
                warn!(
                    "Republished \"{}\" but could not find the new post to approve",
                    chosen.title
                );
                false
            }
        };

        // the post exists on the profile either way
        self.store.insert(&chosen.title)?;

        let title = chosen.title;
        if approved {
            info!("Republished {} post \"{}\"", kind, title);
            Ok(RepublishOutcome::Published { title, kind })
        } else {
            Ok(RepublishOutcome::PublishedUnapproved { title, kind })
        }
    }

    async fn publish_image(
        &self,
        post: &Submission,
        key: &str,
        ext: &str,
    ) -> Result<SubmittedPost, CoreError> {
        let dir = self.store.entry_dir(&post.title);
        let created_here = !dir.exists();

        let result = self.download_and_submit(post, &dir, key, ext).await;
        if result.is_err() && created_here {
            remove_partial_entry(&dir).await;
        }
        result
    }

    async fn download_and_submit(
        &self,
        post: &Submission,
        dir: &Path,
        key: &str,
        ext: &str,
    ) -> Result<SubmittedPost, CoreError> {
        let bytes = self.media.fetch(&post.url).await?;

        tokio::fs::create_dir_all(dir).await?;
        let file: PathBuf = dir.join(format!("{}{}", key, ext));
        tokio::fs::write(&file, &bytes).await?;
        debug!("Saved {} bytes to {}", bytes.len(), file.display());

        self.api
            .submit_image(&self.profile, &post.title, &file)
            .await
    }
}

async fn remove_partial_entry(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove partial entry {}: {}", dir.display(), e);
        }
    } else {
        debug!("Removed partial entry {}", dir.display());
    }
}
