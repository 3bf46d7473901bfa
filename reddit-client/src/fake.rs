//! In-memory stand-ins for [`RedditApi`] and [`MediaFetcher`].
//!
//! Every call is recorded so tests can assert on what the bot did, and any
//! community can be configured to fail so error isolation can be exercised.

use crate::{MediaFetcher, RedditApi};
use async_trait::async_trait;
use repostbot_core::{
    CoreError, PostKind, RedditApiError, Submission, SubmittedPost, SubredditInfo,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Build a submission with sensible defaults for tests.
pub fn submission(id: &str, title: &str, score: i64) -> Submission {
    Submission {
        id: id.to_string(),
        name: format!("t3_{}", id),
        title: title.to_string(),
        subreddit: String::new(),
        url: format!("https://example.com/{}", id),
        score,
        num_comments: 0,
        stickied: false,
        created_utc: 0.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSubmission {
    pub subreddit: String,
    pub title: String,
    pub kind: PostKind,
    /// Link target for link posts, local file for image posts.
    pub target: String,
    /// Image bytes as they were on disk at submission time.
    pub image_bytes: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct FakeState {
    subscriptions: Vec<String>,
    info: HashMap<String, SubredditInfo>,
    new_posts: HashMap<String, Vec<Submission>>,
    hot_posts: HashMap<String, Vec<Submission>>,
    own_posts: Vec<Submission>,
    failing_subreddits: HashSet<String>,
    failing_approvals: HashSet<String>,
    fail_subscriptions: bool,
    fail_submissions: bool,
    fail_all_approvals: bool,
    unresolvable_images: bool,
    approved: Vec<String>,
    upvoted: Vec<String>,
    submissions: Vec<RecordedSubmission>,
    next_id: u64,
}

#[derive(Debug)]
pub struct FakeReddit {
    username: String,
    state: Mutex<FakeState>,
}

impl FakeReddit {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_subreddit(self, name: &str, subscribers: u64, created_utc: f64) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.subscriptions.push(name.to_string());
            state.info.insert(
                name.to_string(),
                SubredditInfo {
                    display_name: name.to_string(),
                    subscribers,
                    active_user_count: Some(subscribers / 100),
                    created_utc,
                },
            );
        }
        self
    }

    pub fn with_new_posts(self, subreddit: &str, posts: Vec<Submission>) -> Self {
        self.state
            .lock()
            .unwrap()
            .new_posts
            .insert(subreddit.to_string(), posts);
        self
    }

    pub fn with_hot_posts(self, subreddit: &str, posts: Vec<Submission>) -> Self {
        self.state
            .lock()
            .unwrap()
            .hot_posts
            .insert(subreddit.to_string(), posts);
        self
    }

    pub fn with_own_posts(self, posts: Vec<Submission>) -> Self {
        self.state.lock().unwrap().own_posts = posts;
        self
    }

    /// Every call scoped to `subreddit` fails with a server error.
    pub fn failing_subreddit(self, subreddit: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_subreddits
            .insert(subreddit.to_string());
        self
    }

    pub fn failing_subscriptions(self) -> Self {
        self.state.lock().unwrap().fail_subscriptions = true;
        self
    }

    pub fn failing_submissions(self) -> Self {
        self.state.lock().unwrap().fail_submissions = true;
        self
    }

    pub fn failing_approval(self, fullname: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_approvals
            .insert(fullname.to_string());
        self
    }

    pub fn failing_all_approvals(self) -> Self {
        self.state.lock().unwrap().fail_all_approvals = true;
        self
    }

    /// Image submissions are accepted but never show up on the profile.
    pub fn unresolvable_images(self) -> Self {
        self.state.lock().unwrap().unresolvable_images = true;
        self
    }

    pub fn approved(&self) -> Vec<String> {
        self.state.lock().unwrap().approved.clone()
    }

    pub fn upvoted(&self) -> Vec<String> {
        self.state.lock().unwrap().upvoted.clone()
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.state.lock().unwrap().submissions.clone()
    }

    fn check_subreddit(state: &FakeState, subreddit: &str) -> Result<(), CoreError> {
        if state.failing_subreddits.contains(subreddit) {
            return Err(server_error());
        }
        Ok(())
    }

    fn record_submission(
        &self,
        subreddit: &str,
        title: &str,
        kind: PostKind,
        target: String,
        image_bytes: Option<Vec<u8>>,
    ) -> Result<SubmittedPost, CoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_submissions {
            return Err(CoreError::RedditApi(RedditApiError::SubmissionRejected {
                reason: "SUBREDDIT_NOTALLOWED".to_string(),
            }));
        }

        state.submissions.push(RecordedSubmission {
            subreddit: subreddit.to_string(),
            title: title.to_string(),
            kind,
            target,
            image_bytes,
        });
        if kind == PostKind::Image && state.unresolvable_images {
            return Ok(SubmittedPost::unresolved(None));
        }

        state.next_id += 1;
        let id = format!("new{}", state.next_id);
        let mut own = submission(&id, title, 1);
        own.subreddit = subreddit.to_string();
        state.own_posts.insert(0, own.clone());

        Ok(SubmittedPost::new(id, own.name, Some(own.url)))
    }
}

fn server_error() -> CoreError {
    CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 })
}

#[async_trait]
impl RedditApi for FakeReddit {
    async fn me(&self) -> Result<String, CoreError> {
        Ok(self.username.clone())
    }

    async fn subscribed_subreddits(&self) -> Result<Vec<String>, CoreError> {
        let state = self.state.lock().unwrap();
        if state.fail_subscriptions {
            return Err(server_error());
        }
        Ok(state.subscriptions.clone())
    }

    async fn subreddit_info(&self, subreddit: &str) -> Result<SubredditInfo, CoreError> {
        let state = self.state.lock().unwrap();
        Self::check_subreddit(&state, subreddit)?;
        state.info.get(subreddit).cloned().ok_or_else(|| {
            CoreError::RedditApi(RedditApiError::SubredditNotFound {
                subreddit: subreddit.to_string(),
            })
        })
    }

    async fn new_submissions(
        &self,
        subreddit: &str,
        limit: usize,
    ) -> Result<Vec<Submission>, CoreError> {
        let state = self.state.lock().unwrap();
        Self::check_subreddit(&state, subreddit)?;
        let posts = state.new_posts.get(subreddit).cloned().unwrap_or_default();
        Ok(posts.into_iter().take(limit).collect())
    }

    async fn hot_submissions(
        &self,
        subreddit: &str,
        limit: usize,
    ) -> Result<Vec<Submission>, CoreError> {
        let state = self.state.lock().unwrap();
        Self::check_subreddit(&state, subreddit)?;
        let posts = state.hot_posts.get(subreddit).cloned().unwrap_or_default();
        Ok(posts.into_iter().take(limit).collect())
    }

    async fn user_submissions(
        &self,
        _user: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Submission>, CoreError> {
        let state = self.state.lock().unwrap();
        let posts = state.own_posts.iter().cloned();
        Ok(match limit {
            Some(limit) => posts.take(limit).collect(),
            None => posts.collect(),
        })
    }

    async fn approve(&self, fullname: &str) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_all_approvals || state.failing_approvals.contains(fullname) {
            return Err(CoreError::RedditApi(RedditApiError::Forbidden {
                resource: "/api/approve".to_string(),
            }));
        }
        state.approved.push(fullname.to_string());
        Ok(())
    }

    async fn upvote(&self, fullname: &str) -> Result<(), CoreError> {
        self.state.lock().unwrap().upvoted.push(fullname.to_string());
        Ok(())
    }

    async fn submit_link(
        &self,
        subreddit: &str,
        title: &str,
        url: &str,
    ) -> Result<SubmittedPost, CoreError> {
        self.record_submission(subreddit, title, PostKind::Link, url.to_string(), None)
    }

    async fn submit_image(
        &self,
        subreddit: &str,
        title: &str,
        image_path: &Path,
    ) -> Result<SubmittedPost, CoreError> {
        let bytes = std::fs::read(image_path)?;
        self.record_submission(
            subreddit,
            title,
            PostKind::Image,
            image_path.display().to_string(),
            Some(bytes),
        )
    }
}

/// Serves canned bytes per URL; unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct FakeMediaFetcher {
    content: HashMap<String, Vec<u8>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeMediaFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(mut self, url: &str, bytes: &[u8]) -> Self {
        self.content.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for FakeMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CoreError> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.content.get(url).cloned().ok_or_else(|| CoreError::Download {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Convenience for tests that only care where an image landed.
pub fn image_path_of(recorded: &RecordedSubmission) -> Option<PathBuf> {
    match recorded.kind {
        PostKind::Image => Some(PathBuf::from(&recorded.target)),
        PostKind::Link => None,
    }
}
