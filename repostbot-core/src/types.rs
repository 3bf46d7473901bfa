use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A post as exposed by the Reddit API. Read-only from the bot's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    /// Fullname (`t3_<id>`), the identifier moderation endpoints expect.
    pub name: String,
    pub title: String,
    pub subreddit: String,
    pub url: String,
    pub score: i64,
    pub num_comments: u64,
    pub stickied: bool,
    pub created_utc: f64,
}

impl Submission {
    pub fn created_at(&self) -> DateTime<Utc> {
        timestamp_to_utc(self.created_utc)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubredditInfo {
    pub display_name: String,
    pub subscribers: u64,
    pub active_user_count: Option<u64>,
    pub created_utc: f64,
}

impl SubredditInfo {
    pub fn created_at(&self) -> DateTime<Utc> {
        timestamp_to_utc(self.created_utc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostKind {
    Image,
    Link,
}

impl std::fmt::Display for PostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostKind::Image => write!(f, "image"),
            PostKind::Link => write!(f, "link"),
        }
    }
}

/// The post created by a successful submission.
///
/// `id` and `name` are `None` when the submission was accepted but the
/// new post could not be located afterwards (image posts only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedPost {
    pub id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
}

impl SubmittedPost {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: Option<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            url,
        }
    }

    /// Accepted by Reddit, but its fullname is unknown.
    pub fn unresolved(url: Option<String>) -> Self {
        Self {
            id: None,
            name: None,
            url,
        }
    }
}

/// Reddit timestamps are fractional seconds since the epoch.
pub fn timestamp_to_utc(seconds: f64) -> DateTime<Utc> {
    let whole = seconds.trunc() as i64;
    let nanos = ((seconds.fract().abs()) * 1_000_000_000.0) as u32;
    Utc.timestamp_opt(whole, nanos)
        .single()
        .unwrap_or_default()
}
