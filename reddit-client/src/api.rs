use crate::auth::{PasswordAuthenticator, RedditToken};
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::RedditApi;
use async_trait::async_trait;
use repostbot_core::{
    ApiEndpoints, CoreError, RedditApiError, RedditCredentials, Submission, SubmittedPost,
    SubredditInfo,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Reddit caps listing pages at 100 items.
const PAGE_SIZE: usize = 100;

/// Image posts are finalised asynchronously; poll the profile this many times.
const IMAGE_RESOLVE_ATTEMPTS: u32 = 3;
const IMAGE_RESOLVE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub stickied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditUserData {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditSubredditData {
    pub display_name: String,
    #[serde(default)]
    pub subscribers: Option<u64>,
    #[serde(default)]
    pub active_user_count: Option<u64>,
    #[serde(default)]
    pub created_utc: f64,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    json: SubmitJson,
}

#[derive(Debug, Deserialize)]
struct SubmitJson {
    #[serde(default)]
    errors: Vec<Vec<serde_json::Value>>,
    data: Option<SubmitData>,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    id: Option<String>,
    name: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaAssetResponse {
    args: UploadLease,
}

#[derive(Debug, Deserialize)]
struct UploadLease {
    action: String,
    fields: Vec<UploadField>,
}

#[derive(Debug, Deserialize)]
struct UploadField {
    name: String,
    value: String,
}

/// Authenticated Reddit client for a script application.
#[derive(Debug)]
pub struct RedditClient {
    http_client: Client,
    authenticator: PasswordAuthenticator,
    token: RwLock<Option<RedditToken>>,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
    username: String,
}

impl RedditClient {
    pub fn new(
        credentials: &RedditCredentials,
        endpoints: &ApiEndpoints,
    ) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&credentials.user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        let authenticator =
            PasswordAuthenticator::new(credentials, endpoints, http_client.clone())?;

        Ok(Self {
            http_client,
            authenticator,
            token: RwLock::new(None),
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::reddit_oauth())?),
            base_url: endpoints.base_url.trim_end_matches('/').to_string(),
            username: credentials.username.clone(),
        })
    }

    /// Obtain a token and confirm it by fetching the account identity.
    pub async fn authenticate(&self) -> Result<String, CoreError> {
        let token = self.authenticator.request_token().await?;
        *self.token.write().await = Some(token);

        let name = self.me().await.map_err(|e| match e {
            CoreError::RedditApi(RedditApiError::InvalidToken) => {
                CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                    reason: "token rejected by /api/v1/me".to_string(),
                })
            }
            other => other,
        })?;
        info!("Authenticated as: {}", name);
        Ok(name)
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(&*self.token.read().await, Some(token) if !token.is_expired())
    }

    async fn access_token(&self) -> Result<String, CoreError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if !token.needs_refresh() {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Access token missing or about to expire, re-authenticating");
        let token = self.authenticator.request_token().await?;
        let access_token = token.access_token.clone();
        *self.token.write().await = Some(token);
        Ok(access_token)
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: Option<&[(&str, &str)]>,
        form: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let access_token = self.access_token().await?;

        let waited = self.rate_limiter.acquire().await;
        if waited > Duration::from_millis(100) {
            debug!("Waited {:?} for rate limit before {} {}", waited, method, endpoint);
        }

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }
        if let Some(fields) = form {
            request_builder = request_builder.form(fields);
        }

        let start_time = Instant::now();
        debug!("Making Reddit API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        debug!(
            "{} {} -> {} in {:?}",
            method,
            endpoint,
            status,
            start_time.elapsed()
        );

        if status.is_success() {
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        let err = match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                RedditApiError::RateLimitExceeded { retry_after }
            }
            401 => RedditApiError::InvalidToken,
            403 => RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            },
            404 => RedditApiError::InvalidResponse {
                details: format!("Resource not found: {}", endpoint),
            },
            code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
            code => RedditApiError::InvalidResponse {
                details: format!("Unexpected status {} for {}", code, endpoint),
            },
        };
        Err(CoreError::RedditApi(err))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> Result<T, CoreError> {
        let response = self
            .make_request(Method::GET, endpoint, Some(query_params), None)
            .await?;
        parse_json(response, endpoint).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: &[(&str, &str)],
    ) -> Result<T, CoreError> {
        let response = self
            .make_request(Method::POST, endpoint, None, Some(form))
            .await?;
        parse_json(response, endpoint).await
    }

    /// Follow `after` cursors until `limit` items are collected or the
    /// listing runs out.
    async fn fetch_listing<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        limit: Option<usize>,
        extra_params: &[(&str, &str)],
    ) -> Result<Vec<T>, CoreError> {
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let remaining = limit.map(|l| l.saturating_sub(items.len()));
            if remaining == Some(0) {
                break;
            }
            let page_size = remaining.unwrap_or(PAGE_SIZE).min(PAGE_SIZE).to_string();

            let mut params: Vec<(&str, &str)> = extra_params.to_vec();
            params.push(("limit", page_size.as_str()));
            params.push(("raw_json", "1"));
            if let Some(cursor) = after.as_deref() {
                params.push(("after", cursor));
            }

            let listing: RedditListing<T> = self.get_json(endpoint, &params).await?;
            let fetched = listing.data.children.len();
            items.extend(listing.data.children.into_iter().map(|child| child.data));

            after = listing.data.after;
            if after.is_none() || fetched == 0 {
                break;
            }
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }
        debug!("Retrieved {} items from {}", items.len(), endpoint);
        Ok(items)
    }

    async fn fetch_submissions(
        &self,
        endpoint: &str,
        limit: Option<usize>,
        extra_params: &[(&str, &str)],
    ) -> Result<Vec<Submission>, CoreError> {
        let posts: Vec<RedditPostData> = self.fetch_listing(endpoint, limit, extra_params).await?;
        Ok(posts.into_iter().map(Submission::from).collect())
    }

    async fn submit(
        &self,
        subreddit: &str,
        title: &str,
        kind: &str,
        url: &str,
    ) -> Result<Option<SubmitData>, CoreError> {
        let form = [
            ("api_type", "json"),
            ("sr", subreddit),
            ("kind", kind),
            ("title", title),
            ("url", url),
            ("resubmit", "true"),
            ("sendreplies", "false"),
        ];
        let response: SubmitResponse = self.post_form("/api/submit", &form).await?;

        if !response.json.errors.is_empty() {
            let reason = response
                .json
                .errors
                .iter()
                .map(|e| {
                    e.iter()
                        .filter_map(|part| part.as_str())
                        .collect::<Vec<_>>()
                        .join(": ")
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CoreError::RedditApi(RedditApiError::SubmissionRejected {
                reason,
            }));
        }

        Ok(response.json.data)
    }

    /// Lease an upload slot, push the file to it and return the hosted URL.
    async fn upload_media(&self, image_path: &Path) -> Result<String, CoreError> {
        let file_name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CoreError::InvalidInput {
                message: format!("image path has no file name: {}", image_path.display()),
            })?
            .to_string();
        let mime_type = mime_for(image_path);
        let bytes = tokio::fs::read(image_path).await?;

        let lease: MediaAssetResponse = self
            .post_form(
                "/api/media/asset.json",
                &[("filepath", file_name.as_str()), ("mimetype", mime_type)],
            )
            .await?;

        let upload_url = if lease.args.action.starts_with("//") {
            format!("https:{}", lease.args.action)
        } else {
            lease.args.action.clone()
        };

        let mut key = None;
        let mut form = Form::new();
        for field in lease.args.fields {
            if field.name == "key" {
                key = Some(field.value.clone());
            }
            form = form.text(field.name, field.value);
        }
        let key = key.ok_or_else(|| {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: "media lease without upload key".to_string(),
            })
        })?;

        let part = Part::bytes(bytes).file_name(file_name).mime_str(mime_type)?;
        form = form.part("file", part);

        let response = self
            .http_client
            .post(upload_url.as_str())
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("media upload failed with status {}", response.status()),
            }));
        }

        Ok(format!("{}/{}", upload_url, key))
    }

    /// Image submissions return no post id; find the new post on the profile.
    ///
    /// The submission already succeeded at this point, so a post that never
    /// shows up (or a profile listing that keeps failing) yields an
    /// unresolved post rather than an error.
    async fn resolve_submitted(&self, title: &str, hosted_url: &str) -> SubmittedPost {
        for attempt in 1..=IMAGE_RESOLVE_ATTEMPTS {
            match self.user_submissions(&self.username, Some(10)).await {
                Ok(recent) => {
                    if let Some(post) = recent.into_iter().find(|p| p.title == title) {
                        return SubmittedPost::new(post.id, post.name, Some(post.url));
                    }
                    debug!(
                        "Image post '{}' not visible yet (attempt {}/{})",
                        title, attempt, IMAGE_RESOLVE_ATTEMPTS
                    );
                }
                Err(e) => warn!(
                    "Could not list own posts to find '{}' (attempt {}/{}): {}",
                    title, attempt, IMAGE_RESOLVE_ATTEMPTS, e
                ),
            }
            if attempt < IMAGE_RESOLVE_ATTEMPTS {
                tokio::time::sleep(IMAGE_RESOLVE_DELAY).await;
            }
        }

        warn!("Submitted image post '{}' never appeared on the profile", title);
        SubmittedPost::unresolved(Some(hosted_url.to_string()))
    }
}

#[async_trait]
impl RedditApi for RedditClient {
    async fn me(&self) -> Result<String, CoreError> {
        let user: RedditUserData = self.get_json("/api/v1/me", &[("raw_json", "1")]).await?;
        debug!("Retrieved user info for: {}", user.name);
        Ok(user.name)
    }

    async fn subscribed_subreddits(&self) -> Result<Vec<String>, CoreError> {
        let subreddits: Vec<RedditSubredditData> = self
            .fetch_listing("/subreddits/mine/subscriber", None, &[])
            .await?;
        info!("Subreddits found: {}", subreddits.len());
        Ok(subreddits.into_iter().map(|s| s.display_name).collect())
    }

    async fn subreddit_info(&self, subreddit: &str) -> Result<SubredditInfo, CoreError> {
        let endpoint = format!("/r/{}/about", subreddit);
        let about: RedditListingChild<RedditSubredditData> = self
            .get_json(&endpoint, &[("raw_json", "1")])
            .await
            .map_err(|e| match e {
                CoreError::RedditApi(RedditApiError::InvalidResponse { .. }) => {
                    CoreError::RedditApi(RedditApiError::SubredditNotFound {
                        subreddit: subreddit.to_string(),
                    })
                }
                other => other,
            })?;
        Ok(about.data.into())
    }

    async fn new_submissions(
        &self,
        subreddit: &str,
        limit: usize,
    ) -> Result<Vec<Submission>, CoreError> {
        let endpoint = format!("/r/{}/new", subreddit);
        self.fetch_submissions(&endpoint, Some(limit), &[]).await
    }

    async fn hot_submissions(
        &self,
        subreddit: &str,
        limit: usize,
    ) -> Result<Vec<Submission>, CoreError> {
        let endpoint = format!("/r/{}/hot", subreddit);
        self.fetch_submissions(&endpoint, Some(limit), &[]).await
    }

    async fn user_submissions(
        &self,
        user: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Submission>, CoreError> {
        let endpoint = format!("/user/{}/submitted", user);
        self.fetch_submissions(&endpoint, limit, &[("sort", "new")])
            .await
    }

    async fn approve(&self, fullname: &str) -> Result<(), CoreError> {
        self.make_request(Method::POST, "/api/approve", None, Some(&[("id", fullname)]))
            .await?;
        Ok(())
    }

    async fn upvote(&self, fullname: &str) -> Result<(), CoreError> {
        self.make_request(
            Method::POST,
            "/api/vote",
            None,
            Some(&[("id", fullname), ("dir", "1")]),
        )
        .await?;
        Ok(())
    }

    async fn submit_link(
        &self,
        subreddit: &str,
        title: &str,
        url: &str,
    ) -> Result<SubmittedPost, CoreError> {
        let data = self.submit(subreddit, title, "link", url).await?;
        match data {
            Some(SubmitData {
                id: Some(id),
                name: Some(name),
                url,
            }) => Ok(SubmittedPost::new(id, name, url)),
            _ => Err(CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: "submit response without post id".to_string(),
            })),
        }
    }

    async fn submit_image(
        &self,
        subreddit: &str,
        title: &str,
        image_path: &Path,
    ) -> Result<SubmittedPost, CoreError> {
        let hosted_url = self.upload_media(image_path).await?;
        self.submit(subreddit, title, "image", &hosted_url).await?;
        Ok(self.resolve_submitted(title, &hosted_url).await)
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T, CoreError> {
    response.json::<T>().await.map_err(|e| {
        error!("Failed to parse response from {}: {}", endpoint, e);
        CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: format!("Failed to parse response from {}", endpoint),
        })
    })
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

impl From<RedditPostData> for Submission {
    fn from(post_data: RedditPostData) -> Self {
        Self {
            id: post_data.id,
            name: post_data.name,
            title: post_data.title,
            subreddit: post_data.subreddit,
            url: post_data.url,
            score: post_data.score,
            num_comments: post_data.num_comments,
            stickied: post_data.stickied,
            created_utc: post_data.created_utc,
        }
    }
}

impl From<RedditSubredditData> for SubredditInfo {
    fn from(data: RedditSubredditData) -> Self {
        Self {
            display_name: data.display_name,
            subscribers: data.subscribers.unwrap_or(0),
            active_user_count: data.active_user_count,
            created_utc: data.created_utc,
        }
    }
}
