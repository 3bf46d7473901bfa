//! Bot configuration.
//!
//! Loaded once at startup from a TOML file (every key optional) with the
//! Reddit credentials overridable from the environment. The resulting value
//! is immutable and handed to each component when it is constructed.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "REPOSTBOT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "repostbot.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEndpoints {
    pub base_url: String,
    pub token_url: String,
    pub authorize_url: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            base_url: "https://oauth.reddit.com".to_string(),
            token_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            authorize_url: "https://www.reddit.com/api/v1/authorize".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub credentials: RedditCredentials,
    pub api: ApiEndpoints,
    /// Optional cap on subscribed communities processed per cycle. Unset
    /// means every subscription is processed.
    pub subreddit_limit: Option<usize>,
    /// Posts must score strictly above this to be republished.
    pub score_threshold: i64,
    pub wait_time_secs: u64,
    pub post_delay_secs: u64,
    pub stats_delay_secs: u64,
    pub action_delay_secs: u64,
    pub error_backoff_secs: u64,
    pub base_folder: PathBuf,
    pub allowed_extensions: Vec<String>,
    pub max_title_length: usize,
    pub hot_limit: usize,
    pub new_limit: usize,
    pub upvote_limit: usize,
    pub selection_seed: Option<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            credentials: RedditCredentials {
                user_agent: "RedditBot/1.0".to_string(),
                ..RedditCredentials::default()
            },
            api: ApiEndpoints::default(),
            subreddit_limit: None,
            score_threshold: 10,
            wait_time_secs: 1800,
            post_delay_secs: 60,
            stats_delay_secs: 2,
            action_delay_secs: 2,
            error_backoff_secs: 60,
            base_folder: PathBuf::from("reddit_downloads"),
            allowed_extensions: vec![".jpg".to_string(), ".png".to_string(), ".gif".to_string()],
            max_title_length: 50,
            hot_limit: 10,
            new_limit: 1000,
            upvote_limit: 10,
            selection_seed: None,
        }
    }
}

impl BotConfig {
    /// Resolve the config path from `REPOSTBOT_CONFIG`, falling back to
    /// `repostbot.toml`, then load and validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    tracing::info!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidFormat {
            details: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Override credentials from `REDDIT_*` variables. `lookup` abstracts the
    /// environment so callers can supply their own source.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let creds = &mut self.credentials;
        let fields: [(&str, &mut String); 5] = [
            ("REDDIT_CLIENT_ID", &mut creds.client_id),
            ("REDDIT_CLIENT_SECRET", &mut creds.client_secret),
            ("REDDIT_USERNAME", &mut creds.username),
            ("REDDIT_PASSWORD", &mut creds.password),
            ("REDDIT_USER_AGENT", &mut creds.user_agent),
        ];
        for (key, slot) in fields {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = value;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let creds = &self.credentials;
        for (field, value) in [
            ("credentials.client_id", &creds.client_id),
            ("credentials.client_secret", &creds.client_secret),
            ("credentials.username", &creds.username),
            ("credentials.password", &creds.password),
            ("credentials.user_agent", &creds.user_agent),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        if self.max_title_length < 4 {
            return Err(ConfigError::InvalidValue {
                field: "max_title_length".to_string(),
                value: self.max_title_length.to_string(),
            });
        }

        if let Some(bad) = self
            .allowed_extensions
            .iter()
            .find(|ext| !ext.starts_with('.') || ext.len() < 2)
        {
            return Err(ConfigError::InvalidValue {
                field: "allowed_extensions".to_string(),
                value: bad.clone(),
            });
        }

        if self.hot_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "hot_limit".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs)
    }

    pub fn post_delay(&self) -> Duration {
        Duration::from_secs(self.post_delay_secs)
    }

    pub fn stats_delay(&self) -> Duration {
        Duration::from_secs(self.stats_delay_secs)
    }

    pub fn action_delay(&self) -> Duration {
        Duration::from_secs(self.action_delay_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}
