use oauth2::basic::{BasicClient, BasicErrorResponse};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError,
    ResourceOwnerPassword, ResourceOwnerUsername, TokenResponse, TokenUrl,
};
use repostbot_core::{ApiEndpoints, CoreError, RedditApiError, RedditCredentials};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Tokens are renewed this long before Reddit would reject them.
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    /// True once the token is within [`TOKEN_EXPIRY_MARGIN`] of expiring.
    pub fn needs_refresh(&self) -> bool {
        SystemTime::now() + TOKEN_EXPIRY_MARGIN >= self.expires_at
    }
}

/// Script-app authentication: the resource-owner password grant. Reddit
/// issues no refresh token for it, so renewal means authenticating again.
#[derive(Debug)]
pub struct PasswordAuthenticator {
    oauth_client: BasicClient,
    username: ResourceOwnerUsername,
    password: ResourceOwnerPassword,
    http_client: Client,
}

impl PasswordAuthenticator {
    pub fn new(
        credentials: &RedditCredentials,
        endpoints: &ApiEndpoints,
        http_client: Client,
    ) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(endpoints.authorize_url.clone()).map_err(|e| {
            invalid_endpoint("authorize_url", &endpoints.authorize_url, &e.to_string())
        })?;
        let token_url = TokenUrl::new(endpoints.token_url.clone())
            .map_err(|e| invalid_endpoint("token_url", &endpoints.token_url, &e.to_string()))?;

        let oauth_client = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        Ok(Self {
            oauth_client,
            username: ResourceOwnerUsername::new(credentials.username.clone()),
            password: ResourceOwnerPassword::new(credentials.password.clone()),
            http_client,
        })
    }

    pub async fn request_token(&self) -> Result<RedditToken, CoreError> {
        debug!("Requesting access token for {}", self.username.as_str());

        let response = self
            .oauth_client
            .exchange_password(&self.username, &self.password)
            .request_async(|request| send_token_request(&self.http_client, request))
            .await
            .map_err(token_error)?;

        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let scope = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        info!(
            "Obtained access token for {} (valid for {}s)",
            self.username.as_str(),
            lifetime.as_secs()
        );

        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + lifetime,
            scope,
        })
    }
}

/// Sends oauth2's token request through our own client so the configured
/// user agent is attached; Reddit throttles anonymous agents aggressively.
async fn send_token_request(
    client: &Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

/// Transport failures stay retryable; anything Reddit actually answered
/// means the credentials were refused.
fn token_error(error: RequestTokenError<reqwest::Error, BasicErrorResponse>) -> CoreError {
    let reason = match error {
        RequestTokenError::Request(e) => return CoreError::Network(e),
        RequestTokenError::ServerResponse(response) => response.error().as_ref().to_string(),
        // Reddit answers bad credentials with 200 and `{"error": "invalid_grant"}`
        RequestTokenError::Parse(_, body) => String::from_utf8_lossy(&body).into_owned(),
        RequestTokenError::Other(message) => message,
    };
    CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason })
}

fn invalid_endpoint(field: &str, value: &str, reason: &str) -> CoreError {
    CoreError::InvalidInput {
        message: format!("invalid {} '{}': {}", field, value, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry() {
        let now = SystemTime::now();

        let fresh = RedditToken {
            access_token: "fresh".to_string(),
            expires_at: now + Duration::from_secs(3600),
            scope: vec!["*".to_string()],
        };
        assert!(!fresh.is_expired());
        assert!(!fresh.needs_refresh());

        let almost = RedditToken {
            expires_at: now + Duration::from_secs(30),
            ..fresh.clone()
        };
        assert!(!almost.is_expired());
        assert!(almost.needs_refresh());

        let expired = RedditToken {
            expires_at: now - Duration::from_secs(1),
            ..fresh
        };
        assert!(expired.is_expired());
        assert!(expired.needs_refresh());
    }

    #[test]
    fn test_invalid_token_url_rejected() {
        let endpoints = ApiEndpoints {
            token_url: "not a url".to_string(),
            ..ApiEndpoints::default()
        };
        let result =
            PasswordAuthenticator::new(&RedditCredentials::default(), &endpoints, Client::new());
        assert!(matches!(result, Err(CoreError::InvalidInput { .. })));
    }
}
