use crate::{HttpMediaFetcher, MediaFetcher, RedditApi, RedditClient};
use repostbot_core::{ApiEndpoints, CoreError, ErrorExt, RedditApiError, RedditCredentials};
use serde_json::json;
use std::path::PathBuf;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_credentials() -> RedditCredentials {
    RedditCredentials {
        client_id: "test_client_id".to_string(),
        client_secret: "test_client_secret".to_string(),
        username: "repost_bot".to_string(),
        password: "hunter2".to_string(),
        user_agent: "repostbot/1.0 by repost_bot".to_string(),
    }
}

fn client_for(server: &MockServer) -> RedditClient {
    let endpoints = ApiEndpoints {
        base_url: server.uri(),
        token_url: format!("{}/api/v1/access_token", server.uri()),
        ..ApiEndpoints::default()
    };
    RedditClient::new(&test_credentials(), &endpoints).unwrap()
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=repost_bot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "token_type": "bearer",
            "expires_in": 86400,
            "scope": "*"
        })))
        .mount(server)
        .await;
}

async fn mount_me(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/me"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "abc",
            "name": "repost_bot"
        })))
        .mount(server)
        .await;
}

async fn authenticated_client(server: &MockServer) -> RedditClient {
    mount_token(server).await;
    mount_me(server).await;
    let client = client_for(server);
    client.authenticate().await.unwrap();
    client
}

fn post_json(id: &str, title: &str, score: i64) -> serde_json::Value {
    json!({
        "kind": "t3",
        "data": {
            "id": id,
            "name": format!("t3_{}", id),
            "title": title,
            "subreddit": "pics",
            "url": format!("https://i.redd.it/{}.jpg", id),
            "created_utc": 1_700_000_000.0,
            "score": score,
            "num_comments": 3,
            "stickied": false
        }
    })
}

fn listing(children: Vec<serde_json::Value>, after: Option<&str>) -> serde_json::Value {
    json!({
        "kind": "Listing",
        "data": { "children": children, "after": after, "before": null }
    })
}

#[tokio::test]
async fn test_authenticate_returns_account_name() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_me(&server).await;

    let client = client_for(&server);
    assert!(!client.is_authenticated().await);

    let name = client.authenticate().await.unwrap();
    assert_eq!(name, "repost_bot");
    assert!(client.is_authenticated().await);
}

#[tokio::test]
async fn test_authenticate_with_bad_password_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "invalid_grant"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.authenticate().await.unwrap_err();

    match &err {
        CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason }) => {
            assert!(reason.contains("invalid_grant"));
        }
        other => panic!("Expected AuthenticationFailed, got {:?}", other),
    }
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_unreachable_token_endpoint_is_retryable() {
    // bind then release a port so nothing is listening on it
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let endpoints = ApiEndpoints {
        base_url: format!("http://{}", addr),
        token_url: format!("http://{}/api/v1/access_token", addr),
        ..ApiEndpoints::default()
    };
    let client = RedditClient::new(&test_credentials(), &endpoints).unwrap();

    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(err, CoreError::Network(_)), "got {:?}", err);
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_subscribed_subreddits_follows_pages() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/subreddits/mine/subscriber"))
        .and(query_param("after", "t5_b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(
            vec![json!({"kind": "t5", "data": {"display_name": "rust", "subscribers": 10}})],
            None,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/subreddits/mine/subscriber"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(
            vec![
                json!({"kind": "t5", "data": {"display_name": "pics", "subscribers": 10}}),
                json!({"kind": "t5", "data": {"display_name": "aww", "subscribers": 10}}),
            ],
            Some("t5_b"),
        )))
        .mount(&server)
        .await;

    let subs = client.subscribed_subreddits().await.unwrap();
    assert_eq!(subs, vec!["pics", "aww", "rust"]);
}

#[tokio::test]
async fn test_hot_submissions_are_converted() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/r/pics/hot"))
        .and(query_param("limit", "10"))
        .and(query_param("raw_json", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(
            vec![post_json("a1", "Sunset & sea", 120), post_json("a2", "Cat", 4)],
            None,
        )))
        .mount(&server)
        .await;

    let posts = client.hot_submissions("pics", 10).await.unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].name, "t3_a1");
    assert_eq!(posts[0].title, "Sunset & sea");
    assert_eq!(posts[0].score, 120);
    assert_eq!(posts[1].url, "https://i.redd.it/a2.jpg");
}

#[tokio::test]
async fn test_rate_limited_response() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/r/pics/new"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "17"))
        .mount(&server)
        .await;

    let err = client.new_submissions("pics", 100).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 17 })
    ));
}

#[tokio::test]
async fn test_unknown_subreddit() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/r/nope/about"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.subreddit_info("nope").await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::RedditApi(RedditApiError::SubredditNotFound { .. })
    ));
}

#[tokio::test]
async fn test_submit_link() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .and(body_string_contains("kind=link"))
        .and(body_string_contains("sr=u_repost_bot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "json": {
                "errors": [],
                "data": {
                    "id": "zz9",
                    "name": "t3_zz9",
                    "url": "https://www.reddit.com/user/repost_bot/comments/zz9/"
                }
            }
        })))
        .mount(&server)
        .await;

    let post = client
        .submit_link("u_repost_bot", "A title", "https://example.com/article")
        .await
        .unwrap();
    assert_eq!(post.name.as_deref(), Some("t3_zz9"));
    assert_eq!(post.id.as_deref(), Some("zz9"));
}

fn write_image(dir: &tempfile::TempDir) -> PathBuf {
    let file = dir.path().join("Harbor at dusk.png");
    std::fs::write(&file, b"PNGDATA").unwrap();
    file
}

async fn mount_upload_lease(server: &MockServer, fields: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/media/asset.json"))
        .and(body_string_contains("mimetype=image%2Fpng"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "args": {
                "action": format!("{}/upload", server.uri()),
                "fields": fields
            }
        })))
        .mount(server)
        .await;
}

async fn mount_image_upload(server: &MockServer) {
    mount_upload_lease(
        server,
        json!([
            {"name": "acl", "value": "public-read"},
            {"name": "key", "value": "rte/abc123/Harbor at dusk.png"}
        ]),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("public-read"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .and(body_string_contains("kind=image"))
        .and(body_string_contains("upload%2Frte%2Fabc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "json": { "errors": [] }
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_submit_image_uploads_then_finds_the_new_post() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;
    mount_image_upload(&server).await;

    Mock::given(method("GET"))
        .and(path("/user/repost_bot/submitted"))
        .and(query_param("sort", "new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(
            vec![post_json("old1", "Something else", 3), post_json("img1", "Harbor at dusk", 1)],
            None,
        )))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let post = client
        .submit_image("u_repost_bot", "Harbor at dusk", &write_image(&tmp))
        .await
        .unwrap();

    assert_eq!(post.name.as_deref(), Some("t3_img1"));
    assert_eq!(post.id.as_deref(), Some("img1"));
}

#[tokio::test]
async fn test_submit_image_unresolved_is_not_an_error() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;
    mount_image_upload(&server).await;

    Mock::given(method("GET"))
        .and(path("/user/repost_bot/submitted"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![], None)))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let post = client
        .submit_image("u_repost_bot", "Harbor at dusk", &write_image(&tmp))
        .await
        .unwrap();

    assert_eq!(post.name, None);
    assert_eq!(
        post.url,
        Some(format!("{}/upload/rte/abc123/Harbor at dusk.png", server.uri()))
    );
}

#[tokio::test]
async fn test_upload_lease_without_key_submits_nothing() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;
    mount_upload_lease(&server, json!([{"name": "acl", "value": "public-read"}])).await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"json": {"errors": []}})))
        .expect(0)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let err = client
        .submit_image("u_repost_bot", "Harbor at dusk", &write_image(&tmp))
        .await
        .unwrap_err();
    match err {
        CoreError::RedditApi(RedditApiError::InvalidResponse { details }) => {
            assert!(details.contains("upload key"));
        }
        other => panic!("Expected InvalidResponse, got {:?}", other),
    }
}

async fn token_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/api/v1/access_token")
        .count()
}

async fn mount_hot(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/r/pics/hot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![], None)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_long_lived_token_is_reused() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;
    mount_hot(&server).await;

    client.hot_submissions("pics", 10).await.unwrap();
    client.hot_submissions("pics", 10).await.unwrap();

    assert_eq!(token_requests(&server).await, 1);
}

#[tokio::test]
async fn test_token_near_expiry_is_renewed_before_requests() {
    let server = MockServer::start().await;
    // inside the renewal margin from the moment it is issued
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "token_type": "bearer",
            "expires_in": 30,
            "scope": "*"
        })))
        .mount(&server)
        .await;
    mount_me(&server).await;
    mount_hot(&server).await;

    let client = client_for(&server);
    client.authenticate().await.unwrap();
    assert_eq!(token_requests(&server).await, 2);

    client.hot_submissions("pics", 10).await.unwrap();
    client.hot_submissions("pics", 10).await.unwrap();
    assert_eq!(token_requests(&server).await, 4);
}

#[tokio::test]
async fn test_submit_rejected() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "json": {
                "errors": [["ALREADY_SUB", "that link has already been submitted", "url"]]
            }
        })))
        .mount(&server)
        .await;

    let err = client
        .submit_link("u_repost_bot", "A title", "https://example.com/article")
        .await
        .unwrap_err();
    match err {
        CoreError::RedditApi(RedditApiError::SubmissionRejected { reason }) => {
            assert!(reason.starts_with("ALREADY_SUB"));
        }
        other => panic!("Expected SubmissionRejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_approve_and_upvote_send_fullname() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/approve"))
        .and(body_string_contains("id=t3_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/vote"))
        .and(body_string_contains("dir=1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client.approve("t3_abc").await.unwrap();
    client.upvote("t3_abc").await.unwrap();
}

#[tokio::test]
async fn test_forbidden_approval() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/approve"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client.approve("t3_abc").await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::RedditApi(RedditApiError::Forbidden { .. })
    ));
}

#[tokio::test]
async fn test_media_fetcher() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = HttpMediaFetcher::new("repostbot/test").unwrap();

    let bytes = fetcher
        .fetch(&format!("{}/img.png", server.uri()))
        .await
        .unwrap();
    assert_eq!(bytes, vec![0x89, 0x50, 0x4e, 0x47]);

    let err = fetcher
        .fetch(&format!("{}/gone.png", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Download { status: 404, .. }));
}
