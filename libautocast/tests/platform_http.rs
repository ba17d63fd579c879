//! Platform adapters against mocked HTTP APIs

use chrono::Utc;
use libautocast::error::PlatformError;
use libautocast::oauth::OAuthApp;
use libautocast::platforms::instagram::InstagramPublisher;
use libautocast::platforms::linkedin::LinkedInPublisher;
use libautocast::platforms::twitter::TwitterPublisher;
use libautocast::platforms::Publisher;
use libautocast::types::{ContentItem, ContentStatus, ContentType, Platform, SocialAccount};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn account(platform: Platform) -> SocialAccount {
    SocialAccount {
        id: "acct-1".to_string(),
        project_id: "p1".to_string(),
        platform,
        username: "orbit".to_string(),
        access_token: "access-123".to_string(),
        refresh_token: None,
        expires_at: None,
        connected_at: Utc::now(),
    }
}

fn item(platform: Platform, image_url: Option<&str>) -> ContentItem {
    ContentItem {
        id: "c1".to_string(),
        project_id: "p1".to_string(),
        content_type: ContentType::Feature,
        caption: "Feature spotlight".to_string(),
        hashtags: vec!["rust".to_string(), "#oss".to_string()],
        platform,
        image_prompt: None,
        image_url: image_url.map(str::to_string),
        status: ContentStatus::Draft,
        post_url: None,
        created_at: Utc::now(),
    }
}

fn write_image(public_dir: &Path) {
    let generated = public_dir.join("generated");
    fs::create_dir_all(&generated).unwrap();
    fs::write(generated.join("c1.png"), b"\x89PNG test").unwrap();
}

fn twitter(server: &MockServer, public_dir: &Path) -> TwitterPublisher {
    TwitterPublisher::new(
        reqwest::Client::new(),
        OAuthApp::new(Platform::Twitter, "tw-client", None).with_base(&server.uri()),
        public_dir.to_path_buf(),
    )
}

fn linkedin(server: &MockServer, public_dir: &Path) -> LinkedInPublisher {
    LinkedInPublisher::new(
        reqwest::Client::new(),
        OAuthApp::new(Platform::LinkedIn, "li-client", None).with_base(&server.uri()),
        public_dir.to_path_buf(),
    )
}

fn instagram(server: &MockServer) -> InstagramPublisher {
    InstagramPublisher::new(
        reqwest::Client::new(),
        OAuthApp::new(Platform::Instagram, "ig-client", None).with_base(&server.uri()),
        Some("https://app.example.com".to_string()),
    )
}

#[tokio::test]
async fn test_twitter_publish_with_uploaded_media() {
    let server = MockServer::start().await;
    let public = TempDir::new().unwrap();
    write_image(public.path());

    Mock::given(method("POST"))
        .and(path("/2/media/upload"))
        .and(header("authorization", "Bearer access-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "m-77"}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(body_partial_json(json!({
            "text": "Feature spotlight\n\n#rust #oss",
            "media": {"media_ids": ["m-77"]}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "1800"}})))
        .expect(1)
        .mount(&server)
        .await;

    let post = twitter(&server, public.path())
        .publish(&account(Platform::Twitter), &item(Platform::Twitter, Some("/generated/c1.png")))
        .await
        .unwrap();
    assert_eq!(post.url, "https://twitter.com/orbit/status/1800");
}

#[tokio::test]
async fn test_twitter_missing_image_posts_text_only() {
    let server = MockServer::start().await;
    let public = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/2/media/upload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "1801"}})))
        .expect(1)
        .mount(&server)
        .await;

    let post = twitter(&server, public.path())
        .publish(&account(Platform::Twitter), &item(Platform::Twitter, Some("/generated/c1.png")))
        .await
        .unwrap();
    assert_eq!(post.id, "1801");
}

#[tokio::test]
async fn test_twitter_upload_failure_degrades_to_text() {
    let server = MockServer::start().await;
    let public = TempDir::new().unwrap();
    write_image(public.path());

    Mock::given(method("POST"))
        .and(path("/2/media/upload"))
        .respond_with(ResponseTemplate::new(500).set_body_string("media backend down"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "1802"}})))
        .expect(1)
        .mount(&server)
        .await;

    let post = twitter(&server, public.path())
        .publish(&account(Platform::Twitter), &item(Platform::Twitter, Some("/generated/c1.png")))
        .await
        .unwrap();
    assert_eq!(post.id, "1802");

    let requests = server.received_requests().await.unwrap();
    let tweet = requests
        .iter()
        .find(|r| r.url.path() == "/2/tweets")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&tweet.body).unwrap();
    assert!(body.get("media").is_none());
}

#[tokio::test]
async fn test_twitter_rejection_is_upstream_error() {
    let server = MockServer::start().await;
    let public = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(403).set_body_string("duplicate content"))
        .mount(&server)
        .await;

    let err = twitter(&server, public.path())
        .publish(&account(Platform::Twitter), &item(Platform::Twitter, None))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PlatformError::Upstream {
            platform: "Twitter".to_string(),
            status: 403,
            message: "duplicate content".to_string(),
        }
    );
}

#[tokio::test]
async fn test_twitter_reply_targets_source_tweet() {
    let server = MockServer::start().await;
    let public = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(body_partial_json(json!({
            "text": "Have you tried batching?",
            "reply": {"in_reply_to_tweet_id": "post123"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "1803"}})))
        .expect(1)
        .mount(&server)
        .await;

    twitter(&server, public.path())
        .reply(&account(Platform::Twitter), "post123", "Have you tried batching?")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_twitter_search_maps_authors() {
    let server = MockServer::start().await;
    let public = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .and(query_param("query", "(manual marketing OR automation) -is:retweet lang:en"))
        .and(query_param("max_results", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "t1", "text": "I hate doing manual marketing for my side project every single day", "author_id": "u1"},
                {"id": "t2", "text": "orphan tweet", "author_id": "missing"}
            ],
            "includes": {"users": [
                {"id": "u1", "name": "Dana", "username": "dana_dev", "profile_image_url": "https://img/d.png"}
            ]}
        })))
        .mount(&server)
        .await;

    let leads = twitter(&server, public.path())
        .search(
            &account(Platform::Twitter),
            &["manual marketing".to_string(), "automation".to_string(), "extra".to_string()],
        )
        .await
        .unwrap();

    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].handle, "@dana_dev");
    assert_eq!(leads[0].source_id, "t1");
    assert_eq!(leads[0].score, 80);
    assert_eq!(
        leads[0].last_interaction,
        "Tweeted: \"I hate doing manual marketing for my side project ...\""
    );
}

#[tokio::test]
async fn test_linkedin_text_post_uses_restli_header_id() {
    let server = MockServer::start().await;
    let public = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/v2/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sub": "abc123"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/ugcPosts"))
        .and(header("X-Restli-Protocol-Version", "2.0.0"))
        .and(body_partial_json(json!({
            "author": "urn:li:person:abc123",
            "specificContent": {"com.linkedin.ugc.ShareContent": {"shareMediaCategory": "NONE"}}
        })))
        .respond_with(ResponseTemplate::new(201).insert_header("x-restli-id", "urn:li:share:42"))
        .expect(1)
        .mount(&server)
        .await;

    let post = linkedin(&server, public.path())
        .publish(&account(Platform::LinkedIn), &item(Platform::LinkedIn, None))
        .await
        .unwrap();
    assert_eq!(post.url, "https://www.linkedin.com/feed/update/urn:li:share:42");
}

#[tokio::test]
async fn test_linkedin_image_failure_fails_publish() {
    let server = MockServer::start().await;
    let public = TempDir::new().unwrap();
    write_image(public.path());

    Mock::given(method("GET"))
        .and(path("/v2/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sub": "abc123"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/assets"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/ugcPosts"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let err = linkedin(&server, public.path())
        .publish(&account(Platform::LinkedIn), &item(Platform::LinkedIn, Some("/generated/c1.png")))
        .await
        .unwrap_err();
    assert!(matches!(err, PlatformError::Media(_)));
}

#[tokio::test]
async fn test_linkedin_image_post_references_asset() {
    let server = MockServer::start().await;
    let public = TempDir::new().unwrap();
    write_image(public.path());

    Mock::given(method("GET"))
        .and(path("/v2/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sub": "abc123"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/assets"))
        .and(query_param("action", "registerUpload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": {
                "asset": "urn:li:digitalmediaAsset:A1",
                "uploadMechanism": {
                    "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest": {
                        "uploadUrl": format!("{}/upload/A1", server.uri())
                    }
                }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/A1"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/ugcPosts"))
        .and(body_partial_json(json!({
            "specificContent": {"com.linkedin.ugc.ShareContent": {
                "shareMediaCategory": "IMAGE",
                "media": [{"status": "READY", "media": "urn:li:digitalmediaAsset:A1"}]
            }}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "urn:li:share:43"})))
        .expect(1)
        .mount(&server)
        .await;

    let post = linkedin(&server, public.path())
        .publish(&account(Platform::LinkedIn), &item(Platform::LinkedIn, Some("/generated/c1.png")))
        .await
        .unwrap();
    assert_eq!(post.id, "urn:li:share:43");
}

#[tokio::test]
async fn test_instagram_publish_container_flow() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v21.0/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user_id": 17841400, "username": "orbit"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v21.0/17841400/media"))
        .and(body_partial_json(json!({
            "image_url": "https://app.example.com/generated/c1.png"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "container-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v21.0/17841400/media_publish"))
        .and(body_partial_json(json!({"creation_id": "container-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "media-9"})))
        .expect(1)
        .mount(&server)
        .await;

    let post = instagram(&server)
        .publish(&account(Platform::Instagram), &item(Platform::Instagram, Some("/generated/c1.png")))
        .await
        .unwrap();
    assert_eq!(post.url, "https://www.instagram.com/p/media-9");
}

#[tokio::test]
async fn test_instagram_search_dedups_commenters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v21.0/me/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "m1"}, {"id": "m2"}, {"id": "m3"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v21.0/m1/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "c-a1", "username": "alex", "text": "first comment"},
                {"id": "c-b1", "username": "blair", "text": "love it"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v21.0/m2/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "c-a2", "username": "alex", "text": "second comment"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v21.0/m3/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(0)
        .mount(&server)
        .await;

    let leads = instagram(&server)
        .search(&account(Platform::Instagram), &[])
        .await
        .unwrap();

    assert_eq!(leads.len(), 2);
    assert_eq!(leads[0].handle, "@alex");
    assert_eq!(leads[0].source_id, "c-a2");
    assert_eq!(leads[0].last_interaction, "Commented: \"second comment...\"");
    assert_eq!(leads[1].handle, "@blair");
    assert_eq!(leads[1].score, 90);
}

#[tokio::test]
async fn test_instagram_search_skips_media_with_failed_comments() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v21.0/me/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "m1"}, {"id": "m2"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v21.0/m1/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "c-a1", "username": "alex", "text": "where can I sign up"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v21.0/m2/comments"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "Comments are disabled for this media"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let leads = instagram(&server)
        .search(&account(Platform::Instagram), &[])
        .await
        .unwrap();

    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].handle, "@alex");
    assert_eq!(leads[0].source_id, "c-a1");
}

#[tokio::test]
async fn test_instagram_reply_posts_to_comment_replies() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v21.0/c-a2/replies"))
        .and(body_partial_json(json!({"message": "Thanks Alex!"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "r1"})))
        .expect(1)
        .mount(&server)
        .await;

    instagram(&server)
        .reply(&account(Platform::Instagram), "c-a2", "Thanks Alex!")
        .await
        .unwrap();
}
