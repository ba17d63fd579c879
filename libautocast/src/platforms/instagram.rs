//! Instagram adapter (Instagram Graph API with Instagram Login)
//!
//! Instagram fetches images itself, so every post needs an image reachable
//! from the public internet.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::warn;

use super::{
    compose_post_text, expect_json, expect_success, resolve_public_image_url, truncate_chars,
    PlatformResult, PublishedPost, Publisher, SocialLead,
};
use crate::error::PlatformError;
use crate::oauth::OAuthApp;
use crate::types::{ContentItem, Platform, SocialAccount};

const GRAPH_VERSION: &str = "v21.0";
const MEDIA_SCANNED: usize = 2;
const LEAD_SCORE: u8 = 90;

#[derive(Deserialize)]
struct Me {
    user_id: Option<serde_json::Value>,
    id: Option<String>,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct Listing<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct MediaSummary {
    id: String,
}

#[derive(Deserialize)]
struct Comment {
    id: String,
    username: String,
    #[serde(default)]
    text: String,
}

pub struct InstagramPublisher {
    http: reqwest::Client,
    app: OAuthApp,
    public_base_url: Option<String>,
}

impl InstagramPublisher {
    pub fn new(http: reqwest::Client, app: OAuthApp, public_base_url: Option<String>) -> Self {
        Self {
            http,
            app,
            public_base_url,
        }
    }

    fn graph_url(&self, path: &str) -> String {
        self.app.api_url(&format!("/{}/{}", GRAPH_VERSION, path))
    }

    async fn user_id(&self, account: &SocialAccount) -> PlatformResult<String> {
        let response = self
            .http
            .get(self.graph_url("me"))
            .query(&[
                ("fields", "user_id,username"),
                ("access_token", account.access_token.as_str()),
            ])
            .send()
            .await?;
        let me: Me = expect_json(Platform::Instagram, response).await?;

        let user_id = match me.user_id {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        user_id.or(me.id).ok_or_else(|| PlatformError::Upstream {
            platform: Platform::Instagram.display_name().to_string(),
            status: 200,
            message: "profile response carried no user id".to_string(),
        })
    }

    async fn comments_on(&self, account: &SocialAccount, media_id: &str) -> PlatformResult<Vec<Comment>> {
        let response = self
            .http
            .get(self.graph_url(&format!("{}/comments", media_id)))
            .query(&[
                ("fields", "id,username,text,timestamp"),
                ("access_token", account.access_token.as_str()),
            ])
            .send()
            .await?;
        let comments: Listing<Comment> = expect_json(Platform::Instagram, response).await?;
        Ok(comments.data)
    }
}

#[async_trait]
impl Publisher for InstagramPublisher {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn supports_reply(&self) -> bool {
        true
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        item: &ContentItem,
    ) -> PlatformResult<PublishedPost> {
        let image_url = item.image_url.as_deref().ok_or_else(|| {
            PlatformError::Validation("Instagram requires an image to post".to_string())
        })?;
        let image_url = resolve_public_image_url(self.public_base_url.as_deref(), image_url)?;

        let user_id = self.user_id(account).await?;
        let caption = compose_post_text(&item.caption, &item.hashtags);

        let response = self
            .http
            .post(self.graph_url(&format!("{}/media", user_id)))
            .json(&json!({
                "image_url": image_url,
                "caption": caption,
                "access_token": account.access_token,
            }))
            .send()
            .await?;
        let container: IdResponse = expect_json(Platform::Instagram, response).await?;

        let response = self
            .http
            .post(self.graph_url(&format!("{}/media_publish", user_id)))
            .json(&json!({
                "creation_id": container.id,
                "access_token": account.access_token,
            }))
            .send()
            .await?;
        let published: IdResponse = expect_json(Platform::Instagram, response).await?;

        Ok(PublishedPost {
            url: format!("https://www.instagram.com/p/{}", published.id),
            id: published.id,
        })
    }

    async fn reply(&self, account: &SocialAccount, source_id: &str, text: &str) -> PlatformResult<()> {
        let response = self
            .http
            .post(self.graph_url(&format!("{}/replies", source_id)))
            .json(&json!({
                "message": text,
                "access_token": account.access_token,
            }))
            .send()
            .await?;

        expect_success(Platform::Instagram, response).await?;
        Ok(())
    }

    /// Commenters on the most recent media items, one lead per handle
    async fn search(&self, account: &SocialAccount, _keywords: &[String]) -> PlatformResult<Vec<SocialLead>> {
        let response = self
            .http
            .get(self.graph_url("me/media"))
            .query(&[
                ("fields", "id,caption"),
                ("access_token", account.access_token.as_str()),
            ])
            .send()
            .await?;
        let media: Listing<MediaSummary> = expect_json(Platform::Instagram, response).await?;

        let mut leads: Vec<SocialLead> = Vec::new();
        let mut by_handle: HashMap<String, usize> = HashMap::new();

        for post in media.data.iter().take(MEDIA_SCANNED) {
            // media with comments disabled answers non-2xx; keep what the rest yields
            let comments = match self.comments_on(account, &post.id).await {
                Ok(comments) => comments,
                Err(e) => {
                    warn!("Skipping comments on Instagram media {}: {}", post.id, e);
                    continue;
                }
            };

            for comment in comments {
                let handle = format!("@{}", comment.username);
                let lead = SocialLead {
                    platform: Platform::Instagram,
                    name: comment.username.clone(),
                    handle: handle.clone(),
                    profile_url: format!("https://instagram.com/{}", comment.username),
                    last_interaction: format!(
                        "Commented: \"{}...\"",
                        truncate_chars(&comment.text, 30)
                    ),
                    avatar_url: None,
                    score: LEAD_SCORE,
                    source_id: comment.id,
                };

                match by_handle.get(&handle) {
                    Some(&idx) => leads[idx] = lead,
                    None => {
                        by_handle.insert(handle, leads.len());
                        leads.push(lead);
                    }
                }
            }
        }

        Ok(leads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentStatus, ContentType};
    use chrono::Utc;

    fn account() -> SocialAccount {
        SocialAccount {
            id: "a".to_string(),
            project_id: "p".to_string(),
            platform: Platform::Instagram,
            username: "orbit".to_string(),
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: None,
            connected_at: Utc::now(),
        }
    }

    fn item(image_url: Option<&str>) -> ContentItem {
        ContentItem {
            id: "c1".to_string(),
            project_id: "p".to_string(),
            content_type: ContentType::Brand,
            caption: "The future belongs to builders".to_string(),
            hashtags: vec![],
            platform: Platform::Instagram,
            image_prompt: None,
            image_url: image_url.map(str::to_string),
            status: ContentStatus::Draft,
            post_url: None,
            created_at: Utc::now(),
        }
    }

    fn publisher(base: Option<&str>) -> InstagramPublisher {
        // Port 9 is discard; these tests must fail before any request goes out
        InstagramPublisher::new(
            reqwest::Client::new(),
            OAuthApp::unconfigured(Platform::Instagram).with_base("http://127.0.0.1:9"),
            base.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn test_publish_requires_image() {
        let err = publisher(Some("https://app.example.com"))
            .publish(&account(), &item(None))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PlatformError::Validation("Instagram requires an image to post".to_string())
        );
    }

    #[tokio::test]
    async fn test_publish_local_image_requires_public_base_url() {
        let err = publisher(None)
            .publish(&account(), &item(Some("/generated/c1.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation(_)));
    }
}
