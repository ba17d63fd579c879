//! Twitter/X adapter (API v2, OAuth 2.0 user context)

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{
    compose_post_text, expect_json, expect_success, image_mime, resolve_local_image,
    truncate_chars, PlatformResult, PublishedPost, Publisher, SocialLead,
};
use crate::error::PlatformError;
use crate::oauth::{refresh_grant, OAuthApp, TokenGrant};
use crate::types::{ContentItem, Platform, SocialAccount};

const SEARCH_MAX_RESULTS: &str = "10";
const LEAD_SCORE: u8 = 80;

#[derive(Deserialize)]
struct TweetResponse {
    data: TweetId,
}

#[derive(Deserialize)]
struct TweetId {
    id: String,
}

#[derive(Deserialize)]
struct MediaUploadResponse {
    data: Option<MediaId>,
    media_id_string: Option<String>,
}

#[derive(Deserialize)]
struct MediaId {
    id: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    data: Option<Vec<SearchTweet>>,
    includes: Option<SearchIncludes>,
}

#[derive(Deserialize)]
struct SearchTweet {
    id: String,
    text: String,
    author_id: Option<String>,
}

#[derive(Deserialize)]
struct SearchIncludes {
    #[serde(default)]
    users: Vec<SearchUser>,
}

#[derive(Deserialize)]
struct SearchUser {
    id: String,
    name: String,
    username: String,
    profile_image_url: Option<String>,
}

/// Recent-search query: first two keywords OR-ed, no retweets, English only
pub fn search_query(keywords: &[String]) -> Option<String> {
    let terms: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .take(2)
        .collect();

    if terms.is_empty() {
        return None;
    }

    Some(format!("({}) -is:retweet lang:en", terms.join(" OR ")))
}

pub struct TwitterPublisher {
    http: reqwest::Client,
    app: OAuthApp,
    public_dir: PathBuf,
}

impl TwitterPublisher {
    pub fn new(http: reqwest::Client, app: OAuthApp, public_dir: PathBuf) -> Self {
        Self {
            http,
            app,
            public_dir,
        }
    }

    async fn upload_media(&self, account: &SocialAccount, path: &Path) -> PlatformResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PlatformError::Media(format!("{}: {}", path.display(), e)))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.png")
            .to_string();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(image_mime(path))
            .map_err(|e| PlatformError::Media(e.to_string()))?;
        let form = Form::new()
            .part("media", part)
            .text("media_category", "tweet_image");

        let response = self
            .http
            .post(self.app.api_url("/2/media/upload"))
            .bearer_auth(&account.access_token)
            .multipart(form)
            .send()
            .await?;

        let uploaded: MediaUploadResponse = expect_json(Platform::Twitter, response).await?;
        uploaded
            .data
            .map(|d| d.id)
            .or(uploaded.media_id_string)
            .ok_or_else(|| PlatformError::Media("upload response carried no media id".to_string()))
    }

    /// Upload the item's local image if there is one. Any failure means text-only.
    async fn attach_media(&self, account: &SocialAccount, item: &ContentItem) -> Option<String> {
        let image_url = item.image_url.as_deref()?;
        let path = resolve_local_image(&self.public_dir, image_url)?;

        if !path.exists() {
            warn!(
                "Image {} for content {} not found, posting text only",
                path.display(),
                item.id
            );
            return None;
        }

        match self.upload_media(account, &path).await {
            Ok(media_id) => Some(media_id),
            Err(e) => {
                warn!("Twitter media upload failed, posting text only: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn supports_reply(&self) -> bool {
        true
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        item: &ContentItem,
    ) -> PlatformResult<PublishedPost> {
        let text = compose_post_text(&item.caption, &item.hashtags);
        let mut body = json!({ "text": text });
        if let Some(media_id) = self.attach_media(account, item).await {
            body["media"] = json!({ "media_ids": [media_id] });
        }

        let response = self
            .http
            .post(self.app.api_url("/2/tweets"))
            .bearer_auth(&account.access_token)
            .json(&body)
            .send()
            .await?;

        let tweet: TweetResponse = expect_json(Platform::Twitter, response).await?;
        debug!("Posted tweet {}", tweet.data.id);

        Ok(PublishedPost {
            url: format!(
                "https://twitter.com/{}/status/{}",
                account.username, tweet.data.id
            ),
            id: tweet.data.id,
        })
    }

    async fn reply(&self, account: &SocialAccount, source_id: &str, text: &str) -> PlatformResult<()> {
        let response = self
            .http
            .post(self.app.api_url("/2/tweets"))
            .bearer_auth(&account.access_token)
            .json(&json!({
                "text": text,
                "reply": { "in_reply_to_tweet_id": source_id },
            }))
            .send()
            .await?;

        expect_success(Platform::Twitter, response).await?;
        Ok(())
    }

    async fn search(&self, account: &SocialAccount, keywords: &[String]) -> PlatformResult<Vec<SocialLead>> {
        let Some(query) = search_query(keywords) else {
            return Ok(Vec::new());
        };

        let response = self
            .http
            .get(self.app.api_url("/2/tweets/search/recent"))
            .bearer_auth(&account.access_token)
            .query(&[
                ("query", query.as_str()),
                ("max_results", SEARCH_MAX_RESULTS),
                ("expansions", "author_id"),
                ("user.fields", "username,description,profile_image_url"),
            ])
            .send()
            .await?;

        let results: SearchResponse = expect_json(Platform::Twitter, response).await?;
        let users: HashMap<String, SearchUser> = results
            .includes
            .map(|i| i.users)
            .unwrap_or_default()
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let leads = results
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tweet| {
                let user = users.get(tweet.author_id.as_deref()?)?;
                Some(SocialLead {
                    platform: Platform::Twitter,
                    name: user.name.clone(),
                    handle: format!("@{}", user.username),
                    profile_url: format!("https://twitter.com/{}", user.username),
                    last_interaction: format!("Tweeted: \"{}...\"", truncate_chars(&tweet.text, 50)),
                    avatar_url: user.profile_image_url.clone(),
                    score: LEAD_SCORE,
                    source_id: tweet.id,
                })
            })
            .collect();

        Ok(leads)
    }

    async fn refresh(&self, refresh_token: &str) -> PlatformResult<TokenGrant> {
        refresh_grant(&self.http, &self.app, refresh_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_uses_first_two_keywords() {
        let keywords = vec![
            "hate manual marketing".to_string(),
            "need automation".to_string(),
            "ignored".to_string(),
        ];
        assert_eq!(
            search_query(&keywords).unwrap(),
            "(hate manual marketing OR need automation) -is:retweet lang:en"
        );
    }

    #[test]
    fn test_search_query_skips_blank_keywords() {
        assert_eq!(search_query(&[]), None);
        assert_eq!(search_query(&["  ".to_string()]), None);
        assert_eq!(
            search_query(&["".to_string(), "rust".to_string()]).unwrap(),
            "(rust) -is:retweet lang:en"
        );
    }

    #[test]
    fn test_twitter_supports_reply() {
        let publisher = TwitterPublisher::new(
            reqwest::Client::new(),
            OAuthApp::unconfigured(Platform::Twitter),
            PathBuf::from("/tmp"),
        );
        assert!(publisher.supports_reply());
        assert_eq!(publisher.platform(), Platform::Twitter);
    }
}
