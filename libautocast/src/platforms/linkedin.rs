//! LinkedIn adapter (UGC posts API)
//!
//! Publish only. LinkedIn offers no reply or search API to member apps, so
//! those use the trait defaults.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::debug;

use super::{
    compose_post_text, expect_json, expect_success, image_mime, resolve_local_image,
    PlatformResult, PublishedPost, Publisher,
};
use crate::error::PlatformError;
use crate::oauth::{refresh_grant, OAuthApp, TokenGrant};
use crate::types::{ContentItem, Platform, SocialAccount};

const UPLOAD_MECHANISM: &str = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest";

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
}

#[derive(Deserialize)]
struct RegisterUploadResponse {
    value: RegisterUploadValue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterUploadValue {
    asset: Option<String>,
    upload_mechanism: Option<Value>,
}

#[derive(Deserialize)]
struct UgcPostResponse {
    id: Option<String>,
}

struct ImageBytes {
    bytes: Vec<u8>,
    mime: &'static str,
}

pub struct LinkedInPublisher {
    http: reqwest::Client,
    app: OAuthApp,
    public_dir: PathBuf,
}

impl LinkedInPublisher {
    pub fn new(http: reqwest::Client, app: OAuthApp, public_dir: PathBuf) -> Self {
        Self {
            http,
            app,
            public_dir,
        }
    }

    async fn person_urn(&self, account: &SocialAccount) -> PlatformResult<String> {
        let response = self
            .http
            .get(self.app.api_url("/v2/userinfo"))
            .bearer_auth(&account.access_token)
            .send()
            .await?;
        let info: UserInfo = expect_json(Platform::LinkedIn, response).await?;
        Ok(format!("urn:li:person:{}", info.sub))
    }

    async fn load_image(&self, image_url: &str) -> PlatformResult<ImageBytes> {
        if let Some(path) = resolve_local_image(&self.public_dir, image_url) {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| PlatformError::Media(format!("{}: {}", path.display(), e)))?;
            return Ok(ImageBytes {
                bytes,
                mime: image_mime(&path),
            });
        }

        if !image_url.starts_with("http") {
            return Err(PlatformError::Media(format!("Unusable image path {}", image_url)));
        }

        let response = self.http.get(image_url).send().await?;
        let response = expect_success(Platform::LinkedIn, response)
            .await
            .map_err(|e| PlatformError::Media(format!("Image download failed: {}", e)))?;
        let bytes = response.bytes().await?;
        Ok(ImageBytes {
            bytes: bytes.to_vec(),
            mime: image_mime(std::path::Path::new(image_url)),
        })
    }

    /// Register an upload slot, PUT the image, return the asset URN
    async fn upload_image(
        &self,
        account: &SocialAccount,
        owner: &str,
        image_url: &str,
    ) -> PlatformResult<String> {
        let image = self.load_image(image_url).await?;

        let response = self
            .http
            .post(self.app.api_url("/v2/assets?action=registerUpload"))
            .bearer_auth(&account.access_token)
            .json(&json!({
                "registerUploadRequest": {
                    "recipes": ["urn:li:digitalmediaRecipe:feedshare-image"],
                    "owner": owner,
                    "serviceRelationships": [{
                        "relationshipType": "OWNER",
                        "identifier": "urn:li:userGeneratedContent",
                    }],
                },
            }))
            .send()
            .await?;
        let registered: RegisterUploadResponse = expect_json(Platform::LinkedIn, response)
            .await
            .map_err(|e| PlatformError::Media(format!("Upload registration failed: {}", e)))?;

        let upload_url = registered
            .value
            .upload_mechanism
            .as_ref()
            .and_then(|m| m.get(UPLOAD_MECHANISM))
            .and_then(|m| m.get("uploadUrl"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let (Some(asset), Some(upload_url)) = (registered.value.asset, upload_url) else {
            return Err(PlatformError::Media(
                "Upload registration returned no asset or upload URL".to_string(),
            ));
        };

        let response = self
            .http
            .put(upload_url)
            .bearer_auth(&account.access_token)
            .header(reqwest::header::CONTENT_TYPE, image.mime)
            .body(image.bytes)
            .send()
            .await?;
        expect_success(Platform::LinkedIn, response)
            .await
            .map_err(|e| PlatformError::Media(format!("Image upload failed: {}", e)))?;

        debug!("Uploaded LinkedIn image asset {}", asset);
        Ok(asset)
    }
}

fn ugc_post_body(author: &str, text: &str, asset: Option<&str>) -> Value {
    let category = if asset.is_some() { "IMAGE" } else { "NONE" };
    let mut share = json!({
        "shareCommentary": { "text": text },
        "shareMediaCategory": category,
    });
    if let Some(asset) = asset {
        share["media"] = json!([{ "status": "READY", "media": asset }]);
    }

    json!({
        "author": author,
        "lifecycleState": "PUBLISHED",
        "specificContent": { "com.linkedin.ugc.ShareContent": share },
        "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" },
    })
}

#[async_trait]
impl Publisher for LinkedInPublisher {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        item: &ContentItem,
    ) -> PlatformResult<PublishedPost> {
        let author = self.person_urn(account).await?;

        let asset = match item.image_url.as_deref() {
            Some(image_url) => Some(self.upload_image(account, &author, image_url).await?),
            None => None,
        };

        let text = compose_post_text(&item.caption, &item.hashtags);
        let response = self
            .http
            .post(self.app.api_url("/v2/ugcPosts"))
            .bearer_auth(&account.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&ugc_post_body(&author, &text, asset.as_deref()))
            .send()
            .await?;

        let response = expect_success(Platform::LinkedIn, response).await?;
        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body: UgcPostResponse = response.json().await.unwrap_or(UgcPostResponse { id: None });

        let id = body.id.or(header_id).ok_or_else(|| PlatformError::Upstream {
            platform: Platform::LinkedIn.display_name().to_string(),
            status: 200,
            message: "post created but no id returned".to_string(),
        })?;

        Ok(PublishedPost {
            url: format!("https://www.linkedin.com/feed/update/{}", id),
            id,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> PlatformResult<TokenGrant> {
        refresh_grant(&self.http, &self.app, refresh_token).await
    }
}
