//! Platform adapters
//!
//! Each adapter implements [`Publisher`] for one social network. Adapters take
//! an already-valid [`SocialAccount`]; token refresh is the credential
//! manager's job, using the adapter's `refresh` procedure.
//!
//! ```no_run
//! use libautocast::platforms::{Publisher, twitter::TwitterPublisher};
//! use libautocast::oauth::OAuthApp;
//! use libautocast::types::Platform;
//!
//! # async fn example(account: libautocast::SocialAccount, item: libautocast::ContentItem) {
//! let twitter = TwitterPublisher::new(
//!     reqwest::Client::new(),
//!     OAuthApp::unconfigured(Platform::Twitter),
//!     "/srv/autocast/public".into(),
//! );
//! match twitter.publish(&account, &item).await {
//!     Ok(post) => println!("Posted: {}", post.url),
//!     Err(e) => eprintln!("Publish failed: {}", e),
//! }
//! # }
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

use crate::error::PlatformError;
use crate::oauth::TokenGrant;
use crate::types::{ContentItem, Platform, SocialAccount};

pub mod instagram;
pub mod linkedin;
pub mod twitter;

// Available outside tests so integration tests can compose a publisher
pub mod mock;

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// A post that went live
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedPost {
    /// Platform-native id
    pub id: String,
    /// Public URL of the post
    pub url: String,
}

/// Someone found through a platform search, before becoming a [`crate::Lead`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialLead {
    pub platform: Platform,
    pub name: String,
    pub handle: String,
    pub profile_url: String,
    /// Short description of what they did, e.g. `Tweeted: "..."`
    pub last_interaction: String,
    pub avatar_url: Option<String>,
    pub score: u8,
    /// The post or comment a reply would target
    pub source_id: String,
}

/// Uniform capability set for a social platform
///
/// `publish` is required. Replies, search and token refresh have defaults
/// that report the capability as missing.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether `reply` can succeed on this platform
    fn supports_reply(&self) -> bool {
        false
    }

    /// Publish a content item. Never mutates the item.
    ///
    /// # Errors
    ///
    /// - `PlatformError::Validation` when the item cannot be posted here
    ///   (for example Instagram without an image)
    /// - `PlatformError::Media` when a required media upload fails
    /// - `PlatformError::Upstream` on a non-2xx API response
    /// - `PlatformError::Network` on transport failure
    async fn publish(&self, account: &SocialAccount, item: &ContentItem)
        -> PlatformResult<PublishedPost>;

    /// Reply to an existing post or comment identified by its platform id
    async fn reply(&self, _account: &SocialAccount, _source_id: &str, _text: &str) -> PlatformResult<()> {
        Err(PlatformError::UnsupportedOperation(format!(
            "Replies not supported for {}",
            self.platform().display_name()
        )))
    }

    /// Find people talking about the given keywords
    async fn search(&self, _account: &SocialAccount, _keywords: &[String]) -> PlatformResult<Vec<SocialLead>> {
        Ok(Vec::new())
    }

    /// Exchange a refresh token for new credentials
    async fn refresh(&self, _refresh_token: &str) -> PlatformResult<TokenGrant> {
        Err(PlatformError::UnsupportedOperation(format!(
            "{} tokens cannot be refreshed",
            self.platform().display_name()
        )))
    }
}

/// Caption, blank line, then `#`-prefixed hashtags joined by spaces.
///
/// Repeated hashtags are kept. With no hashtags the caption stands alone.
pub fn compose_post_text(caption: &str, hashtags: &[String]) -> String {
    let tags: Vec<String> = hashtags
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .map(|h| {
            if h.starts_with('#') {
                h.to_string()
            } else {
                format!("#{}", h)
            }
        })
        .collect();

    if tags.is_empty() {
        caption.to_string()
    } else {
        format!("{}\n\n{}", caption, tags.join(" "))
    }
}

fn is_remote(image_url: &str) -> bool {
    image_url.starts_with("http://") || image_url.starts_with("https://")
}

/// Map a site-relative image path such as `/generated/abc.png` under `public_dir`.
///
/// Returns `None` for remote URLs and for paths that would escape `public_dir`.
pub fn resolve_local_image(public_dir: &Path, image_url: &str) -> Option<PathBuf> {
    if is_remote(image_url) {
        return None;
    }

    let relative = Path::new(image_url.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }

    Some(public_dir.join(relative))
}

/// Resolve an image reference to a URL the platform can fetch
pub fn resolve_public_image_url(
    public_base_url: Option<&str>,
    image_url: &str,
) -> PlatformResult<String> {
    if is_remote(image_url) {
        return Ok(image_url.to_string());
    }

    let base = public_base_url.ok_or_else(|| {
        PlatformError::Validation(
            "A public base URL is required to publish local images (publishing.public_base_url)"
                .to_string(),
        )
    })?;

    Ok(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        image_url.trim_start_matches('/')
    ))
}

pub(crate) fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// First `max` characters of `text`, never splitting a character
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub(crate) fn upstream_error(platform: Platform, status: u16, body: String) -> PlatformError {
    PlatformError::Upstream {
        platform: platform.display_name().to_string(),
        status,
        message: body,
    }
}

/// Turn a non-2xx response into `PlatformError::Upstream` carrying the body
pub(crate) async fn expect_success(
    platform: Platform,
    response: reqwest::Response,
) -> PlatformResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(upstream_error(platform, status.as_u16(), body))
}

pub(crate) async fn expect_json<T: DeserializeOwned>(
    platform: Platform,
    response: reqwest::Response,
) -> PlatformResult<T> {
    let response = expect_success(platform, response).await?;
    let status = response.status().as_u16();
    response.json::<T>().await.map_err(|e| {
        upstream_error(platform, status, format!("unexpected response body: {}", e))
    })
}
