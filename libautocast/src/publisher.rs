//! Publishing facade over the platform adapters
//!
//! Looks up the connected account, obtains a valid token, then calls the
//! adapter. Failures come back inside the result value and are never raised.

use futures::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::credentials::CredentialManager;
use crate::error::PlatformError;
use crate::oauth::OAuthApp;
use crate::platforms::instagram::InstagramPublisher;
use crate::platforms::linkedin::LinkedInPublisher;
use crate::platforms::twitter::TwitterPublisher;
use crate::platforms::{PlatformResult, PublishedPost, Publisher, SocialLead};
use crate::store::RecordStore;
use crate::types::{ContentItem, Platform, SocialAccount};

#[derive(Debug, Clone, PartialEq)]
pub struct PublishResult {
    pub success: bool,
    pub post_url: Option<String>,
    pub error: Option<PlatformError>,
}

impl PublishResult {
    fn published(post_url: String) -> Self {
        Self {
            success: true,
            post_url: Some(post_url),
            error: None,
        }
    }

    fn failed(error: PlatformError) -> Self {
        Self {
            success: false,
            post_url: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplyResult {
    pub success: bool,
    pub error: Option<PlatformError>,
}

impl From<PlatformResult<()>> for ReplyResult {
    fn from(result: PlatformResult<()>) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                error: None,
            },
            Err(error) => Self {
                success: false,
                error: Some(error),
            },
        }
    }
}

pub struct PlatformPublisher {
    store: Arc<dyn RecordStore>,
    credentials: CredentialManager,
    adapters: HashMap<Platform, Arc<dyn Publisher>>,
}

impl PlatformPublisher {
    /// A publisher with no adapters; add them with [`with_adapter`](Self::with_adapter)
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            credentials: CredentialManager::new(store.clone()),
            store,
            adapters: HashMap::new(),
        }
    }

    /// The Twitter, LinkedIn and Instagram adapters built from configuration
    pub fn from_config(store: Arc<dyn RecordStore>, http: reqwest::Client, config: &Config) -> Self {
        let public_dir: PathBuf = config.publishing.public_dir_path();

        Self::new(store)
            .with_adapter(Arc::new(TwitterPublisher::new(
                http.clone(),
                OAuthApp::for_platform(config, Platform::Twitter),
                public_dir.clone(),
            )))
            .with_adapter(Arc::new(LinkedInPublisher::new(
                http.clone(),
                OAuthApp::for_platform(config, Platform::LinkedIn),
                public_dir,
            )))
            .with_adapter(Arc::new(InstagramPublisher::new(
                http,
                OAuthApp::for_platform(config, Platform::Instagram),
                config.publishing.public_base_url.clone(),
            )))
    }

    /// Register an adapter, replacing any existing one for its platform
    pub fn with_adapter(mut self, adapter: Arc<dyn Publisher>) -> Self {
        self.adapters.insert(adapter.platform(), adapter);
        self
    }

    pub fn adapter(&self, platform: Platform) -> Option<&Arc<dyn Publisher>> {
        self.adapters.get(&platform)
    }

    fn require_adapter(&self, platform: Platform) -> PlatformResult<&Arc<dyn Publisher>> {
        self.adapter(platform).ok_or_else(|| {
            PlatformError::UnsupportedOperation(format!(
                "No adapter registered for {}",
                platform.display_name()
            ))
        })
    }

    /// The project's account on `platform`, with a token valid right now
    async fn ready_account(
        &self,
        adapter: &dyn Publisher,
        project_id: &str,
        platform: Platform,
    ) -> PlatformResult<SocialAccount> {
        let account = self
            .store
            .get_social_account(project_id, platform)
            .await
            .map_err(|e| {
                PlatformError::NotConnected(format!("Could not load {} account: {}", platform, e))
            })?
            .ok_or_else(|| {
                PlatformError::NotConnected(format!("No connected {} account", platform))
            })?;

        self.credentials.get_valid_token(adapter, account).await
    }

    /// Publish `item` to its own target platform
    pub async fn publish(&self, project_id: &str, item: &ContentItem) -> PublishResult {
        self.publish_to(project_id, item, item.platform).await
    }

    pub async fn publish_to(
        &self,
        project_id: &str,
        item: &ContentItem,
        platform: Platform,
    ) -> PublishResult {
        let outcome: PlatformResult<PublishedPost> = async {
            let adapter = self.require_adapter(platform)?;
            let account = self.ready_account(adapter.as_ref(), project_id, platform).await?;
            adapter.publish(&account, item).await
        }
        .await;

        match outcome {
            Ok(post) => {
                info!("Published {} to {}: {}", item.id, platform.display_name(), post.url);
                PublishResult::published(post.url)
            }
            Err(e) => {
                warn!("Publishing {} to {} failed: {}", item.id, platform.display_name(), e);
                PublishResult::failed(e)
            }
        }
    }

    /// Reply to a platform post or comment as the project's account
    pub async fn reply(
        &self,
        project_id: &str,
        platform: Platform,
        source_id: &str,
        text: &str,
    ) -> ReplyResult {
        let outcome: PlatformResult<()> = async {
            let adapter = self.require_adapter(platform)?;
            if !adapter.supports_reply() {
                return Err(PlatformError::UnsupportedOperation(format!(
                    "Replies not supported for {}",
                    platform.display_name()
                )));
            }
            let account = self.ready_account(adapter.as_ref(), project_id, platform).await?;
            adapter.reply(&account, source_id, text).await
        }
        .await;

        if let Err(e) = &outcome {
            warn!("Reply to {} on {} failed: {}", source_id, platform.display_name(), e);
        }
        outcome.into()
    }

    /// Search every connected platform concurrently.
    ///
    /// Leads come back grouped in platform order. A platform whose credentials
    /// are unusable or whose search fails contributes nothing.
    pub async fn search_all(&self, project_id: &str, keywords: &[String]) -> Vec<SocialLead> {
        let searches = Platform::ALL.into_iter().map(|platform| async move {
            let Some(adapter) = self.adapter(platform) else {
                return Vec::new();
            };

            let account = match self.ready_account(adapter.as_ref(), project_id, platform).await {
                Ok(account) => account,
                Err(PlatformError::NotConnected(_)) => return Vec::new(),
                Err(e) => {
                    warn!("Skipping {} discovery: {}", platform.display_name(), e);
                    return Vec::new();
                }
            };

            match adapter.search(&account, keywords).await {
                Ok(leads) => {
                    debug!("{} search found {} leads", platform.display_name(), leads.len());
                    leads
                }
                Err(e) => {
                    warn!("{} search failed: {}", platform.display_name(), e);
                    Vec::new()
                }
            }
        });

        join_all(searches).await.into_iter().flatten().collect()
    }
}
