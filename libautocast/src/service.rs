//! Service facade for Autocast
//!
//! `AutocastService` wires configuration, the record store, platform adapters
//! and the Gemini generators together so the binaries share one composition.
//!
//! # Example
//!
//! ```no_run
//! use libautocast::service::AutocastService;
//!
//! # async fn example() -> libautocast::Result<()> {
//! let service = AutocastService::new().await?;
//! let result = service.trigger_cycle("my-project-id").await;
//! println!("{} posts published", result.posts_published);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::Config;
use crate::error::{AutocastError, Result};
use crate::gemini::GeminiClient;
use crate::generation::{ContentGenerator, ImageGenerator};
use crate::leads::{LeadEngagement, LeadPipeline};
use crate::oauth::OAuthClient;
use crate::orchestrator::CycleOrchestrator;
use crate::publisher::PlatformPublisher;
use crate::scheduler::Scheduler;
use crate::store::{Database, RecordStore};
use crate::types::{ContentItem, ContentStatus, CycleResult, Platform};

pub struct AutocastService {
    store: Arc<dyn RecordStore>,
    publisher: Arc<PlatformPublisher>,
    orchestrator: Arc<CycleOrchestrator>,
    config: Arc<Config>,
}

impl AutocastService {
    /// Load configuration from the default location and open the database
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration cannot be loaded
    /// - The Gemini API key is missing
    /// - Database cannot be initialized or migrated
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    pub async fn from_config(config: Config) -> Result<Self> {
        let http = reqwest::Client::new();
        let gemini = Arc::new(GeminiClient::from_config(http.clone(), &config)?);
        let store: Arc<dyn RecordStore> = Arc::new(Database::new(&config.database.path).await?);
        let publisher = Arc::new(PlatformPublisher::from_config(store.clone(), http, &config));

        Ok(Self::from_parts(
            config,
            store,
            publisher,
            gemini.clone(),
            gemini,
        ))
    }

    /// Compose a service from existing parts, e.g. an in-memory store and mocks
    pub fn from_parts(
        config: Config,
        store: Arc<dyn RecordStore>,
        publisher: Arc<PlatformPublisher>,
        generator: Arc<dyn ContentGenerator>,
        images: Arc<dyn ImageGenerator>,
    ) -> Self {
        let orchestrator = Arc::new(CycleOrchestrator::new(
            store.clone(),
            publisher.clone(),
            generator,
            images,
        ));
        Self {
            store,
            publisher,
            orchestrator,
            config: Arc::new(config),
        }
    }

    /// Run one cycle for a project now, ignoring its schedule
    pub async fn trigger_cycle(&self, project_id: &str) -> CycleResult {
        self.orchestrator.run_cycle(project_id).await
    }

    /// A scheduler using `poll_interval`, or the configured one when `None`
    pub fn scheduler(&self, poll_interval: Option<Duration>) -> Result<Scheduler> {
        let interval = match poll_interval {
            Some(interval) => interval,
            None => self.config.scheduler.poll_interval()?,
        };
        Ok(Scheduler::new(
            self.store.clone(),
            self.orchestrator.clone(),
            interval,
        ))
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn publisher(&self) -> &Arc<PlatformPublisher> {
        &self.publisher
    }

    pub fn leads(&self) -> &LeadPipeline {
        self.orchestrator.leads()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Store, OAuth connect flow and publishing, without the generators
///
/// Account, lead and content management do not need a Gemini key, so the
/// admin tool uses this instead of [`AutocastService`].
pub struct AccountService {
    store: Arc<dyn RecordStore>,
    oauth: OAuthClient,
    publisher: Arc<PlatformPublisher>,
    engagement: LeadEngagement,
}

impl AccountService {
    pub async fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::new();
        let store: Arc<dyn RecordStore> = Arc::new(Database::new(&config.database.path).await?);
        let publisher = Arc::new(PlatformPublisher::from_config(store.clone(), http.clone(), config));
        Ok(Self::from_parts(
            store,
            OAuthClient::from_config(http, config),
            publisher,
        ))
    }

    pub fn from_parts(
        store: Arc<dyn RecordStore>,
        oauth: OAuthClient,
        publisher: Arc<PlatformPublisher>,
    ) -> Self {
        Self {
            engagement: LeadEngagement::new(store.clone(), publisher.clone()),
            store,
            oauth,
            publisher,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    pub fn engagement(&self) -> &LeadEngagement {
        &self.engagement
    }

    /// Publish one content item now and mark it posted.
    ///
    /// `platform` overrides the item's own target platform. The item keeps
    /// its status when publishing fails.
    pub async fn post_content(
        &self,
        project_id: &str,
        content_id: &str,
        platform: Option<Platform>,
    ) -> Result<ContentItem> {
        let item = self
            .store
            .get_content(project_id)
            .await?
            .into_iter()
            .find(|item| item.id == content_id)
            .ok_or_else(|| AutocastError::NotFound(format!("Content {}", content_id)))?;
        if item.status == ContentStatus::Posted {
            return Err(AutocastError::InvalidInput(format!(
                "Content {} is already posted",
                content_id
            )));
        }

        let target = platform.unwrap_or(item.platform);
        let published = self.publisher.publish_to(project_id, &item, target).await;
        if let Some(error) = published.error {
            return Err(error.into());
        }
        let url = published.post_url.ok_or_else(|| {
            AutocastError::Upstream(format!("{} reported no post URL", target.display_name()))
        })?;

        self.store
            .update_content_status(&item.id, ContentStatus::Posted, Some(&url))
            .await?;
        info!("Posted {} to {}", item.id, target.display_name());

        Ok(ContentItem {
            status: ContentStatus::Posted,
            post_url: Some(url),
            ..item
        })
    }
}
