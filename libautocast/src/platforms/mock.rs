//! Configurable mock publisher for tests
//!
//! Clones share their call counters, so a test can hand one clone to the
//! publisher and keep another to inspect what happened.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use super::{PlatformResult, PublishedPost, Publisher, SocialLead};
use crate::error::PlatformError;
use crate::oauth::TokenGrant;
use crate::types::{ContentItem, Platform, SocialAccount};

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub platform: Platform,

    /// Returned from `publish` instead of succeeding
    pub publish_error: Option<PlatformError>,

    /// Returned from `reply` instead of succeeding
    pub reply_error: Option<PlatformError>,

    pub supports_reply: bool,

    pub search_results: Vec<SocialLead>,
    pub search_error: Option<PlatformError>,

    /// `None` means refresh is unsupported
    pub refresh_result: Option<PlatformResult<TokenGrant>>,

    /// Simulated latency for publish and reply
    pub delay: Duration,

    pub publish_call_count: Arc<Mutex<usize>>,
    pub reply_call_count: Arc<Mutex<usize>>,
    pub search_call_count: Arc<Mutex<usize>>,
    pub refresh_call_count: Arc<Mutex<usize>>,

    /// Ids of published content items
    pub published: Arc<Mutex<Vec<String>>>,

    /// (source id, text) of each successful reply
    pub replies: Arc<Mutex<Vec<(String, String)>>>,

    /// Access tokens seen by publish/reply/search
    pub tokens_used: Arc<Mutex<Vec<String>>>,
}

impl MockConfig {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            publish_error: None,
            reply_error: None,
            supports_reply: platform != Platform::LinkedIn,
            search_results: Vec::new(),
            search_error: None,
            refresh_result: None,
            delay: Duration::from_millis(0),
            publish_call_count: Arc::new(Mutex::new(0)),
            reply_call_count: Arc::new(Mutex::new(0)),
            search_call_count: Arc::new(Mutex::new(0)),
            refresh_call_count: Arc::new(Mutex::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
            replies: Arc::new(Mutex::new(Vec::new())),
            tokens_used: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockPublisher {
    config: MockConfig,
}

impl MockPublisher {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Publishes, replies and searches successfully
    pub fn success(platform: Platform) -> Self {
        Self::new(MockConfig::new(platform))
    }

    /// Every publish fails with `error`
    pub fn publish_failure(platform: Platform, error: PlatformError) -> Self {
        Self::new(MockConfig {
            publish_error: Some(error),
            ..MockConfig::new(platform)
        })
    }

    /// Search returns these leads
    pub fn with_search_results(platform: Platform, leads: Vec<SocialLead>) -> Self {
        Self::new(MockConfig {
            search_results: leads,
            ..MockConfig::new(platform)
        })
    }

    /// Refresh returns `result`
    pub fn with_refresh(platform: Platform, result: PlatformResult<TokenGrant>) -> Self {
        Self::new(MockConfig {
            refresh_result: Some(result),
            ..MockConfig::new(platform)
        })
    }

    pub fn with_delay(platform: Platform, delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..MockConfig::new(platform)
        })
    }

    pub fn publish_call_count(&self) -> usize {
        *self.config.publish_call_count.lock().unwrap()
    }

    pub fn reply_call_count(&self) -> usize {
        *self.config.reply_call_count.lock().unwrap()
    }

    pub fn search_call_count(&self) -> usize {
        *self.config.search_call_count.lock().unwrap()
    }

    pub fn refresh_call_count(&self) -> usize {
        *self.config.refresh_call_count.lock().unwrap()
    }

    pub fn published(&self) -> Vec<String> {
        self.config.published.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<(String, String)> {
        self.config.replies.lock().unwrap().clone()
    }

    pub fn tokens_used(&self) -> Vec<String> {
        self.config.tokens_used.lock().unwrap().clone()
    }

    fn record_token(&self, account: &SocialAccount) {
        self.config
            .tokens_used
            .lock()
            .unwrap()
            .push(account.access_token.clone());
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn platform(&self) -> Platform {
        self.config.platform
    }

    fn supports_reply(&self) -> bool {
        self.config.supports_reply
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        item: &ContentItem,
    ) -> PlatformResult<PublishedPost> {
        *self.config.publish_call_count.lock().unwrap() += 1;
        self.record_token(account);

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(error) = &self.config.publish_error {
            return Err(error.clone());
        }

        self.config.published.lock().unwrap().push(item.id.clone());
        let id = format!("mock-{}", uuid::Uuid::new_v4());
        Ok(PublishedPost {
            url: format!("https://{}.example/{}", self.config.platform.as_str(), id),
            id,
        })
    }

    async fn reply(&self, account: &SocialAccount, source_id: &str, text: &str) -> PlatformResult<()> {
        *self.config.reply_call_count.lock().unwrap() += 1;
        self.record_token(account);

        if !self.config.supports_reply {
            return Err(PlatformError::UnsupportedOperation(format!(
                "Replies not supported for {}",
                self.config.platform.display_name()
            )));
        }

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(error) = &self.config.reply_error {
            return Err(error.clone());
        }

        self.config
            .replies
            .lock()
            .unwrap()
            .push((source_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn search(&self, account: &SocialAccount, _keywords: &[String]) -> PlatformResult<Vec<SocialLead>> {
        *self.config.search_call_count.lock().unwrap() += 1;
        self.record_token(account);

        match &self.config.search_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.config.search_results.clone()),
        }
    }

    async fn refresh(&self, _refresh_token: &str) -> PlatformResult<TokenGrant> {
        *self.config.refresh_call_count.lock().unwrap() += 1;

        match &self.config.refresh_result {
            Some(result) => result.clone(),
            None => Err(PlatformError::UnsupportedOperation(format!(
                "{} tokens cannot be refreshed",
                self.config.platform.display_name()
            ))),
        }
    }
}
