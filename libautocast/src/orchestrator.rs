//! One autonomous marketing cycle for a project
//!
//! Steps run strictly in order: content, images, publish, discovery,
//! engagement. A failing step is recorded in [`CycleResult::errors`] with its
//! step prefix and the cycle moves on. Only a missing project stops a cycle
//! before it starts.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::generation::{ContentGenerator, ImageGenerator};
use crate::leads::LeadPipeline;
use crate::publisher::PlatformPublisher;
use crate::store::RecordStore;
use crate::types::{
    ContentStatus, CycleResult, LeadStatus, NewContent, Platform, Project, ProjectPatch,
};

/// Below this many unpublished items the cycle generates more
pub const MIN_UNPUBLISHED: usize = 3;

/// Platforms new content is rotated across
const ROTATION: [Platform; 2] = [Platform::Twitter, Platform::LinkedIn];

pub struct CycleOrchestrator {
    store: Arc<dyn RecordStore>,
    publisher: Arc<PlatformPublisher>,
    generator: Arc<dyn ContentGenerator>,
    images: Arc<dyn ImageGenerator>,
    leads: LeadPipeline,
    run_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CycleOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        publisher: Arc<PlatformPublisher>,
        generator: Arc<dyn ContentGenerator>,
        images: Arc<dyn ImageGenerator>,
    ) -> Self {
        let leads = LeadPipeline::new(store.clone(), publisher.clone(), generator.clone());
        Self {
            store,
            publisher,
            generator,
            images,
            leads,
            run_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn leads(&self) -> &LeadPipeline {
        &self.leads
    }

    fn run_lock(&self, project_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .run_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(project_id.to_string()).or_default().clone()
    }

    /// Drop the table entry once no other cycle holds or waits on it
    fn release_lock(&self, project_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .run_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // one reference in the table, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(project_id);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.run_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Run a full cycle, stamping `lastRunAt` with the completion time
    pub async fn run_cycle(&self, project_id: &str) -> CycleResult {
        self.run_cycle_with_clock(project_id, Utc::now).await
    }

    /// Run a full cycle as if it completed at `now`
    pub async fn run_cycle_at(&self, project_id: &str, now: DateTime<Utc>) -> CycleResult {
        self.run_cycle_with_clock(project_id, move || now).await
    }

    async fn run_cycle_with_clock<F>(&self, project_id: &str, clock: F) -> CycleResult
    where
        F: Fn() -> DateTime<Utc> + Send + Sync,
    {
        let lock = self.run_lock(project_id);
        let result = {
            let _guard = lock.lock().await;
            self.run_locked(project_id, clock).await
        };
        self.release_lock(project_id, lock);
        result
    }

    async fn run_locked<F>(&self, project_id: &str, clock: F) -> CycleResult
    where
        F: Fn() -> DateTime<Utc> + Send + Sync,
    {
        info!("Starting cycle for project {}", project_id);
        let mut result = CycleResult::new(project_id);

        let project = match self.store.get_project(project_id).await {
            Ok(Some(project)) => project,
            Ok(None) => {
                result.record_error("Critical", "Project not found");
                warn!("Cycle aborted: project {} not found", project_id);
                return result;
            }
            Err(e) => {
                result.record_error("Critical", e);
                warn!("Cycle aborted: could not load project {}", project_id);
                return result;
            }
        };

        self.generate_content(&project, &mut result).await;
        self.render_images(&project, &mut result).await;
        self.publish_next(&project, &mut result).await;
        self.discover_leads(&project, &mut result).await;
        self.engage_next(&project, &mut result).await;

        let finished = last_run_after(project.last_run_at, clock());
        if let Err(e) = self
            .store
            .update_project(&project.id, ProjectPatch::last_run(finished))
            .await
        {
            result.record_error("Critical", e);
        }

        info!(
            "Cycle complete for {}: {} generated, {} images, {} posted, {} leads, {} engaged, {} errors",
            project.name,
            result.content_generated,
            result.images_generated,
            result.posts_published,
            result.leads_discovered,
            result.leads_engaged,
            result.errors.len()
        );
        result
    }

    async fn generate_content(&self, project: &Project, result: &mut CycleResult) {
        if let Err(e) = self.try_generate_content(project, result).await {
            warn!("Content generation failed: {}", e);
            result.record_error("Content Gen", e);
        }
    }

    async fn try_generate_content(&self, project: &Project, result: &mut CycleResult) -> Result<()> {
        let existing = self.store.get_content(&project.id).await?;
        let unpublished = existing
            .iter()
            .filter(|item| item.status.is_unpublished())
            .count();
        if unpublished >= MIN_UNPUBLISHED {
            debug!("{} unpublished items, skipping generation", unpublished);
            return Ok(());
        }

        let rotated = *ROTATION
            .choose(&mut rand::thread_rng())
            .unwrap_or(&Platform::Twitter);
        let captions: Vec<String> = existing.into_iter().map(|item| item.caption).collect();

        let posts = self.generator.generate(project, &captions).await?;
        let items: Vec<NewContent> = posts
            .into_iter()
            .map(|post| NewContent {
                project_id: project.id.clone(),
                content_type: post.content_type,
                caption: post.caption,
                hashtags: post.hashtags,
                platform: post.platform.parse().unwrap_or(rotated),
                image_prompt: post.image_prompt.filter(|p| !p.trim().is_empty()),
            })
            .collect();
        if items.is_empty() {
            return Ok(());
        }

        let saved = self.store.add_content(items).await?;
        result.content_generated = saved.len();
        info!("Generated {} new drafts", saved.len());
        Ok(())
    }

    async fn render_images(&self, project: &Project, result: &mut CycleResult) {
        let content = match self.store.get_content(&project.id).await {
            Ok(content) => content,
            Err(e) => {
                result.record_error("Image Gen", e);
                return;
            }
        };

        for item in content
            .iter()
            .filter(|item| item.status.is_unpublished() && item.image_url.is_none())
        {
            let prompt = item
                .image_prompt
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(&item.caption);

            let rendered = match self
                .images
                .render(prompt, &item.id, project.logo.as_deref(), item.content_type)
                .await
            {
                Ok(url) => self.store.update_content_image(&item.id, &url).await,
                Err(e) => Err(e),
            };

            match rendered {
                Ok(()) => result.images_generated += 1,
                Err(e) => {
                    warn!("Image generation failed for {}: {}", item.id, e);
                    result.record_error(&format!("Image Gen ({})", item.id), e);
                }
            }
        }
    }

    async fn publish_next(&self, project: &Project, result: &mut CycleResult) {
        let content = match self.store.get_content(&project.id).await {
            Ok(content) => content,
            Err(e) => {
                result.record_error("Post", e);
                return;
            }
        };

        let Some(item) = content
            .iter()
            .find(|item| item.status == ContentStatus::Draft && item.image_url.is_some())
        else {
            debug!("No draft with an image ready to publish");
            return;
        };

        info!("Publishing {} to {}", item.id, item.platform.display_name());
        let published = self.publisher.publish(&project.id, item).await;
        let step = format!("Post ({})", item.id);

        match (published.post_url, published.error) {
            (Some(url), None) if published.success => {
                match self
                    .store
                    .update_content_status(&item.id, ContentStatus::Posted, Some(&url))
                    .await
                {
                    Ok(()) => result.posts_published += 1,
                    Err(e) => result.record_error(&step, e),
                }
            }
            (_, Some(error)) => result.record_error(&step, error),
            _ => result.record_error(&step, "publish reported no post URL"),
        }
    }

    async fn discover_leads(&self, project: &Project, result: &mut CycleResult) {
        let keywords = self.leads.derive_keywords(project).await;
        match self.leads.discover(project, &keywords).await {
            Ok(leads) => {
                result.leads_discovered = leads.len();
                info!("Discovered {} new leads", leads.len());
            }
            Err(e) => {
                warn!("Discovery failed: {}", e);
                result.record_error("Discovery", e);
            }
        }
    }

    async fn engage_next(&self, project: &Project, result: &mut CycleResult) {
        let leads = match self.store.get_leads(&project.id).await {
            Ok(leads) => leads,
            Err(e) => {
                result.record_error("Engage", e);
                return;
            }
        };

        let Some(lead) = leads
            .iter()
            .find(|lead| lead.status == LeadStatus::Discovered && lead.is_replyable())
        else {
            debug!("No replyable lead to engage");
            return;
        };
        let step = format!("Engage ({})", lead.id);

        let text = match lead.last_message.as_deref().filter(|m| !m.trim().is_empty()) {
            Some(text) => text.to_string(),
            None => match self
                .generator
                .draft_reply(project, &lead.name, &lead.pain_point, &lead.conversations)
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    result.record_error(&step, e);
                    return;
                }
            },
        };

        info!("Engaging lead {}", lead.name);
        match self.leads.engage(lead, &text).await {
            Ok(_) => result.leads_engaged += 1,
            Err(e) => {
                warn!("Engagement with {} failed: {}", lead.name, e);
                result.record_error(&step, e);
            }
        }
    }
}

/// `lastRunAt` never moves backwards
pub fn last_run_after(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    previous.map_or(now, |prev| prev.max(now))
}
