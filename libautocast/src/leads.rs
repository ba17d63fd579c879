//! Lead discovery and engagement
//!
//! Real leads come from platform searches and carry the id of the post or
//! comment that surfaced them. Simulated leads are AI personas; they are
//! stored alongside real ones but never contacted.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AutocastError, Result};
use crate::generation::ContentGenerator;
use crate::platforms::SocialLead;
use crate::publisher::PlatformPublisher;
use crate::store::RecordStore;
use crate::types::{
    ConversationEntry, Lead, LeadMetadata, LeadPatch, LeadStatus, NewLead, Platform, Project,
};

/// Vision words must be longer than this to serve as fallback keywords
const MIN_KEYWORD_LEN: usize = 4;

pub struct LeadPipeline {
    store: Arc<dyn RecordStore>,
    publisher: Arc<PlatformPublisher>,
    generator: Arc<dyn ContentGenerator>,
    engagement: LeadEngagement,
}

impl LeadPipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        publisher: Arc<PlatformPublisher>,
        generator: Arc<dyn ContentGenerator>,
    ) -> Self {
        Self {
            engagement: LeadEngagement::new(store.clone(), publisher.clone()),
            store,
            publisher,
            generator,
        }
    }

    pub fn engagement(&self) -> &LeadEngagement {
        &self.engagement
    }

    /// Search phrases for discovery: AI suggestions, or the project name plus
    /// the first two long vision words when the generator has nothing
    pub async fn derive_keywords(&self, project: &Project) -> Vec<String> {
        match self.generator.suggest_keywords(project).await {
            Ok(keywords) if !keywords.is_empty() => keywords,
            Ok(_) => fallback_keywords(project),
            Err(e) => {
                warn!("Keyword suggestion failed, using fallback: {}", e);
                fallback_keywords(project)
            }
        }
    }

    /// Find real and simulated leads and append them to the store.
    ///
    /// Returns the stored leads, real ones first, each group in discovery
    /// order. Leads found in earlier runs are not deduplicated.
    pub async fn discover(&self, project: &Project, keywords: &[String]) -> Result<Vec<Lead>> {
        info!("Searching social platforms with keywords: {}", keywords.join(", "));
        let social = self.publisher.search_all(&project.id, keywords).await;

        let drafts = join_all(social.iter().map(|lead| {
            self.generator
                .draft_reply(project, &lead.name, &lead.last_interaction, &[])
        }))
        .await;

        let mut new_leads: Vec<NewLead> = social
            .into_iter()
            .zip(drafts)
            .map(|(lead, draft)| {
                let draft = draft
                    .map_err(|e| warn!("Reply draft for {} failed: {}", lead.handle, e))
                    .ok();
                real_lead(&project.id, lead, draft)
            })
            .collect();
        let real_count = new_leads.len();

        match self.generator.simulate_leads(project).await {
            Ok(personas) => new_leads.extend(personas.into_iter().map(|persona| {
                let reply = Some(persona.suggested_reply).filter(|r| !r.trim().is_empty());
                NewLead {
                    project_id: project.id.clone(),
                    name: persona.name,
                    platform: persona.platform,
                    profile_url: persona.profile_url,
                    pain_point: persona.pain_point,
                    conversations: reply.iter().map(ConversationEntry::ai).collect(),
                    last_message: reply,
                    metadata: LeadMetadata {
                        source_id: None,
                        is_simulated: true,
                    },
                }
            })),
            Err(e) => warn!("Simulated audience unavailable: {}", e),
        }

        debug!(
            "Discovered {} real and {} simulated leads",
            real_count,
            new_leads.len() - real_count
        );

        if new_leads.is_empty() {
            return Ok(Vec::new());
        }
        self.store.add_leads(new_leads).await
    }

    /// See [`LeadEngagement::engage`]
    pub async fn engage(&self, lead: &Lead, text: &str) -> Result<Lead> {
        self.engagement.engage(lead, text).await
    }

    pub async fn set_status(&self, lead_id: &str, status: LeadStatus) -> Result<Lead> {
        self.engagement.set_status(lead_id, status).await
    }
}

/// Replies and status changes on stored leads; needs no generator
pub struct LeadEngagement {
    store: Arc<dyn RecordStore>,
    publisher: Arc<PlatformPublisher>,
}

impl LeadEngagement {
    pub fn new(store: Arc<dyn RecordStore>, publisher: Arc<PlatformPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Look a lead up within its project
    pub async fn find(&self, project_id: &str, lead_id: &str) -> Result<Lead> {
        self.store
            .get_leads(project_id)
            .await?
            .into_iter()
            .find(|lead| lead.id == lead_id)
            .ok_or_else(|| AutocastError::NotFound(format!("Lead {}", lead_id)))
    }

    /// Reply to a real lead and mark it engaged.
    ///
    /// # Errors
    ///
    /// - `AutocastError::NotReplyable` for simulated leads, leads without a
    ///   source id or on an unknown platform; no network call is made
    /// - `AutocastError::Platform` when the platform reply fails
    pub async fn engage(&self, lead: &Lead, text: &str) -> Result<Lead> {
        if !lead.is_replyable() {
            return Err(AutocastError::NotReplyable(format!(
                "{} is simulated or has no source post",
                lead.name
            )));
        }
        let platform: Platform = lead.platform.parse().map_err(|_| {
            AutocastError::NotReplyable(format!("{} is on unsupported platform {}", lead.name, lead.platform))
        })?;
        let source_id = lead.metadata.source_id.as_deref().unwrap_or_default();

        let result = self
            .publisher
            .reply(&lead.project_id, platform, source_id, text)
            .await;
        if let Some(error) = result.error {
            return Err(error.into());
        }

        info!("Engaged {} on {}", lead.name, platform.display_name());
        self.store
            .update_lead(
                &lead.id,
                LeadPatch {
                    status: Some(LeadStatus::Engaged),
                    last_message: Some(text.to_string()),
                    append_conversations: vec![ConversationEntry::ai(text)],
                },
            )
            .await
    }

    /// Send the reply drafted at discovery time
    pub async fn send_draft(&self, lead: &Lead) -> Result<Lead> {
        let draft = lead
            .last_message
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                AutocastError::InvalidInput(format!("No drafted reply for lead {}", lead.id))
            })?
            .to_string();
        self.engage(lead, &draft).await
    }

    pub async fn set_status(&self, lead_id: &str, status: LeadStatus) -> Result<Lead> {
        self.store
            .update_lead(
                lead_id,
                LeadPatch {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await
    }
}

fn real_lead(project_id: &str, lead: SocialLead, draft: Option<String>) -> NewLead {
    let platform = lead.platform.display_name();
    let mut conversations = vec![ConversationEntry::ai(format!(
        "Found via {}. {}",
        platform, lead.last_interaction
    ))];
    if let Some(reply) = &draft {
        conversations.push(ConversationEntry::ai(reply.clone()));
    }

    NewLead {
        project_id: project_id.to_string(),
        name: lead.name,
        platform: lead.platform.as_str().to_string(),
        profile_url: lead.profile_url,
        pain_point: format!("Detected via {} interaction: {}", platform, lead.last_interaction),
        last_message: draft,
        conversations,
        metadata: LeadMetadata {
            source_id: Some(lead.source_id),
            is_simulated: false,
        },
    }
}

pub fn fallback_keywords(project: &Project) -> Vec<String> {
    let mut keywords = vec![project.name.clone()];
    keywords.extend(
        project
            .vision
            .split_whitespace()
            .filter(|w| w.chars().count() > MIN_KEYWORD_LEN)
            .take(2)
            .map(str::to_string),
    );
    keywords
}
