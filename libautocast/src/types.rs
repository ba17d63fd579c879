//! Core types for Autocast

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AutocastError;

/// Social platforms with a publisher adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    LinkedIn,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Twitter, Platform::LinkedIn, Platform::Instagram];

    /// Lowercase identifier used in storage and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::LinkedIn => "linkedin",
            Platform::Instagram => "instagram",
        }
    }

    /// Human-facing name used in logs and error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Twitter => "Twitter",
            Platform::LinkedIn => "LinkedIn",
            Platform::Instagram => "Instagram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AutocastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "twitter" | "x" => Ok(Platform::Twitter),
            "linkedin" => Ok(Platform::LinkedIn),
            "instagram" => Ok(Platform::Instagram),
            other => Err(AutocastError::InvalidInput(format!(
                "Unsupported platform: '{}'. Valid options: twitter, linkedin, instagram",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub vision: String,
    pub repo_url: String,
    pub logo: Option<String>,
    pub target_languages: Vec<String>,
    pub agent_frequency_hours: u32,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Default cycle frequency for new projects, in hours
pub const DEFAULT_FREQUENCY_HOURS: u32 = 24;

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub vision: String,
    pub repo_url: String,
    pub logo: Option<String>,
    pub target_languages: Vec<String>,
    pub agent_frequency_hours: Option<u32>,
}

impl NewProject {
    pub fn into_project(self) -> Project {
        Project {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            vision: self.vision,
            repo_url: self.repo_url,
            logo: self.logo,
            target_languages: self.target_languages,
            agent_frequency_hours: self
                .agent_frequency_hours
                .unwrap_or(DEFAULT_FREQUENCY_HOURS)
                .max(1),
            last_run_at: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub vision: Option<String>,
    pub agent_frequency_hours: Option<u32>,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl ProjectPatch {
    pub fn last_run(at: DateTime<Utc>) -> Self {
        Self {
            last_run_at: Some(at),
            ..Default::default()
        }
    }

    pub fn apply(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name = name.clone();
        }
        if let Some(vision) = &self.vision {
            project.vision = vision.clone();
        }
        if let Some(hours) = self.agent_frequency_hours {
            project.agent_frequency_hours = hours.max(1);
        }
        if let Some(at) = self.last_run_at {
            project.last_run_at = Some(at);
        }
    }
}

/// A connected social account, one per (project, platform)
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SocialAccount {
    pub id: String,
    pub project_id: String,
    pub platform: Platform,
    pub username: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Token expiry as unix epoch milliseconds; `None` for long-lived tokens
    pub expires_at: Option<i64>,
    pub connected_at: DateTime<Utc>,
}

impl fmt::Debug for SocialAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocialAccount")
            .field("id", &self.id)
            .field("project_id", &self.project_id)
            .field("platform", &self.platform)
            .field("username", &self.username)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

#[derive(Clone)]
pub struct NewSocialAccount {
    pub project_id: String,
    pub platform: Platform,
    pub username: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

impl fmt::Debug for NewSocialAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewSocialAccount")
            .field("project_id", &self.project_id)
            .field("platform", &self.platform)
            .field("username", &self.username)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Credential fields written back after a token refresh
#[derive(Clone, PartialEq)]
pub struct TokenUpdate {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

impl TokenUpdate {
    pub fn apply(&self, account: &mut SocialAccount) {
        account.access_token = self.access_token.clone();
        account.refresh_token = self.refresh_token.clone();
        account.expires_at = self.expires_at;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Meme,
    Feature,
    Brand,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Meme => "meme",
            ContentType::Feature => "feature",
            ContentType::Brand => "brand",
        }
    }
}

impl FromStr for ContentType {
    type Err = AutocastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "meme" => Ok(ContentType::Meme),
            "feature" => Ok(ContentType::Feature),
            "brand" => Ok(ContentType::Brand),
            other => Err(AutocastError::InvalidInput(format!(
                "Unknown content type: {}",
                other
            ))),
        }
    }
}

/// Content lifecycle: draft -> scheduled -> posted, never backwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Draft,
    Scheduled,
    Posted,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Scheduled => "scheduled",
            ContentStatus::Posted => "posted",
        }
    }

    /// Draft or scheduled: not yet published
    pub fn is_unpublished(&self) -> bool {
        matches!(self, ContentStatus::Draft | ContentStatus::Scheduled)
    }

    fn rank(&self) -> u8 {
        match self {
            ContentStatus::Draft => 0,
            ContentStatus::Scheduled => 1,
            ContentStatus::Posted => 2,
        }
    }

    /// Whether moving from `self` to `next` keeps the one-way progression
    pub fn can_advance_to(&self, next: ContentStatus) -> bool {
        next.rank() >= self.rank()
    }
}

impl FromStr for ContentStatus {
    type Err = AutocastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ContentStatus::Draft),
            "scheduled" => Ok(ContentStatus::Scheduled),
            "posted" => Ok(ContentStatus::Posted),
            other => Err(AutocastError::InvalidInput(format!(
                "Unknown content status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub project_id: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub platform: Platform,
    pub image_prompt: Option<String>,
    pub image_url: Option<String>,
    pub status: ContentStatus,
    pub post_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewContent {
    pub project_id: String,
    pub content_type: ContentType,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub platform: Platform,
    pub image_prompt: Option<String>,
}

impl NewContent {
    pub fn into_draft(self) -> ContentItem {
        ContentItem {
            id: Uuid::new_v4().to_string(),
            project_id: self.project_id,
            content_type: self.content_type,
            caption: self.caption,
            hashtags: self.hashtags,
            platform: self.platform,
            image_prompt: self.image_prompt,
            image_url: None,
            status: ContentStatus::Draft,
            post_url: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    Discovered,
    Engaged,
    Interested,
    Customer,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Discovered => "discovered",
            LeadStatus::Engaged => "engaged",
            LeadStatus::Interested => "interested",
            LeadStatus::Customer => "customer",
        }
    }
}

impl FromStr for LeadStatus {
    type Err = AutocastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "discovered" => Ok(LeadStatus::Discovered),
            "engaged" => Ok(LeadStatus::Engaged),
            "interested" => Ok(LeadStatus::Interested),
            "customer" => Ok(LeadStatus::Customer),
            other => Err(AutocastError::InvalidInput(format!(
                "Unknown lead status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Ai,
    Lead,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationEntry {
    pub role: MessageRole,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationEntry {
    pub fn ai(message: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Ai,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeadMetadata {
    /// The platform's native post/comment id; required for real replies
    pub source_id: Option<String>,
    /// AI-fabricated persona; never contacted over the network
    pub is_simulated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub project_id: String,
    pub name: String,
    /// Free-form for simulated personas; parsed into [`Platform`] when replying
    pub platform: String,
    pub profile_url: String,
    pub pain_point: String,
    pub status: LeadStatus,
    pub last_message: Option<String>,
    pub conversations: Vec<ConversationEntry>,
    pub metadata: LeadMetadata,
    pub discovered_at: DateTime<Utc>,
}

impl Lead {
    /// Real lead with a source id that a platform reply can target
    pub fn is_replyable(&self) -> bool {
        !self.metadata.is_simulated
            && self
                .metadata
                .source_id
                .as_deref()
                .is_some_and(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct NewLead {
    pub project_id: String,
    pub name: String,
    pub platform: String,
    pub profile_url: String,
    pub pain_point: String,
    pub last_message: Option<String>,
    pub conversations: Vec<ConversationEntry>,
    pub metadata: LeadMetadata,
}

impl NewLead {
    pub fn into_lead(self) -> Lead {
        Lead {
            id: Uuid::new_v4().to_string(),
            project_id: self.project_id,
            name: self.name,
            platform: self.platform,
            profile_url: self.profile_url,
            pain_point: self.pain_point,
            status: LeadStatus::Discovered,
            last_message: self.last_message,
            conversations: self.conversations,
            metadata: self.metadata,
            discovered_at: Utc::now(),
        }
    }
}

/// Changes to a lead; conversation entries are only ever appended
#[derive(Debug, Clone, Default)]
pub struct LeadPatch {
    pub status: Option<LeadStatus>,
    pub last_message: Option<String>,
    pub append_conversations: Vec<ConversationEntry>,
}

impl LeadPatch {
    pub fn apply(&self, lead: &mut Lead) {
        if let Some(status) = self.status {
            lead.status = status;
        }
        if let Some(message) = &self.last_message {
            lead.last_message = Some(message.clone());
        }
        lead.conversations
            .extend(self.append_conversations.iter().cloned());
    }
}

/// Summary of one orchestrator run; never persisted
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CycleResult {
    pub project_id: String,
    pub content_generated: usize,
    pub images_generated: usize,
    pub posts_published: usize,
    pub leads_discovered: usize,
    pub leads_engaged: usize,
    pub errors: Vec<String>,
}

impl CycleResult {
    pub fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            ..Default::default()
        }
    }

    pub fn record_error(&mut self, step: &str, error: impl fmt::Display) {
        self.errors.push(format!("{}: {}", step, error));
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
