//! Record storage for projects, accounts, content and leads
//!
//! Everything the cycle reads or writes goes through [`RecordStore`], so the
//! orchestrator never knows whether it is talking to SQLite or to memory.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::{AutocastError, Result};
use crate::types::{
    ContentItem, ContentStatus, Lead, LeadPatch, NewContent, NewLead, NewProject,
    NewSocialAccount, Platform, Project, ProjectPatch, SocialAccount, TokenUpdate,
};

pub use memory::MemoryStore;
pub use sqlite::Database;

/// List/get/upsert access to the persisted records.
///
/// Lists come back in insertion order. Content and leads are never deleted.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_projects(&self) -> Result<Vec<Project>>;

    async fn get_project(&self, id: &str) -> Result<Option<Project>>;

    async fn create_project(&self, project: NewProject) -> Result<Project>;

    /// Fails with `NotFound` when the project does not exist
    async fn update_project(&self, id: &str, patch: ProjectPatch) -> Result<Project>;

    async fn get_content(&self, project_id: &str) -> Result<Vec<ContentItem>>;

    /// Persist new items as drafts, returning them with their assigned ids
    async fn add_content(&self, items: Vec<NewContent>) -> Result<Vec<ContentItem>>;

    async fn update_content_image(&self, id: &str, image_url: &str) -> Result<()>;

    /// Rejects a status that would move the item backwards
    async fn update_content_status(
        &self,
        id: &str,
        status: ContentStatus,
        post_url: Option<&str>,
    ) -> Result<()>;

    async fn get_leads(&self, project_id: &str) -> Result<Vec<Lead>>;

    /// Persist new leads as `discovered`, preserving the given order
    async fn add_leads(&self, leads: Vec<NewLead>) -> Result<Vec<Lead>>;

    async fn update_lead(&self, id: &str, patch: LeadPatch) -> Result<Lead>;

    async fn get_social_account(
        &self,
        project_id: &str,
        platform: Platform,
    ) -> Result<Option<SocialAccount>>;

    async fn get_social_accounts(&self, project_id: &str) -> Result<Vec<SocialAccount>>;

    /// Connect an account, replacing any existing one for the same project and platform
    async fn connect_social_account(&self, account: NewSocialAccount) -> Result<SocialAccount>;

    /// Returns false when nothing was connected
    async fn disconnect_social_account(&self, project_id: &str, platform: Platform)
        -> Result<bool>;

    /// Write refreshed credentials back
    async fn update_social_account(&self, id: &str, update: TokenUpdate)
        -> Result<SocialAccount>;
}

pub(crate) fn status_regression(id: &str, from: ContentStatus, to: ContentStatus) -> AutocastError {
    AutocastError::InvalidInput(format!(
        "Content {} cannot move from {} back to {}",
        id,
        from.as_str(),
        to.as_str()
    ))
}
