//! In-memory record store for tests and embedding

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{status_regression, RecordStore};
use crate::error::{AutocastError, Result};
use crate::types::{
    ContentItem, ContentStatus, Lead, LeadPatch, NewContent, NewLead, NewProject,
    NewSocialAccount, Platform, Project, ProjectPatch, SocialAccount, TokenUpdate,
};

#[derive(Default)]
struct Records {
    projects: Vec<Project>,
    accounts: Vec<SocialAccount>,
    content: Vec<ContentItem>,
    leads: Vec<Lead>,
}

/// Vec-backed store. Lists keep insertion order like the SQLite store.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed project, keeping its id and timestamps
    pub async fn insert_project(&self, project: Project) {
        self.records.lock().await.projects.push(project);
    }

    /// Insert a fully-formed account, replacing any for the same project and platform
    pub async fn insert_social_account(&self, account: SocialAccount) {
        let mut records = self.records.lock().await;
        records
            .accounts
            .retain(|a| !(a.project_id == account.project_id && a.platform == account.platform));
        records.accounts.push(account);
    }

    /// Insert a fully-formed content item
    pub async fn insert_content(&self, item: ContentItem) {
        self.records.lock().await.content.push(item);
    }

    /// Insert a fully-formed lead
    pub async fn insert_lead(&self, lead: Lead) {
        self.records.lock().await.leads.push(lead);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_projects(&self) -> Result<Vec<Project>> {
        Ok(self.records.lock().await.projects.clone())
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let records = self.records.lock().await;
        Ok(records.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn create_project(&self, project: NewProject) -> Result<Project> {
        let project = project.into_project();
        self.records.lock().await.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(&self, id: &str, patch: ProjectPatch) -> Result<Project> {
        let mut records = self.records.lock().await;
        let project = records
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AutocastError::NotFound(format!("Project {}", id)))?;
        patch.apply(project);
        Ok(project.clone())
    }

    async fn get_content(&self, project_id: &str) -> Result<Vec<ContentItem>> {
        let records = self.records.lock().await;
        Ok(records
            .content
            .iter()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn add_content(&self, items: Vec<NewContent>) -> Result<Vec<ContentItem>> {
        let drafts: Vec<ContentItem> = items.into_iter().map(NewContent::into_draft).collect();
        self.records
            .lock()
            .await
            .content
            .extend(drafts.iter().cloned());
        Ok(drafts)
    }

    async fn update_content_image(&self, id: &str, image_url: &str) -> Result<()> {
        let mut records = self.records.lock().await;
        let item = records
            .content
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AutocastError::NotFound(format!("Content {}", id)))?;
        item.image_url = Some(image_url.to_string());
        Ok(())
    }

    async fn update_content_status(
        &self,
        id: &str,
        status: ContentStatus,
        post_url: Option<&str>,
    ) -> Result<()> {
        let mut records = self.records.lock().await;
        let item = records
            .content
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AutocastError::NotFound(format!("Content {}", id)))?;

        if !item.status.can_advance_to(status) {
            return Err(status_regression(id, item.status, status));
        }

        item.status = status;
        if let Some(url) = post_url {
            item.post_url = Some(url.to_string());
        }
        Ok(())
    }

    async fn get_leads(&self, project_id: &str) -> Result<Vec<Lead>> {
        let records = self.records.lock().await;
        Ok(records
            .leads
            .iter()
            .filter(|l| l.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn add_leads(&self, leads: Vec<NewLead>) -> Result<Vec<Lead>> {
        let leads: Vec<Lead> = leads.into_iter().map(NewLead::into_lead).collect();
        self.records.lock().await.leads.extend(leads.iter().cloned());
        Ok(leads)
    }

    async fn update_lead(&self, id: &str, patch: LeadPatch) -> Result<Lead> {
        let mut records = self.records.lock().await;
        let lead = records
            .leads
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| AutocastError::NotFound(format!("Lead {}", id)))?;
        patch.apply(lead);
        Ok(lead.clone())
    }

    async fn get_social_account(
        &self,
        project_id: &str,
        platform: Platform,
    ) -> Result<Option<SocialAccount>> {
        let records = self.records.lock().await;
        Ok(records
            .accounts
            .iter()
            .find(|a| a.project_id == project_id && a.platform == platform)
            .cloned())
    }

    async fn get_social_accounts(&self, project_id: &str) -> Result<Vec<SocialAccount>> {
        let records = self.records.lock().await;
        Ok(records
            .accounts
            .iter()
            .filter(|a| a.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn connect_social_account(&self, account: NewSocialAccount) -> Result<SocialAccount> {
        let account = SocialAccount {
            id: Uuid::new_v4().to_string(),
            project_id: account.project_id,
            platform: account.platform,
            username: account.username,
            access_token: account.access_token,
            refresh_token: account.refresh_token,
            expires_at: account.expires_at,
            connected_at: Utc::now(),
        };
        self.insert_social_account(account.clone()).await;
        Ok(account)
    }

    async fn disconnect_social_account(
        &self,
        project_id: &str,
        platform: Platform,
    ) -> Result<bool> {
        let mut records = self.records.lock().await;
        let before = records.accounts.len();
        records
            .accounts
            .retain(|a| !(a.project_id == project_id && a.platform == platform));
        Ok(records.accounts.len() < before)
    }

    async fn update_social_account(
        &self,
        id: &str,
        update: TokenUpdate,
    ) -> Result<SocialAccount> {
        let mut records = self.records.lock().await;
        let account = records
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AutocastError::NotFound(format!("Social account {}", id)))?;
        update.apply(account);
        Ok(account.clone())
    }
}
