//! SQLite record store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;
use uuid::Uuid;

use super::{status_regression, RecordStore};
use crate::error::{AutocastError, DbError, Result};
use crate::types::{
    ContentItem, ContentStatus, Lead, LeadPatch, NewContent, NewLead, NewProject,
    NewSocialAccount, Platform, Project, ProjectPatch, SocialAccount, TokenUpdate,
};

const PROJECT_COLUMNS: &str = "id, name, vision, repo_url, logo, target_languages, \
     agent_frequency_hours, last_run_at, created_at";

const ACCOUNT_COLUMNS: &str = "id, project_id, platform, username, access_token, \
     refresh_token, expires_at, connected_at";

const CONTENT_COLUMNS: &str = "id, project_id, content_type, caption, hashtags, platform, \
     image_prompt, image_url, status, post_url, created_at";

const LEAD_COLUMNS: &str = "id, project_id, name, platform, profile_url, pain_point, status, \
     last_message, conversations, metadata, discovered_at";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }
        }

        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    async fn fetch_lead(&self, id: &str) -> Result<Option<Lead>> {
        let row = sqlx::query(&format!("SELECT {} FROM leads WHERE id = ?", LEAD_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        row.as_ref().map(lead_from_row).transpose()
    }

    async fn fetch_account(&self, id: &str) -> Result<Option<SocialAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM social_accounts WHERE id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        row.as_ref().map(account_from_row).transpose()
    }
}

fn corrupt(column: &str, reason: impl ToString) -> AutocastError {
    DbError::Corrupt {
        column: column.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64, column: &str) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| corrupt(column, format!("timestamp {} out of range", ms)))
}

fn to_json<T: serde::Serialize>(value: &T, column: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| corrupt(column, e))
}

fn from_json<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.get(column);
    serde_json::from_str(&raw).map_err(|e| corrupt(column, e))
}

fn parse_column<T: std::str::FromStr>(row: &SqliteRow, column: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw: String = row.get(column);
    raw.parse().map_err(|e: T::Err| corrupt(column, e))
}

fn project_from_row(row: &SqliteRow) -> Result<Project> {
    let hours: i64 = row.get("agent_frequency_hours");
    let last_run_at: Option<i64> = row.get("last_run_at");

    Ok(Project {
        id: row.get("id"),
        name: row.get("name"),
        vision: row.get("vision"),
        repo_url: row.get("repo_url"),
        logo: row.get("logo"),
        target_languages: from_json(row, "target_languages")?,
        agent_frequency_hours: u32::try_from(hours)
            .map_err(|e| corrupt("agent_frequency_hours", e))?,
        last_run_at: last_run_at
            .map(|ms| from_millis(ms, "last_run_at"))
            .transpose()?,
        created_at: from_millis(row.get("created_at"), "created_at")?,
    })
}

fn account_from_row(row: &SqliteRow) -> Result<SocialAccount> {
    Ok(SocialAccount {
        id: row.get("id"),
        project_id: row.get("project_id"),
        platform: parse_column(row, "platform")?,
        username: row.get("username"),
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        expires_at: row.get("expires_at"),
        connected_at: from_millis(row.get("connected_at"), "connected_at")?,
    })
}

fn content_from_row(row: &SqliteRow) -> Result<ContentItem> {
    Ok(ContentItem {
        id: row.get("id"),
        project_id: row.get("project_id"),
        content_type: parse_column(row, "content_type")?,
        caption: row.get("caption"),
        hashtags: from_json(row, "hashtags")?,
        platform: parse_column(row, "platform")?,
        image_prompt: row.get("image_prompt"),
        image_url: row.get("image_url"),
        status: parse_column(row, "status")?,
        post_url: row.get("post_url"),
        created_at: from_millis(row.get("created_at"), "created_at")?,
    })
}

fn lead_from_row(row: &SqliteRow) -> Result<Lead> {
    Ok(Lead {
        id: row.get("id"),
        project_id: row.get("project_id"),
        name: row.get("name"),
        platform: row.get("platform"),
        profile_url: row.get("profile_url"),
        pain_point: row.get("pain_point"),
        status: parse_column(row, "status")?,
        last_message: row.get("last_message"),
        conversations: from_json(row, "conversations")?,
        metadata: from_json(row, "metadata")?,
        discovered_at: from_millis(row.get("discovered_at"), "discovered_at")?,
    })
}

#[async_trait]
impl RecordStore for Database {
    async fn get_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM projects ORDER BY rowid",
            PROJECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(project_from_row).collect()
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let row = sqlx::query(&format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.as_ref().map(project_from_row).transpose()
    }

    async fn create_project(&self, project: NewProject) -> Result<Project> {
        let project = project.into_project();

        sqlx::query(
            r#"
            INSERT INTO projects (id, name, vision, repo_url, logo, target_languages,
                                  agent_frequency_hours, last_run_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.vision)
        .bind(&project.repo_url)
        .bind(&project.logo)
        .bind(to_json(&project.target_languages, "target_languages")?)
        .bind(i64::from(project.agent_frequency_hours))
        .bind(project.last_run_at.map(to_millis))
        .bind(to_millis(project.created_at))
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(project)
    }

    async fn update_project(&self, id: &str, patch: ProjectPatch) -> Result<Project> {
        let mut project = self
            .get_project(id)
            .await?
            .ok_or_else(|| AutocastError::NotFound(format!("Project {}", id)))?;
        patch.apply(&mut project);

        sqlx::query(
            r#"
            UPDATE projects
            SET name = ?, vision = ?, agent_frequency_hours = ?, last_run_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&project.name)
        .bind(&project.vision)
        .bind(i64::from(project.agent_frequency_hours))
        .bind(project.last_run_at.map(to_millis))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(project)
    }

    async fn get_content(&self, project_id: &str) -> Result<Vec<ContentItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM content_items WHERE project_id = ? ORDER BY rowid",
            CONTENT_COLUMNS
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(content_from_row).collect()
    }

    async fn add_content(&self, items: Vec<NewContent>) -> Result<Vec<ContentItem>> {
        let drafts: Vec<ContentItem> = items.into_iter().map(NewContent::into_draft).collect();
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        for item in &drafts {
            sqlx::query(
                r#"
                INSERT INTO content_items (id, project_id, content_type, caption, hashtags,
                                           platform, image_prompt, image_url, status, post_url,
                                           created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&item.id)
            .bind(&item.project_id)
            .bind(item.content_type.as_str())
            .bind(&item.caption)
            .bind(to_json(&item.hashtags, "hashtags")?)
            .bind(item.platform.as_str())
            .bind(&item.image_prompt)
            .bind(&item.image_url)
            .bind(item.status.as_str())
            .bind(&item.post_url)
            .bind(to_millis(item.created_at))
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;
        }

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(drafts)
    }

    async fn update_content_image(&self, id: &str, image_url: &str) -> Result<()> {
        let result = sqlx::query("UPDATE content_items SET image_url = ? WHERE id = ?")
            .bind(image_url)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(AutocastError::NotFound(format!("Content {}", id)));
        }
        Ok(())
    }

    async fn update_content_status(
        &self,
        id: &str,
        status: ContentStatus,
        post_url: Option<&str>,
    ) -> Result<()> {
        let row = sqlx::query("SELECT status FROM content_items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?
            .ok_or_else(|| AutocastError::NotFound(format!("Content {}", id)))?;
        let current: ContentStatus = parse_column(&row, "status")?;

        if !current.can_advance_to(status) {
            return Err(status_regression(id, current, status));
        }

        sqlx::query(
            "UPDATE content_items SET status = ?, post_url = COALESCE(?, post_url) WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(post_url)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn get_leads(&self, project_id: &str) -> Result<Vec<Lead>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM leads WHERE project_id = ? ORDER BY rowid",
            LEAD_COLUMNS
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(lead_from_row).collect()
    }

    async fn add_leads(&self, leads: Vec<NewLead>) -> Result<Vec<Lead>> {
        let leads: Vec<Lead> = leads.into_iter().map(NewLead::into_lead).collect();
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        for lead in &leads {
            sqlx::query(
                r#"
                INSERT INTO leads (id, project_id, name, platform, profile_url, pain_point,
                                   status, last_message, conversations, metadata, discovered_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&lead.id)
            .bind(&lead.project_id)
            .bind(&lead.name)
            .bind(&lead.platform)
            .bind(&lead.profile_url)
            .bind(&lead.pain_point)
            .bind(lead.status.as_str())
            .bind(&lead.last_message)
            .bind(to_json(&lead.conversations, "conversations")?)
            .bind(to_json(&lead.metadata, "metadata")?)
            .bind(to_millis(lead.discovered_at))
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;
        }

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(leads)
    }

    async fn update_lead(&self, id: &str, patch: LeadPatch) -> Result<Lead> {
        let mut lead = self
            .fetch_lead(id)
            .await?
            .ok_or_else(|| AutocastError::NotFound(format!("Lead {}", id)))?;
        patch.apply(&mut lead);

        sqlx::query(
            "UPDATE leads SET status = ?, last_message = ?, conversations = ? WHERE id = ?",
        )
        .bind(lead.status.as_str())
        .bind(&lead.last_message)
        .bind(to_json(&lead.conversations, "conversations")?)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(lead)
    }

    async fn get_social_account(
        &self,
        project_id: &str,
        platform: Platform,
    ) -> Result<Option<SocialAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM social_accounts WHERE project_id = ? AND platform = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(project_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn get_social_accounts(&self, project_id: &str) -> Result<Vec<SocialAccount>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM social_accounts WHERE project_id = ? ORDER BY rowid",
            ACCOUNT_COLUMNS
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(account_from_row).collect()
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

        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query("DELETE FROM social_accounts WHERE project_id = ? AND platform = ?")
            .bind(&account.project_id)
            .bind(account.platform.as_str())
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::query(
            r#"
            INSERT INTO social_accounts (id, project_id, platform, username, access_token,
                                         refresh_token, expires_at, connected_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.project_id)
        .bind(account.platform.as_str())
        .bind(&account.username)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.expires_at)
        .bind(to_millis(account.connected_at))
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(account)
    }

    async fn disconnect_social_account(
        &self,
        project_id: &str,
        platform: Platform,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM social_accounts WHERE project_id = ? AND platform = ?")
            .bind(project_id)
            .bind(platform.as_str())
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_social_account(
        &self,
        id: &str,
        update: TokenUpdate,
    ) -> Result<SocialAccount> {
        let result = sqlx::query(
            "UPDATE social_accounts SET access_token = ?, refresh_token = ?, expires_at = ? WHERE id = ?",
        )
        .bind(&update.access_token)
        .bind(&update.refresh_token)
        .bind(update.expires_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(AutocastError::NotFound(format!("Social account {}", id)));
        }

        self.fetch_account(id)
            .await?
            .ok_or_else(|| AutocastError::NotFound(format!("Social account {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConversationEntry, LeadMetadata, LeadStatus};
    use tempfile::TempDir;

    async fn open_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        (db, temp_dir)
    }

    async fn create_project(db: &Database) -> Project {
        db.create_project(NewProject {
            name: "Orbit".to_string(),
            vision: "Ship telemetry dashboards without a data team".to_string(),
            repo_url: "https://github.com/orbit/orbit".to_string(),
            logo: Some("https://orbit.dev/logo.png".to_string()),
            target_languages: vec!["Spanish".to_string()],
            agent_frequency_hours: Some(12),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_database_initialization_with_invalid_path() {
        let result = Database::new("/tmp/autocast\0invalid.db").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_project_round_trip_through_columns() {
        let (db, _dir) = open_test_db().await;
        let created = create_project(&db).await;

        let loaded = db.get_project(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Orbit");
        assert_eq!(loaded.target_languages, vec!["Spanish".to_string()]);
        assert_eq!(loaded.agent_frequency_hours, 12);
        assert_eq!(loaded.last_run_at, None);
        assert_eq!(
            loaded.created_at.timestamp_millis(),
            created.created_at.timestamp_millis()
        );

        assert!(db.get_project("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_project_last_run() {
        let (db, _dir) = open_test_db().await;
        let project = create_project(&db).await;
        let at = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();

        db.update_project(&project.id, ProjectPatch::last_run(at))
            .await
            .unwrap();

        let loaded = db.get_project(&project.id).await.unwrap().unwrap();
        assert_eq!(loaded.last_run_at, Some(at));
    }

    #[tokio::test]
    async fn test_content_lifecycle() {
        let (db, _dir) = open_test_db().await;
        let project = create_project(&db).await;

        let added = db
            .add_content(vec![NewContent {
                project_id: project.id.clone(),
                content_type: crate::types::ContentType::Meme,
                caption: "When the build finally passes".to_string(),
                hashtags: vec!["rust".to_string(), "rust".to_string()],
                platform: Platform::LinkedIn,
                image_prompt: Some("a crab celebrating".to_string()),
            }])
            .await
            .unwrap();
        let id = &added[0].id;

        db.update_content_image(id, "/generated/a.png").await.unwrap();
        db.update_content_status(id, ContentStatus::Posted, Some("https://www.linkedin.com/feed/update/1"))
            .await
            .unwrap();

        let items = db.get_content(&project.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].hashtags, vec!["rust", "rust"]);
        assert_eq!(items[0].image_url.as_deref(), Some("/generated/a.png"));
        assert_eq!(items[0].status, ContentStatus::Posted);
        assert!(items[0].post_url.is_some());

        let err = db
            .update_content_status(id, ContentStatus::Draft, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AutocastError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_leads_preserve_order_and_metadata() {
        let (db, _dir) = open_test_db().await;
        let project = create_project(&db).await;

        let lead = |name: &str, source: Option<&str>, simulated: bool| NewLead {
            project_id: project.id.clone(),
            name: name.to_string(),
            platform: "twitter".to_string(),
            profile_url: format!("https://twitter.com/{}", name),
            pain_point: "manual dashboards".to_string(),
            last_message: None,
            conversations: vec![ConversationEntry::ai("Found via twitter.")],
            metadata: LeadMetadata {
                source_id: source.map(str::to_string),
                is_simulated: simulated,
            },
        };

        let added = db
            .add_leads(vec![lead("real", Some("post123"), false), lead("persona", None, true)])
            .await
            .unwrap();

        let leads = db.get_leads(&project.id).await.unwrap();
        assert_eq!(leads[0].name, "real");
        assert_eq!(leads[0].metadata.source_id.as_deref(), Some("post123"));
        assert!(leads[1].metadata.is_simulated);

        let updated = db
            .update_lead(
                &added[0].id,
                LeadPatch {
                    status: Some(LeadStatus::Engaged),
                    last_message: Some("reply".to_string()),
                    append_conversations: vec![ConversationEntry::ai("reply")],
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.conversations.len(), 2);

        let reloaded = db.get_leads(&project.id).await.unwrap();
        assert_eq!(reloaded[0].status, LeadStatus::Engaged);
        assert_eq!(reloaded[0].conversations[1].message, "reply");
    }

    #[tokio::test]
    async fn test_mixed_lead_batches_keep_insertion_order() {
        let (db, _dir) = open_test_db().await;
        let project = create_project(&db).await;

        let lead = |name: &str, simulated: bool| NewLead {
            project_id: project.id.clone(),
            name: name.to_string(),
            platform: if simulated { "Reddit" } else { "twitter" }.to_string(),
            profile_url: format!("https://example.com/{}", name),
            pain_point: "manual dashboards".to_string(),
            last_message: None,
            conversations: Vec::new(),
            metadata: LeadMetadata {
                source_id: (!simulated).then(|| format!("src-{}", name)),
                is_simulated: simulated,
            },
        };

        db.add_leads(vec![
            lead("zed", false),
            lead("amy", false),
            lead("mika", false),
            lead("persona-b", true),
            lead("persona-a", true),
        ])
        .await
        .unwrap();
        db.add_leads(vec![lead("bo", false), lead("persona-c", true)])
            .await
            .unwrap();

        let leads = db.get_leads(&project.id).await.unwrap();
        let names: Vec<&str> = leads.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["zed", "amy", "mika", "persona-b", "persona-a", "bo", "persona-c"]
        );
        let simulated: Vec<bool> = leads.iter().map(|l| l.metadata.is_simulated).collect();
        assert_eq!(simulated, vec![false, false, false, true, true, false, true]);
    }

    #[tokio::test]
    async fn test_content_status_only_moves_forward() {
        let (db, _dir) = open_test_db().await;
        let project = create_project(&db).await;

        let added = db
            .add_content(vec![NewContent {
                project_id: project.id.clone(),
                content_type: crate::types::ContentType::Brand,
                caption: "Dashboards in one command".to_string(),
                hashtags: Vec::new(),
                platform: Platform::Twitter,
                image_prompt: None,
            }])
            .await
            .unwrap();
        let id = &added[0].id;

        db.update_content_status(id, ContentStatus::Scheduled, None)
            .await
            .unwrap();
        db.update_content_status(id, ContentStatus::Posted, Some("https://twitter.com/orbit/status/1"))
            .await
            .unwrap();

        for regression in [ContentStatus::Draft, ContentStatus::Scheduled] {
            let err = db
                .update_content_status(id, regression, None)
                .await
                .unwrap_err();
            assert!(matches!(err, AutocastError::InvalidInput(_)));
            assert!(err.to_string().contains("cannot move from posted back to"));
        }

        let items = db.get_content(&project.id).await.unwrap();
        assert_eq!(items[0].status, ContentStatus::Posted);
        assert_eq!(
            items[0].post_url.as_deref(),
            Some("https://twitter.com/orbit/status/1")
        );

        let missing = db
            .update_content_status("no-such-item", ContentStatus::Posted, None)
            .await
            .unwrap_err();
        assert!(matches!(missing, AutocastError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_connect_supersedes_and_refresh_updates() {
        let (db, _dir) = open_test_db().await;
        let project = create_project(&db).await;

        let connect = |token: &str| NewSocialAccount {
            project_id: project.id.clone(),
            platform: Platform::Twitter,
            username: "orbit".to_string(),
            access_token: token.to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some(1_000),
        };

        db.connect_social_account(connect("first")).await.unwrap();
        let second = db.connect_social_account(connect("second")).await.unwrap();

        let accounts = db.get_social_accounts(&project.id).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].access_token, "second");

        let updated = db
            .update_social_account(
                &second.id,
                TokenUpdate {
                    access_token: "third".to_string(),
                    refresh_token: Some("refresh-2".to_string()),
                    expires_at: Some(2_000),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.access_token, "third");
        assert_eq!(updated.expires_at, Some(2_000));

        assert!(db
            .disconnect_social_account(&project.id, Platform::Twitter)
            .await
            .unwrap());
        assert!(db
            .get_social_account(&project.id, Platform::Twitter)
            .await
            .unwrap()
            .is_none());
    }
}
