// src/core/database.rs
//! Database connection, migrations and the user/resume/session repositories

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::FsOps;
use crate::template_system::TemplateId;
use crate::types::ResumeData;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resume not found: {0}")]
    NotFound(String),

    #[error("resume limit reached ({0} per user)")]
    LimitReached(u32),

    #[error("stored resume {id} is corrupt: {source}")]
    Corrupt {
        id: String,
        source: serde_json::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ===== Core Database Connection Management =====

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the SQLite file and run migrations
    pub async fn new(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            FsOps::ensure_dir_exists(parent).await?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePool::connect(&database_url).await.with_context(|| {
            format!("Failed to connect to database: {}", database_path.display())
        })?;

        info!(
            "Database connection established: {}",
            database_path.display()
        );

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                display_name TEXT,
                created_at TEXT NOT NULL,
                last_seen_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create users table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS resumes (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                template_id INTEGER NOT NULL DEFAULT 1,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create resumes table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS revoked_sessions (
                session_key TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                revoked_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create revoked_sessions table")?;

        // Emails are not unique: phone and anonymous sign-ins carry none and
        // the provider may move an address to another account.
        sqlx::query("DROP INDEX IF EXISTS idx_users_email;")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email_lookup ON users(email);")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_resumes_user ON resumes(user_id, updated_at);",
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations completed");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }
}

// ===== Models =====

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ResumeRow {
    id: String,
    user_id: String,
    title: String,
    template_id: i64,
    data: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resume {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub template_id: TemplateId,
    pub data: ResumeData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSummary {
    pub id: String,
    pub title: String,
    pub template_id: TemplateId,
    pub completeness: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields an update may change; `None` leaves the stored value alone
#[derive(Debug, Clone, Default)]
pub struct ResumePatch {
    pub title: Option<String>,
    pub template_id: Option<TemplateId>,
    pub data: Option<ResumeData>,
}

impl ResumePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.template_id.is_none() && self.data.is_none()
    }
}

impl TryFrom<ResumeRow> for Resume {
    type Error = StoreError;

    fn try_from(row: ResumeRow) -> Result<Self, Self::Error> {
        let data = serde_json::from_str(&row.data).map_err(|source| StoreError::Corrupt {
            id: row.id.clone(),
            source,
        })?;

        let template_id = TemplateId::from_id(row.template_id).unwrap_or_else(|| {
            warn!(
                "Resume {} has unknown template id {}, using default",
                row.id, row.template_id
            );
            TemplateId::default()
        });

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            template_id,
            data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Resume> for ResumeSummary {
    fn from(resume: &Resume) -> Self {
        Self {
            id: resume.id.clone(),
            title: resume.title.clone(),
            template_id: resume.template_id,
            completeness: resume.data.completeness(),
            created_at: resume.created_at,
            updated_at: resume.updated_at,
        }
    }
}

const RESUME_COLUMNS: &str = "id, user_id, title, template_id, data, created_at, updated_at";

// ===== User Repository =====

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the user on first sight, otherwise refresh email and last_seen_at.
    /// A row pre-provisioned by the admin import takes over the real subject id.
    pub async fn get_or_create(&self, id: &str, email: &str) -> Result<User, StoreError> {
        let now = Utc::now();

        if !email.is_empty() {
            sqlx::query(
                r#"
                UPDATE users SET id = ?
                WHERE id = (
                    SELECT id FROM users
                    WHERE email = ? AND id LIKE 'pending:%'
                    ORDER BY created_at ASC
                    LIMIT 1
                )
                AND NOT EXISTS (SELECT 1 FROM users WHERE id = ?)
                "#,
            )
            .bind(id)
            .bind(email)
            .bind(id)
            .execute(self.pool)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, created_at, last_seen_at)
            VALUES (?, ?, NULL, ?, ?)
            ON CONFLICT(id) DO UPDATE SET email = excluded.email, last_seen_at = excluded.last_seen_at
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, display_name, created_at, last_seen_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, display_name, created_at, last_seen_at FROM users
            WHERE email = ?
            ORDER BY last_seen_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Pre-provision a user (admin import); keeps an existing row's id
    pub async fn upsert_by_email(
        &self,
        id: &str,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<User, StoreError> {
        if let Some(existing) = self.find_by_email(email).await? {
            sqlx::query("UPDATE users SET display_name = COALESCE(?, display_name) WHERE id = ?")
                .bind(display_name)
                .bind(&existing.id)
                .execute(self.pool)
                .await?;

            return Ok(User {
                display_name: display_name.map(str::to_string).or(existing.display_name),
                ..existing
            });
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, created_at, last_seen_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET display_name = COALESCE(excluded.display_name, users.display_name)
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(display_name)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.find_by_email(email)
            .await?
            .ok_or_else(|| StoreError::NotFound(email.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, email, display_name, created_at, last_seen_at FROM users ORDER BY email ASC",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(users)
    }
}

// ===== Resume Repository =====

pub struct ResumeRepository<'a> {
    pool: &'a SqlitePool,
    max_per_user: u32,
}

impl<'a> ResumeRepository<'a> {
    pub fn new(pool: &'a SqlitePool, max_per_user: u32) -> Self {
        Self { pool, max_per_user }
    }

    pub async fn count_for_user(&self, user_id: &str) -> Result<u32, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resumes WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count as u32)
    }

    pub async fn save_resume(
        &self,
        user_id: &str,
        title: Option<&str>,
        template_id: TemplateId,
        data: &ResumeData,
    ) -> Result<Resume, StoreError> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let title = match title.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => data.default_title(),
        };

        // Count and insert in one statement so concurrent saves respect the limit
        let result = sqlx::query(
            r#"
            INSERT INTO resumes (id, user_id, title, template_id, data, created_at, updated_at)
            SELECT ?, ?, ?, ?, ?, ?, ?
            WHERE (SELECT COUNT(*) FROM resumes WHERE user_id = ?) < ?
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&title)
        .bind(template_id.id())
        .bind(serde_json::to_string(data)?)
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(i64::from(self.max_per_user))
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::LimitReached(self.max_per_user));
        }

        info!("Saved resume {} for user {}", id, user_id);

        Ok(Resume {
            id,
            user_id: user_id.to_string(),
            title,
            template_id,
            data: data.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_resume(&self, user_id: &str, id: &str) -> Result<Resume, StoreError> {
        let row = sqlx::query_as::<_, ResumeRow>(&format!(
            "SELECT {} FROM resumes WHERE id = ? AND user_id = ?",
            RESUME_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        row.try_into()
    }

    /// Newest first
    pub async fn get_resumes(&self, user_id: &str) -> Result<Vec<ResumeSummary>, StoreError> {
        let rows = sqlx::query_as::<_, ResumeRow>(&format!(
            "SELECT {} FROM resumes WHERE user_id = ? ORDER BY updated_at DESC, id ASC",
            RESUME_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            match Resume::try_from(row) {
                Ok(resume) => summaries.push(ResumeSummary::from(&resume)),
                Err(e) => warn!("Skipping unreadable resume: {}", e),
            }
        }
        Ok(summaries)
    }

    pub async fn update_resume(
        &self,
        user_id: &str,
        id: &str,
        patch: ResumePatch,
    ) -> Result<Resume, StoreError> {
        let mut resume = self.get_resume(user_id, id).await?;
        if patch.is_empty() {
            return Ok(resume);
        }

        if let Some(title) = patch.title {
            let title = title.trim();
            if !title.is_empty() {
                resume.title = title.to_string();
            }
        }
        if let Some(template_id) = patch.template_id {
            resume.template_id = template_id;
        }
        if let Some(data) = patch.data {
            resume.data = data;
        }
        resume.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE resumes
            SET title = ?, template_id = ?, data = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&resume.title)
        .bind(resume.template_id.id())
        .bind(serde_json::to_string(&resume.data)?)
        .bind(resume.updated_at)
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        info!("Updated resume {} for user {}", id, user_id);
        Ok(resume)
    }

    pub async fn delete_resume(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM resumes WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        info!("Deleted resume {} for user {}", id, user_id);
        Ok(())
    }
}

// ===== Session Repository =====

pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn revoke(
        &self,
        session_key: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO revoked_sessions (session_key, user_id, revoked_at, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(session_key) DO NOTHING
            "#,
        )
        .bind(session_key)
        .bind(user_id)
        .bind(Utc::now())
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        info!("Revoked session for user {}", user_id);
        Ok(())
    }

    pub async fn is_revoked(&self, session_key: &str) -> Result<bool, StoreError> {
        let found: Option<String> = sqlx::query_scalar(
            "SELECT session_key FROM revoked_sessions WHERE session_key = ?",
        )
        .bind(session_key)
        .fetch_optional(self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Drop revocations whose tokens have expired anyway
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM revoked_sessions WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("test.db")).await.unwrap();
        (dir, db)
    }

    fn sample_data(name: &str) -> ResumeData {
        let mut data = ResumeData::default();
        data.personal_info.full_name = name.to_string();
        data.skills = vec!["Rust".to_string()];
        data
    }

    #[tokio::test]
    async fn test_user_upsert_refreshes_email() {
        let (_dir, db) = test_db().await;
        let users = UserRepository::new(db.pool());

        let first = users.get_or_create("u1", "old@example.com").await.unwrap();
        let second = users.get_or_create("u1", "new@example.com").await.unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.email, "new@example.com");
        assert_eq!(users.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_users_may_share_an_email() {
        let (_dir, db) = test_db().await;
        let users = UserRepository::new(db.pool());

        let first = users.get_or_create("phone-user-1", "").await.unwrap();
        let second = users.get_or_create("phone-user-2", "").await.unwrap();
        assert_eq!(first.id, "phone-user-1");
        assert_eq!(second.id, "phone-user-2");

        users.get_or_create("old-owner", "shared@example.com").await.unwrap();
        let new_owner = users
            .get_or_create("new-owner", "shared@example.com")
            .await
            .unwrap();
        assert_eq!(new_owner.id, "new-owner");

        // Repeated requests keep working
        users.get_or_create("new-owner", "shared@example.com").await.unwrap();
        assert_eq!(users.list().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_pending_row_not_taken_over_by_existing_user() {
        let (_dir, db) = test_db().await;
        let users = UserRepository::new(db.pool());

        users.get_or_create("real", "old@example.com").await.unwrap();
        users
            .upsert_by_email("pending:1", "new@example.com", Some("New"))
            .await
            .unwrap();

        let user = users.get_or_create("real", "new@example.com").await.unwrap();
        assert_eq!(user.id, "real");
        assert_eq!(users.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resume_lifecycle_and_ownership() {
        let (_dir, db) = test_db().await;
        let users = UserRepository::new(db.pool());
        users.get_or_create("alice", "alice@example.com").await.unwrap();
        users.get_or_create("bob", "bob@example.com").await.unwrap();

        let repo = ResumeRepository::new(db.pool(), 10);
        let saved = repo
            .save_resume("alice", None, TemplateId::Classic, &sample_data("Alice"))
            .await
            .unwrap();
        assert_eq!(saved.title, "Alice Resume");

        assert!(matches!(
            repo.get_resume("bob", &saved.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete_resume("bob", &saved.id).await,
            Err(StoreError::NotFound(_))
        ));

        let updated = repo
            .update_resume(
                "alice",
                &saved.id,
                ResumePatch {
                    title: Some("Backend CV".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Backend CV");
        assert_eq!(updated.template_id, TemplateId::Classic);
        assert!(updated.updated_at >= saved.updated_at);

        let listed = repo.get_resumes("alice").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].completeness, 25);
        assert!(repo.get_resumes("bob").await.unwrap().is_empty());

        repo.delete_resume("alice", &saved.id).await.unwrap();
        assert!(repo.get_resumes("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resume_limit() {
        let (_dir, db) = test_db().await;
        UserRepository::new(db.pool())
            .get_or_create("carol", "carol@example.com")
            .await
            .unwrap();

        let repo = ResumeRepository::new(db.pool(), 1);
        repo.save_resume("carol", Some("One"), TemplateId::Modern, &sample_data("C"))
            .await
            .unwrap();
        let second = repo
            .save_resume("carol", Some("Two"), TemplateId::Modern, &sample_data("C"))
            .await;
        assert!(matches!(second, Err(StoreError::LimitReached(1))));
        assert_eq!(repo.count_for_user("carol").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resume_limit_holds_under_concurrent_saves() {
        let (_dir, db) = test_db().await;
        UserRepository::new(db.pool())
            .get_or_create("dave", "dave@example.com")
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                let title = format!("Draft {}", i);
                let repo = ResumeRepository::new(db.pool(), 3);
                let result = repo
                    .save_resume("dave", Some(&title), TemplateId::Modern, &sample_data("D"))
                    .await;
                result
            }));
        }

        let mut saved = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => saved += 1,
                Err(StoreError::LimitReached(3)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(saved, 3);
        let repo = ResumeRepository::new(db.pool(), 3);
        assert_eq!(repo.count_for_user("dave").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_session_revocation() {
        let (_dir, db) = test_db().await;
        let sessions = SessionRepository::new(db.pool());

        assert!(!sessions.is_revoked("s1").await.unwrap());
        sessions
            .revoke("s1", "u1", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        sessions
            .revoke("s1", "u1", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert!(sessions.is_revoked("s1").await.unwrap());

        sessions
            .revoke("old", "u1", Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(sessions.purge_expired().await.unwrap(), 1);
        assert!(sessions.is_revoked("s1").await.unwrap());
    }
}
