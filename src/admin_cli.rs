// src/admin_cli.rs
use crate::auth::AuthConfig;
use crate::core::database::{Database, ResumeRepository, SessionRepository, UserRepository};
use crate::core::ConfigManager;
use crate::utils::normalize_email;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "resume-admin")]
#[command(about = "Administer users, resumes and sessions of the resume builder")]
pub struct AdminCli {
    #[command(subcommand)]
    pub command: AdminCommand,

    /// Defaults to the configured database path
    #[arg(long)]
    pub database_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Create the database and run migrations
    Init,
    /// List known users
    Users,
    /// List the resumes of one user
    Resumes { email: String },
    /// Issue a development token for a user
    Token {
        email: String,
        /// Defaults to the configured token lifetime
        #[arg(long)]
        hours: Option<i64>,
    },
    /// Pre-provision users from a CSV file (email,display_name[,id])
    Import { csv_file: PathBuf },
    /// Remove revocations of sessions whose tokens have expired
    PurgeSessions,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Upsert every valid row; rows without an email are skipped
pub async fn import_users_csv(users: &UserRepository<'_>, content: &str) -> Result<ImportSummary> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut summary = ImportSummary::default();

    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("CSV parsing error on row {}: {}", line + 1, e);
                summary.skipped += 1;
                continue;
            }
        };

        let email = normalize_email(record.get(0).unwrap_or(""));
        if email.is_empty() || !email.contains('@') {
            warn!("Skipping row {}: missing or invalid email", line + 1);
            summary.skipped += 1;
            continue;
        }

        let display_name = record.get(1).filter(|s| !s.is_empty());
        let id = match record.get(2).filter(|s| !s.is_empty()) {
            Some(id) => id.to_string(),
            None => format!("pending:{}", Uuid::new_v4()),
        };

        match users.upsert_by_email(&id, &email, display_name).await {
            Ok(user) => {
                info!("Imported {} ({})", user.email, user.id);
                summary.imported += 1;
            }
            Err(e) => {
                error!("Failed to import {}: {}", email, e);
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}

pub async fn handle_admin_command(cli: AdminCli) -> Result<()> {
    let config = match cli.command {
        AdminCommand::Token { .. } => Some(ConfigManager::load()?),
        _ => None,
    };

    let database_path = match (&cli.database_path, &config) {
        (Some(path), _) => path.clone(),
        (None, Some(config)) => config.environment.database_path.clone(),
        (None, None) => std::env::var("RESUME_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/resumes.db")),
    };

    let database = Database::new(&database_path).await?;
    let pool = database.pool();
    let users = UserRepository::new(pool);

    match cli.command {
        AdminCommand::Init => {
            println!("Database initialized at: {}", database_path.display());
            println!("Tables: users, resumes, revoked_sessions");
        }

        AdminCommand::Users => {
            let all = users.list().await?;
            if all.is_empty() {
                println!("No users found.");
            } else {
                println!(
                    "{:<40} {:<32} {:<20} {:<17}",
                    "ID", "Email", "Name", "Last seen"
                );
                println!("{}", "-".repeat(112));
                for user in all {
                    println!(
                        "{:<40} {:<32} {:<20} {:<17}",
                        user.id,
                        user.email,
                        user.display_name.as_deref().unwrap_or("-"),
                        user.last_seen_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }

        AdminCommand::Resumes { email } => {
            let email = normalize_email(&email);
            let user = users
                .find_by_email(&email)
                .await?
                .with_context(|| format!("No user with email {}", email))?;

            let resumes = ResumeRepository::new(pool, u32::MAX)
                .get_resumes(&user.id)
                .await?;

            println!("{} resumes for {}", resumes.len(), email);
            for resume in resumes {
                println!(
                    "{}  {:<30} template={} complete={}%  updated {}",
                    resume.id,
                    resume.title,
                    resume.template_id.name(),
                    resume.completeness,
                    resume.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }

        AdminCommand::Token { email, hours } => {
            let config = config.context("Configuration is required to sign tokens")?;
            let email = normalize_email(&email);
            let user = users
                .find_by_email(&email)
                .await?
                .with_context(|| format!("No user with email {}", email))?;

            let auth = AuthConfig::from_settings(&config.auth);
            let ttl = hours
                .map(chrono::Duration::hours)
                .unwrap_or_else(|| auth.default_ttl());
            let token = auth
                .issue_token(&user.id, &user.email, ttl)
                .context("Failed to sign token")?;

            info!("Issued {}h token for {}", ttl.num_hours(), email);
            println!("{}", token);
        }

        AdminCommand::Import { csv_file } => {
            let content = tokio::fs::read_to_string(&csv_file)
                .await
                .with_context(|| format!("Failed to read CSV file: {}", csv_file.display()))?;

            let summary = import_users_csv(&users, &content).await?;
            println!("Import completed:");
            println!("  Imported: {}", summary.imported);
            println!("  Skipped:  {}", summary.skipped);
        }

        AdminCommand::PurgeSessions => {
            let removed = SessionRepository::new(pool).purge_expired().await?;
            println!("Removed {} expired session revocations", removed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_token_command() {
        let cli = AdminCli::try_parse_from(["resume-admin", "token", "a@example.com", "--hours", "2"])
            .unwrap();
        assert!(matches!(
            cli.command,
            AdminCommand::Token { ref email, hours: Some(2) } if email == "a@example.com"
        ));

        let cli = AdminCli::try_parse_from(["resume-admin", "token", "a@example.com"]).unwrap();
        assert!(matches!(cli.command, AdminCommand::Token { hours: None, .. }));

        let cli = AdminCli::try_parse_from([
            "resume-admin",
            "--database-path",
            "/tmp/x.db",
            "purge-sessions",
        ])
        .unwrap();
        assert_eq!(cli.database_path, Some(PathBuf::from("/tmp/x.db")));
    }

    #[tokio::test]
    async fn test_import_users_csv() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("admin.db")).await.unwrap();
        let users = UserRepository::new(db.pool());

        let csv = "email,display_name,id\n\
                   Alice@Example.com, Alice ,\n\
                   not-an-email,Nobody,\n\
                   bob@example.com,,user-bob\n";
        let summary = import_users_csv(&users, csv).await.unwrap();
        assert_eq!(summary, ImportSummary { imported: 2, skipped: 1 });

        let alice = users.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert!(alice.id.starts_with("pending:"));
        assert_eq!(alice.display_name.as_deref(), Some("Alice"));

        // First sign-in takes over the pre-provisioned row
        let signed_in = users.get_or_create("sub-123", "alice@example.com").await.unwrap();
        assert_eq!(signed_in.id, "sub-123");
        assert_eq!(signed_in.display_name.as_deref(), Some("Alice"));
        assert_eq!(users.list().await.unwrap().len(), 2);
    }
}
