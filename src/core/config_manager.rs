// src/core/config_manager.rs
//! Configuration loading: optional `config.yaml` with per-environment sections,
//! overridden by environment variables

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment: EnvironmentConfig,
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub ai: AiSettings,
}

#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub name: String,
    pub database_path: PathBuf,
    pub output_path: PathBuf,
    pub log_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub address: String,
    pub port: u16,
    pub max_resumes_per_user: u32,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub audience: String,
    pub issuer: Option<String>,
    pub token_ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct AiSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// One environment section of `config.yaml`; everything is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct SectionConfig {
    database_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    log_path: Option<PathBuf>,
    address: Option<String>,
    port: Option<u16>,
    max_resumes_per_user: Option<u32>,
    jwt_audience: Option<String>,
    jwt_issuer: Option<String>,
    token_ttl_hours: Option<i64>,
    ai_base_url: Option<String>,
    ai_model: Option<String>,
    ai_timeout_seconds: Option<u64>,
    ai_temperature: Option<f32>,
    ai_max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    local: SectionConfig,
    production: SectionConfig,
}

impl ConfigManager {
    /// Load from `./config.yaml` (if present) and the process environment
    pub fn load() -> Result<Self> {
        let environment = std::env::var("RESUME_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "local".to_string());

        let yaml = if Path::new(CONFIG_FILE).exists() {
            Some(std::fs::read_to_string(CONFIG_FILE).context("Failed to read config.yaml")?)
        } else {
            None
        };

        let base_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::from_sources(yaml.as_deref(), &environment, &base_dir, |key| {
            std::env::var(key).ok()
        })
    }

    /// Build the configuration from explicit inputs; `lookup` stands in for the environment
    pub fn from_sources<F>(
        yaml: Option<&str>,
        environment: &str,
        base_dir: &Path,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: ConfigFile = match yaml {
            Some(content) => serde_yaml::from_str(content).context("Failed to parse config.yaml")?,
            None => ConfigFile::default(),
        };

        let section = match environment {
            "production" => file.production,
            _ => file.local,
        };

        let default_root = if environment == "production" {
            PathBuf::from("/app")
        } else {
            base_dir.to_path_buf()
        };

        let resolve = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            }
        };

        let database_path = lookup("RESUME_DATABASE_PATH")
            .map(PathBuf::from)
            .or(section.database_path)
            .map(resolve)
            .unwrap_or_else(|| default_root.join("data").join("resumes.db"));

        let output_path = section
            .output_path
            .map(resolve)
            .unwrap_or_else(|| default_root.join("out"));

        let log_path = lookup("RESUME_LOG_PATH")
            .map(PathBuf::from)
            .or(section.log_path)
            .unwrap_or_else(|| PathBuf::from("/tmp/resume-builder.log"));

        let port = match lookup("ROCKET_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("ROCKET_PORT must be a valid port number"))?,
            None => section.port.unwrap_or(8000),
        };

        let jwt_secret = lookup("RESUME_JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("RESUME_JWT_SECRET environment variable not set"))?;

        let api_key = lookup("AI_API_KEY").filter(|k| !k.trim().is_empty());

        Ok(Self {
            environment: EnvironmentConfig {
                name: environment.to_string(),
                database_path,
                output_path,
                log_path,
            },
            server: ServerSettings {
                address: section.address.unwrap_or_else(|| "0.0.0.0".to_string()),
                port,
                max_resumes_per_user: section.max_resumes_per_user.unwrap_or(50),
            },
            auth: AuthSettings {
                jwt_secret,
                audience: section
                    .jwt_audience
                    .unwrap_or_else(|| "authenticated".to_string()),
                issuer: lookup("RESUME_JWT_ISSUER").or(section.jwt_issuer),
                token_ttl_hours: section.token_ttl_hours.unwrap_or(24),
            },
            ai: AiSettings {
                base_url: lookup("AI_BASE_URL")
                    .or(section.ai_base_url)
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                model: lookup("AI_MODEL")
                    .or(section.ai_model)
                    .unwrap_or_else(|| "gpt-4o-mini".to_string()),
                api_key,
                timeout_seconds: section.ai_timeout_seconds.unwrap_or(60),
                temperature: section.ai_temperature.unwrap_or(0.7),
                max_tokens: section.ai_max_tokens.unwrap_or(500),
            },
        })
    }

    pub async fn ensure_directories(&self) -> Result<()> {
        use crate::core::FsOps;

        FsOps::ensure_dir_exists(&self.environment.output_path).await?;
        if let Some(db_parent) = self.environment.database_path.parent() {
            FsOps::ensure_dir_exists(db_parent).await?;
        }
        Ok(())
    }
}
