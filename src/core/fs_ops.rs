// src/core/fs_ops.rs
//! File system helpers with error context, used for the database directory
//! and the PDF build workspaces

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

pub struct FsOps;

impl FsOps {
    pub async fn ensure_dir_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)
                .await
                .with_context(|| format!("Failed to create directory: {}", path.display()))?;
            debug!("Created directory: {}", path.display());
        }
        Ok(())
    }

    pub async fn write_file_safe(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            Self::ensure_dir_exists(parent).await?;
        }

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        debug!("Written file: {}", path.display());
        Ok(())
    }

    pub async fn read_bytes(path: &Path) -> Result<Vec<u8>> {
        fs::read(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))
    }

    pub async fn remove_dir_all(path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_dir_all(path)
                .await
                .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
            debug!("Removed directory: {}", path.display());
        }
        Ok(())
    }

    /// Fresh, uniquely named directory under `base` for a single build
    pub async fn create_workspace(base: &Path, prefix: &str) -> Result<PathBuf> {
        let dir = base.join(format!("{}_{}", prefix, Uuid::new_v4().simple()));
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create workspace: {}", dir.display()))?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workspace_roundtrip() {
        let base = tempfile::tempdir().unwrap();
        let ws = FsOps::create_workspace(base.path(), "pdf").await.unwrap();
        assert!(ws.starts_with(base.path()));

        let file = ws.join("nested").join("main.typ");
        FsOps::write_file_safe(&file, "= Hello").await.unwrap();
        assert_eq!(FsOps::read_bytes(&file).await.unwrap(), b"= Hello");

        FsOps::remove_dir_all(&ws).await.unwrap();
        assert!(!ws.exists());
        FsOps::remove_dir_all(&ws).await.unwrap();
    }
}
