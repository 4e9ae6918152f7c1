//! Shared state threaded through every migration step.

use crate::document::Document;
use crate::error::{IoResultExt, MigrationError, Result};
use crate::ledger::{self, BackupLedger, RollbackReport};
use crate::services::Services;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// State of one migration attempt.
///
/// All writes go through the helpers here so that the ledger knows about
/// them before the file system changes.
#[derive(Debug)]
pub struct MigrationContext {
    ledger: BackupLedger,
    telemetry: BTreeMap<String, String>,
    services: Services,
}

impl MigrationContext {
    pub fn new(project_path: impl AsRef<Path>, services: Services) -> Self {
        Self {
            ledger: BackupLedger::new(project_path),
            telemetry: BTreeMap::new(),
            services,
        }
    }

    pub fn project_path(&self) -> &Path {
        self.ledger.project_root()
    }

    pub fn ledger(&self) -> &BackupLedger {
        &self.ledger
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn add_telemetry(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.telemetry.insert(key.into(), value.into());
    }

    pub fn telemetry(&self) -> &BTreeMap<String, String> {
        &self.telemetry
    }

    /// Absolute path of a project-relative path.
    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.project_path().join(rel)
    }

    pub async fn exists(&self, rel: impl AsRef<Path>) -> bool {
        tokio::fs::try_exists(self.path(rel)).await.unwrap_or(false)
    }

    pub async fn read_text(&self, rel: impl AsRef<Path>) -> Result<String> {
        let path = self.path(rel);
        tokio::fs::read_to_string(&path).await.with_path(&path)
    }

    /// Read a JSON-with-comments file into a [`Document`].
    pub async fn read_document(&self, rel: impl AsRef<Path>) -> Result<Document> {
        let path = self.path(rel);
        let text = tokio::fs::read_to_string(&path).await.with_path(&path)?;
        Document::parse(&text).map_err(|source| MigrationError::Document { path, source })
    }

    /// Snapshot a path before it is mutated. Returns whether it existed.
    pub async fn backup(&mut self, rel: impl AsRef<Path>) -> Result<bool> {
        self.ledger.backup(rel).await
    }

    /// Create a directory and its parents, recording the top-most one created.
    pub async fn ensure_dir(&mut self, rel: impl AsRef<Path>) -> Result<()> {
        let rel = rel.as_ref();
        let mut top = None;
        for ancestor in rel.ancestors() {
            if ancestor.as_os_str().is_empty() || self.exists(ancestor).await {
                break;
            }
            top = Some(ancestor.to_path_buf());
        }
        if let Some(top) = top {
            self.ledger.record_modified(&top);
            let path = self.path(rel);
            tokio::fs::create_dir_all(&path).await.with_path(&path)?;
            debug!("Created directory {}", rel.display());
        }
        Ok(())
    }

    /// Write a file, snapshotting any pre-existing version first.
    pub async fn write_file(&mut self, rel: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
        let rel = rel.as_ref();
        self.prepare_target(rel).await?;
        let path = self.path(rel);
        tokio::fs::write(&path, contents).await.with_path(&path)?;
        debug!("Wrote {}", rel.display());
        Ok(())
    }

    /// Create an empty file if it does not exist yet.
    pub async fn create_file(&mut self, rel: impl AsRef<Path>) -> Result<()> {
        let rel = rel.as_ref();
        if self.exists(rel).await {
            return Ok(());
        }
        self.write_file(rel, b"").await
    }

    /// Copy a file or directory tree inside the project.
    pub async fn copy(&mut self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        let (from, to) = (from.as_ref(), to.as_ref());
        self.prepare_target(to).await?;
        ledger::copy_path(self.path(from), self.path(to)).await?;
        debug!("Copied {} to {}", from.display(), to.display());
        Ok(())
    }

    async fn prepare_target(&mut self, rel: &Path) -> Result<()> {
        if let Some(parent) = rel.parent() {
            self.ensure_dir(parent).await?;
        }
        if !self.ledger.is_recorded(rel) && self.exists(rel).await {
            self.ledger.backup(rel).await?;
        }
        self.ledger.record_modified(rel);
        Ok(())
    }

    /// Remove the V3 settings folder if this attempt created it.
    pub async fn clean_teamsfx(&self) -> RollbackReport {
        self.ledger.clean_settings_dir().await
    }

    /// Undo everything this attempt did, in order: delete created paths,
    /// restore snapshots, drop the settings folder, remove the snapshots.
    pub async fn rollback(&self) -> RollbackReport {
        let mut report = self.ledger.clean_modified_paths().await;
        report.merge(self.ledger.restore_backup().await);
        report.merge(self.clean_teamsfx().await);
        if report.is_clean() {
            report.merge(self.ledger.remove_backup_area().await);
        }
        report
    }

    pub(crate) fn into_parts(self) -> (BackupLedger, BTreeMap<String, String>) {
        (self.ledger, self.telemetry)
    }
}
