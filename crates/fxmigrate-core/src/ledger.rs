//! Backup/rollback bookkeeping for a single migration attempt.
//!
//! Every path about to be mutated is either snapshotted into the private
//! backup area (when it already exists) or recorded as modified (when the
//! migration creates it). Rollback deletes the created paths, then copies the
//! snapshots back over the live tree.
//!
//! The backup area is always a folder this attempt creates: `.backup` itself,
//! or a fresh `.backup/migration-<n>` when `.backup` is already present.
//!
//! All paths are relative to the project root.

use crate::config::PathsConfig;
use crate::error::{IoResultExt, MigrationError, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Paths that could not be restored or removed during rollback.
#[derive(Debug, Default, Clone)]
pub struct RollbackReport {
    pub failures: Vec<(PathBuf, String)>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_paths(&self) -> Vec<PathBuf> {
        self.failures.iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn merge(&mut self, other: RollbackReport) {
        self.failures.extend(other.failures);
    }

    fn record(&mut self, path: &Path, err: impl std::fmt::Display) {
        warn!("Rollback failed for {}: {}", path.display(), err);
        self.failures.push((path.to_path_buf(), err.to_string()));
    }
}

/// Snapshot and modification ledger.
#[derive(Debug)]
pub struct BackupLedger {
    project_root: PathBuf,
    backup_root: PathBuf,
    settings_dir_preexisted: bool,
    backup_paths: BTreeSet<PathBuf>,
    modified_paths: BTreeSet<PathBuf>,
}

impl BackupLedger {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        let project_root = project_root.as_ref().to_path_buf();
        let backup_root = fresh_backup_root(&project_root);
        Self {
            settings_dir_preexisted: project_root.join(PathsConfig::SETTINGS_DIR).exists(),
            project_root,
            backup_root,
            backup_paths: BTreeSet::new(),
            modified_paths: BTreeSet::new(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    pub fn backup_paths(&self) -> &BTreeSet<PathBuf> {
        &self.backup_paths
    }

    pub fn modified_paths(&self) -> &BTreeSet<PathBuf> {
        &self.modified_paths
    }

    /// Whether `rel` or one of its ancestors has been snapshotted.
    pub fn is_backed_up(&self, rel: &Path) -> bool {
        self.backup_paths.iter().any(|b| rel.starts_with(b))
    }

    /// Whether `rel` or one of its ancestors was created by this attempt.
    pub fn is_recorded(&self, rel: &Path) -> bool {
        self.modified_paths.iter().any(|m| rel.starts_with(m))
    }

    /// Snapshot `rel` (file or directory tree) into the backup area.
    ///
    /// Returns whether the source existed. A path under an already recorded
    /// snapshot is not copied again.
    pub async fn backup(&mut self, rel: impl AsRef<Path>) -> Result<bool> {
        let rel = rel.as_ref();
        let source = self.project_root.join(rel);
        if !source.exists() {
            return Ok(false);
        }
        if self.is_backed_up(rel) {
            return Ok(true);
        }

        let dest = self.backup_root.join(rel);
        if let Err(e) = copy_path(source, dest.clone()).await {
            if let Err(cleanup) = remove_path_blocking(dest).await {
                warn!("Could not remove partial snapshot of {}: {}", rel.display(), cleanup);
            }
            return Err(e);
        }
        debug!("Backed up {}", rel.display());
        self.backup_paths.insert(rel.to_path_buf());
        Ok(true)
    }

    /// Record a path the migration is about to create or overwrite.
    pub fn record_modified(&mut self, rel: impl AsRef<Path>) {
        self.modified_paths.insert(rel.as_ref().to_path_buf());
    }

    /// Delete every recorded path that has no snapshot.
    pub async fn clean_modified_paths(&self) -> RollbackReport {
        let mut report = RollbackReport::default();
        for rel in self.modified_paths.iter().rev() {
            if self.is_backed_up(rel) {
                continue;
            }
            let live = self.project_root.join(rel);
            if let Err(e) = remove_path_blocking(live).await {
                report.record(rel, e);
            } else {
                debug!("Removed {}", rel.display());
            }
        }
        report
    }

    /// Copy every snapshot back over its live path.
    pub async fn restore_backup(&self) -> RollbackReport {
        let mut report = RollbackReport::default();
        for rel in &self.backup_paths {
            let snapshot = self.backup_root.join(rel);
            let live = self.project_root.join(rel);
            let result = async {
                remove_path_blocking(live.clone()).await?;
                copy_path(snapshot, live).await
            }
            .await;
            match result {
                Ok(()) => debug!("Restored {}", rel.display()),
                Err(e) => report.record(rel, e),
            }
        }
        report
    }

    /// Remove the V3 settings folder if this attempt created it.
    pub async fn clean_settings_dir(&self) -> RollbackReport {
        let mut report = RollbackReport::default();
        if self.settings_dir_preexisted {
            return report;
        }
        let dir = self.project_root.join(PathsConfig::SETTINGS_DIR);
        if let Err(e) = remove_path_blocking(dir).await {
            report.record(Path::new(PathsConfig::SETTINGS_DIR), e);
        }
        report
    }

    /// Drop the backup area of this attempt, partial snapshots included.
    pub async fn remove_backup_area(&self) -> RollbackReport {
        let mut report = RollbackReport::default();
        if let Err(e) = remove_path_blocking(self.backup_root.clone()).await {
            report.record(&self.backup_root, e);
        }
        report
    }
}

/// `.backup`, or the first unused `.backup/migration-<n>` when it exists.
fn fresh_backup_root(project_root: &Path) -> PathBuf {
    let base = project_root.join(PathsConfig::BACKUP_DIR);
    if !base.exists() {
        return base;
    }
    (1u32..)
        .map(|n| base.join(format!("migration-{}", n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base)
}

/// Copy a file or directory tree, creating parent directories.
pub async fn copy_path(source: PathBuf, dest: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || copy_path_sync(&source, &dest))
        .await
        .map_err(|e| MigrationError::from(io::Error::other(format!("copy task failed: {}", e))))?
}

/// Remove a file or directory tree. A missing path is not an error.
pub async fn remove_path_blocking(path: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || remove_path_sync(&path))
        .await
        .map_err(|e| MigrationError::from(io::Error::other(format!("remove task failed: {}", e))))?
}

fn copy_path_sync(source: &Path, dest: &Path) -> Result<()> {
    if source.is_file() {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }
        fs::copy(source, dest).with_path(source)?;
        return Ok(());
    }

    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| MigrationError::io_with_path(io::Error::from(e), source))?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| MigrationError::io_with_path(io::Error::other(e), entry.path()))?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).with_path(&target)?;
        } else {
            fs::copy(entry.path(), &target).with_path(entry.path())?;
        }
    }
    Ok(())
}

fn remove_path_sync(path: &Path) -> Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(MigrationError::io_with_path(e, path)),
        _ => Ok(()),
    }
}
