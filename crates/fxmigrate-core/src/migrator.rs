//! Entry point: version gate, confirmation, pipeline, rollback.

use crate::config::{PathsConfig, VersionConfig};
use crate::context::MigrationContext;
use crate::error::{MigrationError, Result};
use crate::ledger::remove_path_blocking;
use crate::pipeline::MigrationPipeline;
use crate::services::{AutoConfirm, Services, UpgradeRequest, UserConfirmation};
use crate::version::{check_project, VersionCheck};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// What a migration attempt ended with.
#[derive(Debug)]
pub enum MigrationOutcome {
    /// The project is not a legacy project this engine upgrades. Nothing
    /// was touched.
    NotApplicable(VersionCheck),
    /// The user declined. Nothing was touched.
    Cancelled { dont_show_again: bool },
    Migrated(MigrationReport),
}

/// Summary of a successful migration.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Project-relative paths the migration created or overwrote.
    pub created_paths: Vec<PathBuf>,
    /// Where the snapshots of the legacy files were kept.
    pub backup_location: PathBuf,
    /// Telemetry properties collected by the steps.
    pub telemetry: BTreeMap<String, String>,
}

/// Upgrades one project from the legacy layout.
///
/// # Example
///
/// ```rust,ignore
/// use fxmigrate_core::ProjectMigrator;
///
/// let outcome = ProjectMigrator::builder("./my-app")
///     .skip_confirmation(true)
///     .build()
///     .migrate()
///     .await?;
/// ```
pub struct ProjectMigrator {
    project_path: PathBuf,
    confirmation: Arc<dyn UserConfirmation>,
    services: Services,
    skip_confirmation: bool,
    keep_legacy_folder: bool,
    pipeline: MigrationPipeline,
}

impl ProjectMigrator {
    pub fn builder(project_path: impl Into<PathBuf>) -> ProjectMigratorBuilder {
        ProjectMigratorBuilder::new(project_path)
    }

    pub fn project_path(&self) -> &PathBuf {
        &self.project_path
    }

    /// Inspect the project without changing anything.
    pub async fn check(&self) -> VersionCheck {
        check_project(&self.project_path).await
    }

    /// Run the whole migration.
    ///
    /// Any step failure rolls the project back to its state before the call.
    /// If the rollback itself leaves paths behind the error is
    /// [`MigrationError::RollbackFailed`].
    pub async fn migrate(&self) -> Result<MigrationOutcome> {
        let check = self.check().await;
        if !check.is_eligible() {
            info!(
                "Project {} is {:?}, nothing to migrate",
                self.project_path.display(),
                check.state
            );
            return Ok(MigrationOutcome::NotApplicable(check));
        }

        if !self.skip_confirmation {
            let request = UpgradeRequest {
                project_path: self.project_path.clone(),
                current_version: check.version.clone().unwrap_or_default(),
                target_version: VersionConfig::TARGET_VERSION.to_string(),
            };
            let response = self.confirmation.confirm(&request).await;
            if !response.accepted {
                info!("Migration declined");
                return Ok(MigrationOutcome::Cancelled {
                    dont_show_again: response.dont_show_again,
                });
            }
        }

        let mut ctx = MigrationContext::new(&self.project_path, self.services.clone());
        if let Err(cause) = self.pipeline.run(&mut ctx).await {
            warn!("Migration failed, rolling back: {}", cause);
            let report = ctx.rollback().await;
            if !report.is_clean() {
                return Err(MigrationError::RollbackFailed {
                    cause: Box::new(cause),
                    failed_paths: report.failed_paths(),
                });
            }
            return Err(cause);
        }

        let (ledger, telemetry) = ctx.into_parts();
        if !self.keep_legacy_folder {
            let legacy = self.project_path.join(PathsConfig::LEGACY_DIR);
            if let Err(e) = remove_path_blocking(legacy).await {
                warn!("Could not remove {}: {}", PathsConfig::LEGACY_DIR, e);
            }
        }

        info!("Migrated {}", self.project_path.display());
        Ok(MigrationOutcome::Migrated(MigrationReport {
            created_paths: ledger.modified_paths().iter().cloned().collect(),
            backup_location: ledger.backup_root().to_path_buf(),
            telemetry,
        }))
    }
}

/// Builder for [`ProjectMigrator`].
pub struct ProjectMigratorBuilder {
    project_path: PathBuf,
    confirmation: Arc<dyn UserConfirmation>,
    services: Services,
    skip_confirmation: bool,
    keep_legacy_folder: bool,
    pipeline: Option<MigrationPipeline>,
}

impl ProjectMigratorBuilder {
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            confirmation: Arc::new(AutoConfirm),
            services: Services::default(),
            skip_confirmation: false,
            keep_legacy_folder: false,
            pipeline: None,
        }
    }

    /// Who is asked before anything is written.
    ///
    /// Default: [`AutoConfirm`]
    pub fn confirmation(mut self, confirmation: Arc<dyn UserConfirmation>) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    /// Do not ask for confirmation at all.
    ///
    /// Default: `false`
    pub fn skip_confirmation(mut self, skip: bool) -> Self {
        self.skip_confirmation = skip;
        self
    }

    /// Leave `.fx` in place after a successful migration.
    ///
    /// Default: `false` (the folder is removed; its snapshot stays in `.backup`)
    pub fn keep_legacy_folder(mut self, keep: bool) -> Self {
        self.keep_legacy_folder = keep;
        self
    }

    /// Replace the standard step list.
    pub fn pipeline(mut self, pipeline: MigrationPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn build(self) -> ProjectMigrator {
        ProjectMigrator {
            project_path: self.project_path,
            confirmation: self.confirmation,
            services: self.services,
            skip_confirmation: self.skip_confirmation,
            keep_legacy_folder: self.keep_legacy_folder,
            pipeline: self.pipeline.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ConfirmationResponse;
    use crate::version::ProjectVersion;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct Decline;

    #[async_trait]
    impl UserConfirmation for Decline {
        async fn confirm(&self, request: &UpgradeRequest) -> ConfirmationResponse {
            assert_eq!(request.current_version, "2.0.0");
            ConfirmationResponse {
                accepted: false,
                dont_show_again: true,
            }
        }
    }

    fn legacy_project() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join(".fx/configs")).unwrap();
        std::fs::write(
            temp_dir.path().join(PathsConfig::LEGACY_SETTINGS),
            r#"{"projectId": "p1", "version": "2.0.0"}"#,
        )
        .unwrap();
        temp_dir
    }

    #[tokio::test]
    async fn test_unrelated_project_is_not_applicable() {
        let temp_dir = TempDir::new().unwrap();
        let outcome = ProjectMigrator::builder(temp_dir.path())
            .build()
            .migrate()
            .await
            .unwrap();
        match outcome {
            MigrationOutcome::NotApplicable(check) => {
                assert_eq!(check.state, ProjectVersion::Unrelated)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_declined_touches_nothing() {
        let temp_dir = legacy_project();
        let outcome = ProjectMigrator::builder(temp_dir.path())
            .confirmation(Arc::new(Decline))
            .build()
            .migrate()
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            MigrationOutcome::Cancelled {
                dont_show_again: true
            }
        ));
        assert!(!temp_dir.path().join(".backup").exists());
        assert!(!temp_dir.path().join("teamsfx").exists());
    }

    #[tokio::test]
    async fn test_failure_rolls_back() {
        // No infrastructure template, so the deployment descriptor step fails.
        let temp_dir = legacy_project();
        let err = ProjectMigrator::builder(temp_dir.path())
            .skip_confirmation(true)
            .build()
            .migrate()
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::MalformedProject { .. }));
        assert!(temp_dir.path().join(PathsConfig::LEGACY_SETTINGS).exists());
        assert!(!temp_dir.path().join("teamsfx").exists());
        assert!(!temp_dir.path().join(".backup").exists());
    }
}
