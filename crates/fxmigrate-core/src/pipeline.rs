//! Ordered execution of the migration steps.

use crate::context::MigrationContext;
use crate::error::Result;
use crate::steps::{
    BackupStep, DeployConfigStep, EditorStep, EnvironmentStep, ManifestStep, MigrationStep,
    SettingsStep,
};
use tracing::{error, info};

/// The steps of one migration, run in order until the first failure.
pub struct MigrationPipeline {
    steps: Vec<Box<dyn MigrationStep>>,
}

impl MigrationPipeline {
    pub fn new(steps: Vec<Box<dyn MigrationStep>>) -> Self {
        Self { steps }
    }

    /// Backup, settings, deployment descriptor, manifest, environments,
    /// editor configuration.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(BackupStep),
            Box::new(SettingsStep),
            Box::new(DeployConfigStep),
            Box::new(ManifestStep),
            Box::new(EnvironmentStep),
            Box::new(EditorStep),
        ])
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step. The first error stops the run and comes back
    /// classified with the failing step's name. Rollback is the caller's job.
    pub async fn run(&self, ctx: &mut MigrationContext) -> Result<()> {
        for step in &self.steps {
            info!("Running migration step {}", step.name());
            if let Err(e) = step.run(ctx).await {
                error!("Migration step {} failed: {}", step.name(), e);
                return Err(e.classify(step.name()));
            }
        }
        Ok(())
    }
}

impl Default for MigrationPipeline {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationError;
    use crate::services::Services;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct Failing;

    #[async_trait]
    impl MigrationStep for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run(&self, _ctx: &mut MigrationContext) -> Result<()> {
            Err(std::io::Error::other("boom").into())
        }
    }

    struct Touch;

    #[async_trait]
    impl MigrationStep for Touch {
        fn name(&self) -> &'static str {
            "touch"
        }

        async fn run(&self, ctx: &mut MigrationContext) -> Result<()> {
            ctx.write_file("teamsfx/marker", "x").await
        }
    }

    #[test]
    fn test_standard_order() {
        assert_eq!(
            MigrationPipeline::standard().step_names(),
            vec!["backup", "settings", "deploy-config", "manifest", "environment", "editor"]
        );
    }

    #[tokio::test]
    async fn test_first_failure_stops_and_is_classified() {
        let temp_dir = TempDir::new().unwrap();
        let mut ctx = MigrationContext::new(temp_dir.path(), Services::default());
        let pipeline = MigrationPipeline::new(vec![Box::new(Failing), Box::new(Touch)]);

        let err = pipeline.run(&mut ctx).await.unwrap_err();
        assert!(matches!(err, MigrationError::Internal { ref step, .. } if step == "failing"));
        assert!(!temp_dir.path().join("teamsfx/marker").exists());
    }
}
