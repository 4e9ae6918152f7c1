use super::MigrationStep;
use crate::config::PathsConfig;
use crate::context::MigrationContext;
use crate::error::{MigrationError, Result};
use async_trait::async_trait;

/// Snapshot the whole legacy configuration folder.
pub struct BackupStep;

#[async_trait]
impl MigrationStep for BackupStep {
    fn name(&self) -> &'static str {
        "backup"
    }

    async fn run(&self, ctx: &mut MigrationContext) -> Result<()> {
        if !ctx.backup(PathsConfig::LEGACY_DIR).await? {
            return Err(MigrationError::malformed(format!(
                "missing {}",
                PathsConfig::LEGACY_DIR
            )));
        }
        Ok(())
    }
}
