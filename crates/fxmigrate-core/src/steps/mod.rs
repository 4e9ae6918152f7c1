//! The ordered transformation steps of the core pipeline.

mod backup;
mod deploy_config;
mod editor;
mod environment;
mod manifest;
mod settings;

pub use backup::BackupStep;
pub use deploy_config::DeployConfigStep;
pub use editor::EditorStep;
pub use environment::EnvironmentStep;
pub use manifest::ManifestStep;
pub use settings::SettingsStep;

use crate::context::MigrationContext;
use crate::error::Result;
use async_trait::async_trait;

/// One transformation over the project tree.
///
/// Steps only write through the [`MigrationContext`] helpers so that a
/// failure anywhere can be rolled back.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    /// Short name used in logs, telemetry and internal errors.
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut MigrationContext) -> Result<()>;
}
