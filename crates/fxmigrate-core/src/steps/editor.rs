use super::MigrationStep;
use crate::config::PathsConfig;
use crate::context::MigrationContext;
use crate::error::Result;
use crate::placeholder::rewrite_launch_config;
use async_trait::async_trait;
use tracing::debug;

/// Update the editor launch and task configuration.
pub struct EditorStep;

#[async_trait]
impl MigrationStep for EditorStep {
    fn name(&self) -> &'static str {
        "editor"
    }

    async fn run(&self, ctx: &mut MigrationContext) -> Result<()> {
        if ctx.exists(PathsConfig::LAUNCH_JSON).await {
            ctx.backup(PathsConfig::LAUNCH_JSON).await?;
            let launch = rewrite_launch_config(&ctx.read_text(PathsConfig::LAUNCH_JSON).await?);
            ctx.write_file(PathsConfig::LAUNCH_JSON, launch).await?;
        } else {
            debug!("No {}, skipping", PathsConfig::LAUNCH_JSON);
        }

        if ctx.exists(PathsConfig::TASKS_JSON).await {
            ctx.backup(PathsConfig::TASKS_JSON).await?;
            crate::debug::migrate(ctx).await?;
        } else {
            debug!("No {}, skipping", PathsConfig::TASKS_JSON);
        }
        Ok(())
    }
}
