use super::MigrationStep;
use crate::config::{PathsConfig, VersionConfig};
use crate::context::MigrationContext;
use crate::error::{MigrationError, Result};
use crate::legacy::LegacySettings;
use async_trait::async_trait;
use serde_json::json;

/// Write the minimal V3 settings file.
pub struct SettingsStep;

#[async_trait]
impl MigrationStep for SettingsStep {
    fn name(&self) -> &'static str {
        "settings"
    }

    async fn run(&self, ctx: &mut MigrationContext) -> Result<()> {
        let text = ctx.read_text(PathsConfig::LEGACY_SETTINGS).await?;
        let settings = LegacySettings::parse(&text)?;
        let project_id = settings.project_id.ok_or_else(|| {
            MigrationError::malformed("legacy project settings have no projectId")
        })?;

        let generated = json!({
            "version": VersionConfig::TARGET_VERSION,
            "trackingId": project_id,
        });
        let mut text = serde_json::to_string_pretty(&generated)?;
        text.push('\n');
        ctx.write_file(PathsConfig::SETTINGS_FILE, text).await?;
        ctx.add_telemetry("tracking-id", project_id);
        Ok(())
    }
}
