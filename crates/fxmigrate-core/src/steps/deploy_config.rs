use super::MigrationStep;
use crate::app_yml::{AppYmlConfig, Section};
use crate::config::PathsConfig;
use crate::context::MigrationContext;
use crate::error::{MigrationError, Result};
use crate::legacy::{Language, LegacySettings};
use crate::placeholder::{infra, normalize_segment};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

/// Derive the deployment descriptor from the capability flags and the
/// infrastructure template.
pub struct DeployConfigStep;

#[async_trait]
impl MigrationStep for DeployConfigStep {
    fn name(&self) -> &'static str {
        "deploy-config"
    }

    async fn run(&self, ctx: &mut MigrationContext) -> Result<()> {
        if !ctx.exists(PathsConfig::INFRA_TEMPLATE).await {
            return Err(MigrationError::malformed(format!(
                "missing {}",
                PathsConfig::INFRA_TEMPLATE
            )));
        }
        let template = ctx.read_text(PathsConfig::INFRA_TEMPLATE).await?;
        let settings = LegacySettings::parse(&ctx.read_text(PathsConfig::LEGACY_SETTINGS).await?)?;

        let config = generate(&settings, &template);
        debug!(
            "Generated deployment descriptor with {} provision output(s)",
            config
                .lookup(Section::Provision, "arm.outputs")
                .and_then(|v| v.as_array())
                .map(Vec::len)
                .unwrap_or(0)
        );
        ctx.write_file(PathsConfig::APP_YML, config.to_yaml()?).await?;
        Ok(())
    }
}

/// Build the descriptor for a legacy project.
pub fn generate(settings: &LegacySettings, infra_template: &str) -> AppYmlConfig {
    let caps = settings.capabilities();
    let mut config = AppYmlConfig::new();

    config.merge(Section::RegisterApp, json!({"teamsApp": {"create": true}}));
    config.merge(
        Section::ConfigureApp,
        json!({"teamsApp": {"manifestPath": format!("./{}", PathsConfig::MANIFEST)}}),
    );
    if caps.sso {
        let aad = json!({"aad": {"manifestPath": format!("./{}", PathsConfig::AAD_MANIFEST)}});
        config.merge(Section::RegisterApp, json!({"aad": {"create": true}}));
        config.merge(Section::ConfigureApp, aad);
    }

    let outputs: Vec<String> = infra::plugin_outputs(infra_template)
        .values()
        .map(|output| format!("PROVISIONOUTPUT__{}", normalize_segment(output)))
        .collect();
    config.merge(
        Section::Provision,
        json!({
            "arm": {
                "template": "./templates/azure/main.bicep",
                "parameters": "./templates/azure/azure.parameters.${{TEAMSFX_ENV}}.json",
                "outputs": outputs,
            }
        }),
    );
    if caps.bot {
        config.merge(
            Section::Provision,
            json!({"bot": {"messagingEndpoint": "${{BOT_ENDPOINT}}/api/messages"}}),
        );
    }

    let build = match caps.language {
        Language::CSharp => "dotnet publish --configuration Release",
        _ => "npm run build",
    };
    if caps.tab {
        config.merge(
            Section::Deploy,
            json!({"tab": {"folder": settings.tab_folder(), "build": build, "target": "azureStorage"}}),
        );
    }
    if caps.bot {
        let target = if caps.function_bot { "azureFunctions" } else { "azureAppService" };
        config.merge(
            Section::Deploy,
            json!({"bot": {"folder": settings.bot_folder(), "build": build, "target": target}}),
        );
    }
    if caps.function {
        config.merge(
            Section::Deploy,
            json!({"api": {"folder": settings.api_folder(), "build": build, "target": "azureFunctions"}}),
        );
    }
    config
}
