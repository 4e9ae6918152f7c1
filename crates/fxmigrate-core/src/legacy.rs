//! Typed view over the legacy project settings document.

use crate::error::{MigrationError, Result};
use serde::Deserialize;

/// `.fx/configs/projectSettings.json`, reduced to what the migration reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySettings {
    pub project_id: Option<String>,
    pub version: Option<String>,
    pub app_name: Option<String>,
    pub programming_language: Option<String>,
    pub solution_settings: Option<SolutionSettings>,
    #[serde(default)]
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionSettings {
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub azure_resources: Vec<String>,
    #[serde(default)]
    pub active_resource_plugins: Vec<String>,
    pub host_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Component {
    pub name: String,
    pub hosting: Option<String>,
    pub folder: Option<String>,
    #[serde(default)]
    pub sso: bool,
}

/// Source language of the project's runtime surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    JavaScript,
    TypeScript,
    CSharp,
}

impl Language {
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("typescript") | Some("ts") => Language::TypeScript,
            Some("csharp") | Some("c#") => Language::CSharp,
            _ => Language::JavaScript,
        }
    }
}

/// Runtime surfaces a project includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub tab: bool,
    pub bot: bool,
    pub function: bool,
    pub sso: bool,
    /// The bot is hosted on Azure Functions instead of an App Service.
    pub function_bot: bool,
    pub language: Language,
}

const TAB_COMPONENT: &str = "teams-tab";
const BOT_COMPONENT: &str = "teams-bot";
const API_COMPONENT: &str = "teams-api";
const AAD_COMPONENT: &str = "aad-app";
const AAD_PLUGIN: &str = "fx-resource-aad-app-for-teams";

impl LegacySettings {
    /// Parse the settings text. Invalid JSON is a malformed project.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            MigrationError::malformed(format!("cannot parse legacy project settings: {}", e))
        })
    }

    fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    fn has_capability(&self, names: &[&str]) -> bool {
        self.solution_settings
            .as_ref()
            .map(|s| s.capabilities.iter().any(|c| names.contains(&c.as_str())))
            .unwrap_or(false)
    }

    pub fn capabilities(&self) -> Capabilities {
        let solution = self.solution_settings.clone().unwrap_or_default();
        let tab = self.component(TAB_COMPONENT).is_some() || self.has_capability(&["Tab"]);
        let bot = self.component(BOT_COMPONENT).is_some()
            || self.has_capability(&["Bot", "MessagingExtension"]);
        let function = self.component(API_COMPONENT).is_some()
            || solution.azure_resources.iter().any(|r| r == "function");
        let sso = self.component(AAD_COMPONENT).is_some()
            || self.components.iter().any(|c| c.sso)
            || self.has_capability(&["TabSSO", "BotSSO"])
            || solution.active_resource_plugins.iter().any(|p| p == AAD_PLUGIN);
        let function_bot = self
            .component(BOT_COMPONENT)
            .and_then(|c| c.hosting.as_deref())
            .map(|h| h == "azure-function")
            .unwrap_or(false);

        Capabilities {
            tab,
            bot,
            function,
            sso,
            function_bot,
            language: Language::parse(self.programming_language.as_deref()),
        }
    }

    /// Project folder of the tab, relative to the project root.
    pub fn tab_folder(&self) -> String {
        self.folder(TAB_COMPONENT, "tabs")
    }

    pub fn bot_folder(&self) -> String {
        self.folder(BOT_COMPONENT, "bot")
    }

    pub fn api_folder(&self) -> String {
        self.folder(API_COMPONENT, "api")
    }

    fn folder(&self, component: &str, default: &str) -> String {
        self.component(component)
            .and_then(|c| c.folder.clone())
            .unwrap_or_else(|| default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_from_components() {
        let settings = LegacySettings::parse(
            r#"{
                "projectId": "00000000-0000-0000-0000-000000000001",
                "version": "2.0.0",
                "programmingLanguage": "typescript",
                "components": [
                    {"name": "teams-tab", "hosting": "azure-storage", "folder": "tabs", "sso": true},
                    {"name": "teams-bot", "hosting": "azure-function", "folder": "bot"},
                    {"name": "aad-app"}
                ]
            }"#,
        )
        .unwrap();
        let caps = settings.capabilities();
        assert!(caps.tab && caps.bot && caps.sso && caps.function_bot);
        assert!(!caps.function);
        assert_eq!(caps.language, Language::TypeScript);
        assert_eq!(settings.api_folder(), "api");
    }

    #[test]
    fn test_capabilities_from_solution_settings() {
        let settings = LegacySettings::parse(
            r#"{
                "projectId": "p",
                "solutionSettings": {
                    "capabilities": ["Tab", "TabSSO"],
                    "azureResources": ["function"]
                }
            }"#,
        )
        .unwrap();
        let caps = settings.capabilities();
        assert!(caps.tab && caps.sso && caps.function);
        assert!(!caps.bot);
        assert_eq!(caps.language, Language::JavaScript);
    }

    #[test]
    fn test_invalid_settings_is_malformed() {
        let err = LegacySettings::parse("{ not json").unwrap_err();
        assert!(matches!(err, MigrationError::MalformedProject { .. }));
    }
}
