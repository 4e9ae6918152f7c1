//! Placeholder and key-name rewriting.
//!
//! Legacy projects address provisioned values with dotted keys such as
//! `state.fx-resource-bot.botId`. The target layout uses flat environment
//! variable names. Names come from the fixed [`PLACEHOLDER_MAPPING`] table
//! first, then from the plugin outputs declared by the infrastructure
//! template, then from a mechanical `NAMESPACE__PLUGIN__KEY` fallback.

pub mod infra;

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Legacy dotted key to V3 name.
pub const PLACEHOLDER_MAPPING: &[(&str, &str)] = &[
    ("state.solution.subscriptionId", "AZURE_SUBSCRIPTION_ID"),
    ("state.solution.resourceGroupName", "AZURE_RESOURCE_GROUP_NAME"),
    ("state.solution.location", "AZURE_LOCATION"),
    ("state.solution.teamsAppTenantId", "TEAMS_APP_TENANT_ID"),
    ("state.fx-resource-appstudio.teamsAppId", "TEAMS_APP_ID"),
    ("state.fx-resource-appstudio.tenantId", "TEAMS_APP_TENANT_ID"),
    ("state.fx-resource-frontend-hosting.endpoint", "TAB_ENDPOINT"),
    ("state.fx-resource-frontend-hosting.domain", "TAB_DOMAIN"),
    ("state.fx-resource-frontend-hosting.indexPath", "TAB_INDEX_PATH"),
    ("state.fx-resource-bot.botId", "BOT_ID"),
    ("state.fx-resource-bot.botPassword", "SECRET_BOT_PASSWORD"),
    ("state.fx-resource-bot.siteEndpoint", "BOT_ENDPOINT"),
    ("state.fx-resource-bot.domain", "BOT_DOMAIN"),
    ("state.fx-resource-aad-app-for-teams.clientId", "AAD_APP_CLIENT_ID"),
    ("state.fx-resource-aad-app-for-teams.clientSecret", "SECRET_AAD_APP_CLIENT_SECRET"),
    ("state.fx-resource-aad-app-for-teams.objectId", "AAD_APP_OBJECT_ID"),
    ("state.fx-resource-aad-app-for-teams.tenantId", "AAD_APP_TENANT_ID"),
    ("state.fx-resource-aad-app-for-teams.oauthAuthority", "AAD_APP_OAUTH_AUTHORITY"),
    ("state.fx-resource-aad-app-for-teams.oauthHost", "AAD_APP_OAUTH_AUTHORITY_HOST"),
    (
        "state.fx-resource-aad-app-for-teams.oauth2PermissionScopeId",
        "AAD_APP_ACCESS_AS_USER_PERMISSION_ID",
    ),
];

/// `{{state.x.y}}`, `{{{config.x}}}`
static TEMPLATE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\{?\s*(state|config)\.([A-Za-z0-9_.\-]+)\s*\}\}\}?").unwrap()
});

static ENV_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\{env:([A-Za-z_][A-Za-z0-9_]*)\}$").unwrap());

/// A whole value that only refers to another key, e.g. `{{fx-resource-bot.botPassword}}`.
static SECRET_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{[^{}]+\}\}$").unwrap());

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]").unwrap());

const LAUNCH_SUBSTITUTIONS: [(&str, &str); 3] = [
    ("${teamsAppId}", "${dev:teamsAppId}"),
    ("${localTeamsAppId}", "${local:teamsAppId}"),
    ("${localTeamsAppInternalId}", "${local:teamsAppInternalId}"),
];

/// Office host reached through a manifest extension scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeHost {
    Outlook,
}

impl OfficeHost {
    pub fn as_str(self) -> &'static str {
        match self {
            OfficeHost::Outlook => "Outlook",
        }
    }
}

/// Host for a manifest extension requirement scope. Only `mail` is known.
pub fn host_for_scope(scope: &str) -> Option<OfficeHost> {
    match scope {
        "mail" => Some(OfficeHost::Outlook),
        _ => None,
    }
}

/// Replace the team-app id tokens in launch configuration text.
pub fn rewrite_launch_config(text: &str) -> String {
    LAUNCH_SUBSTITUTIONS
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Variable name of a `${env:NAME}` reference.
pub fn env_reference(value: &str) -> Option<&str> {
    ENV_REFERENCE
        .captures(value.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Whether a state value only points at a secret stored elsewhere.
pub fn is_secret_reference(value: &str) -> bool {
    SECRET_REFERENCE.is_match(value.trim())
}

/// Upper-case a key segment and replace anything but letters and digits.
pub fn normalize_segment(segment: &str) -> String {
    NON_ALNUM.replace_all(segment, "_").to_ascii_uppercase()
}

fn mapped(key: &str) -> Option<&'static str> {
    PLACEHOLDER_MAPPING
        .iter()
        .find(|(from, _)| *from == key)
        .map(|(_, to)| *to)
}

/// Resolves legacy keys to V3 names for one project.
#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    /// Plugin id to template output name.
    outputs: BTreeMap<String, String>,
}

impl NameResolver {
    pub fn new(infra_template: &str) -> Self {
        Self {
            outputs: infra::plugin_outputs(infra_template),
        }
    }

    /// Name for `state.<plugin>.<key...>`; `path` excludes the `state.` prefix.
    pub fn state_name(&self, path: &str) -> String {
        if let Some(name) = mapped(&format!("state.{}", path)) {
            return name.to_string();
        }
        let (plugin, rest) = path.split_once('.').unwrap_or((path, ""));
        match self.outputs.get(plugin) {
            Some(output) if !rest.is_empty() => format!(
                "PROVISIONOUTPUT__{}__{}",
                normalize_segment(output),
                join_segments(rest)
            ),
            _ => format!("STATE__{}", join_segments(path)),
        }
    }

    /// Name for `config.<key...>`; `path` excludes the `config.` prefix.
    pub fn config_name(&self, path: &str) -> String {
        mapped(&format!("config.{}", path))
            .map(str::to_string)
            .unwrap_or_else(|| format!("CONFIG__{}", join_segments(path)))
    }

    /// Name for a secret stored as `<plugin>.<key>` in a userdata file.
    pub fn secret_name(&self, path: &str) -> String {
        match mapped(&format!("state.{}", path)) {
            Some(name) if name.starts_with("SECRET_") => name.to_string(),
            Some(name) => format!("SECRET_{}", name),
            None => format!("SECRET_{}", join_segments(path)),
        }
    }

    /// Rewrite `{{state.*}}` and `{{config.*}}` placeholders to `${{NAME}}`.
    pub fn rewrite_template(&self, text: &str) -> String {
        TEMPLATE_PLACEHOLDER
            .replace_all(text, |caps: &Captures| {
                let name = match &caps[1] {
                    "state" => self.state_name(&caps[2]),
                    _ => self.config_name(&caps[2]),
                };
                format!("${{{{{}}}}}", name)
            })
            .into_owned()
    }
}

fn join_segments(path: &str) -> String {
    path.split('.')
        .filter(|s| !s.is_empty())
        .map(normalize_segment)
        .collect::<Vec<_>>()
        .join("__")
}
