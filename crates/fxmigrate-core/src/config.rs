//! Centralized constants for the migration engine.
//!
//! Version boundaries, the legacy and target layout paths, and the fixed
//! values used when rewriting debug tasks.

/// Schema generations.
pub struct VersionConfig;

impl VersionConfig {
    /// The only legacy version that can be upgraded.
    pub const SOURCE_VERSION: &'static str = "2.0.0";
    pub const TARGET_VERSION: &'static str = "3.0.0";
    /// Version written at the top of generated deployment descriptors.
    pub const APP_YML_VERSION: &'static str = "1.0.0";
}

/// Relative paths inside a project.
pub struct PathsConfig;

impl PathsConfig {
    // Legacy layout
    pub const LEGACY_DIR: &'static str = ".fx";
    pub const LEGACY_SETTINGS: &'static str = ".fx/configs/projectSettings.json";
    pub const LEGACY_CONFIGS_DIR: &'static str = ".fx/configs";
    pub const LEGACY_STATES_DIR: &'static str = ".fx/states";
    pub const INFRA_TEMPLATE: &'static str = "templates/azure/provision.bicep";
    pub const LEGACY_MANIFEST: &'static str = "templates/appPackage/manifest.template.json";
    pub const LEGACY_AAD_MANIFEST: &'static str = "templates/appPackage/aad.template.json";
    pub const LEGACY_RESOURCES_DIR: &'static str = "templates/appPackage/resources";

    // Target layout
    pub const SETTINGS_DIR: &'static str = "teamsfx";
    pub const SETTINGS_FILE: &'static str = "teamsfx/settings.json";
    pub const APP_YML: &'static str = "teamsfx/app.yml";
    pub const APP_LOCAL_YML: &'static str = "teamsfx/app.local.yml";
    pub const SCRIPT_DIR: &'static str = "teamsfx/script";
    pub const APP_PACKAGE_DIR: &'static str = "appPackage";
    pub const MANIFEST: &'static str = "appPackage/manifest.template.json";
    pub const AAD_MANIFEST: &'static str = "aad.manifest.template.json";
    pub const RESOURCES_DIR: &'static str = "appPackage/resources";

    // Editor configuration
    pub const LAUNCH_JSON: &'static str = ".vscode/launch.json";
    pub const TASKS_JSON: &'static str = ".vscode/tasks.json";

    /// Private snapshot area for rollback.
    pub const BACKUP_DIR: &'static str = ".backup";
}

/// Fixed values used by the debug-task rewrite.
pub struct DebugConfig;

impl DebugConfig {
    pub const LOCAL_ENV: &'static str = "local";
    pub const LOCAL_TEMPLATE: &'static str = "${workspaceFolder}/teamsfx/app.local.yml";

    pub const CREATE_RESOURCES_LABEL: &'static str = "Create resources";
    pub const SET_UP_PROJECTS_LABEL: &'static str = "Set up local projects";
    pub const VALIDATE_PREREQUISITES_LABEL: &'static str = "Validate prerequisites";
    pub const START_TUNNEL_LABEL: &'static str = "Start local tunnel";

    pub const TAB_PORT: u16 = 53000;
    pub const BOT_PORT: u16 = 3978;
    pub const BOT_DEBUG_PORT: u16 = 9239;
    pub const FUNC_PORT: u16 = 7071;
    pub const FUNC_DEBUG_PORT: u16 = 9229;
    pub const AUTH_PORT: u16 = 5000;

    pub const FUNC_PATH_MARKER: &'static str = "${command:fx-extension.get-func-path}";
    pub const FUNC_PATH_REPLACEMENT: &'static str = "${workspaceFolder}/devTools/func:";
    pub const WATCH_COMMAND: &'static str = "npm run watch:teamsfx";
    pub const EXTENSIONS_CSPROJ: &'static str = "extensions.csproj";
}
