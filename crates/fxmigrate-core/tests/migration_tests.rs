//! End-to-end migrations over fixture projects.
//!
//! Atomicity is checked by hashing the whole project tree before and after a
//! failed attempt.

use async_trait::async_trait;
use fxmigrate_core::steps::{
    BackupStep, DeployConfigStep, EditorStep, EnvironmentStep, ManifestStep, SettingsStep,
};
use fxmigrate_core::{
    Document, EncryptError, EnvLookup, MigrationContext, MigrationError, MigrationOutcome,
    MigrationPipeline, MigrationStep, ProjectMigrator, ProjectVersion, SecretEncryptor, Services,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;

const SETTINGS: &str = r#"{
  "projectId": "proj-1",
  "version": "2.0.0",
  "appName": "hello",
  "programmingLanguage": "javascript",
  "components": [
    {"name": "teams-tab", "folder": "tabs", "sso": true},
    {"name": "teams-bot", "folder": "bot"}
  ]
}"#;

const PROVISION: &str = r#"
output frontendHostingOutput object = {
  teamsFxPluginId: 'fx-resource-frontend-hosting'
  endpoint: tab.outputs.endpoint
}

output botOutput object = {
  teamsFxPluginId: 'fx-resource-bot'
  skuName: bot.outputs.skuName
}
"#;

const MANIFEST: &str = r#"{
  "id": "{{state.fx-resource-appstudio.teamsAppId}}",
  "name": {"short": "{{config.manifest.appName.short}}"},
  "validDomains": ["{{state.fx-resource-frontend-hosting.domain}}"]
}
"#;

const LAUNCH: &str = r#"{
  // launch
  "configurations": [
    {"name": "Teams", "url": "https://teams.microsoft.com/l/app/${localTeamsAppId}?installAppPackage=true"}
  ]
}
"#;

const TASKS: &str = r#"{
  // See https://go.microsoft.com/fwlink/?LinkId=733558
  "version": "2.0.0",
  "tasks": [
    {
      "label": "Pre Debug Check & Start All",
      "dependsOn": ["validate local prerequisites", "prepare local environment", "Start All"],
      "dependsOrder": "sequence"
    },
    {
      // Check prerequisites
      "label": "validate local prerequisites",
      "type": "teamsfx",
      "command": "debug-check-prerequisites",
      "args": {"prerequisites": ["nodejs", "m365Account", "devCert", "ngrok", "portOccupancy"]}
    },
    {
      "label": "prepare local environment",
      "dependsOn": ["Set up tab", "Set up bot", "Set up SSO", "Build & upload Teams manifest"],
      "dependsOrder": "sequence"
    },
    {"label": "Set up tab", "type": "teamsfx", "command": "debug-set-up-tab"},
    {
      "label": "Set up bot",
      "type": "teamsfx",
      "command": "debug-set-up-bot",
      "args": {"botPassword": "${env:BOT_PASSWORD}"}
    },
    {
      "label": "Set up SSO",
      "type": "teamsfx",
      "command": "debug-set-up-sso",
      "args": {"clientId": "client-1", "clientSecret": "s3cret", "objectId": "obj-1"}
    },
    {"label": "Build & upload Teams manifest", "type": "teamsfx", "command": "debug-prepare-manifest"},
    {"label": "Start All", "dependsOn": ["Start Frontend", "Start Bot"]},
    {"label": "Start Frontend", "type": "teamsfx", "command": "frontend start"}, // tab
    {"label": "Start Bot", "type": "teamsfx", "command": "bot start"},
    /* user task */
    {"label": "lint", "type": "shell", "command": "npm run lint"}
  ]
}
"#;

struct PrefixEncryptor;

impl SecretEncryptor for PrefixEncryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String, EncryptError> {
        Ok(format!("crypto_{}", plaintext))
    }
}

struct FixedEnv(Vec<(&'static str, &'static str)>);

impl EnvLookup for FixedEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.0
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.to_string())
    }
}

fn test_services(env: Vec<(&'static str, &'static str)>) -> Services {
    Services {
        encryptor: Arc::new(PrefixEncryptor),
        env: Arc::new(FixedEnv(env)),
    }
}

fn write(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap()
}

/// A legacy tab + bot project with SSO and local debug configuration.
fn create_legacy_project() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();

    write(root, ".fx/configs/projectSettings.json", SETTINGS.as_bytes());
    write(
        root,
        ".fx/configs/config.dev.json",
        br#"{"$schema": "x", "manifest": {"appName": {"short": "hello"}}}"#,
    );
    write(
        root,
        ".fx/states/state.dev.json",
        br#"{"fx-resource-appstudio": {"teamsAppId": "app-dev"}, "fx-resource-bot": {"skuName": "B1", "botPassword": "{{fx-resource-bot.botPassword}}"}}"#,
    );
    write(root, ".fx/states/dev.userdata", b"fx-resource-bot.botPassword=crypto_dev\n");
    write(
        root,
        ".fx/states/state.local.json",
        br#"{"fx-resource-frontend-hosting": {"endpoint": "https://localhost:53000", "domain": "localhost"}, "fx-resource-bot": {"botId": "bot-local"}}"#,
    );
    write(root, "templates/azure/provision.bicep", PROVISION.as_bytes());
    write(root, "templates/appPackage/manifest.template.json", MANIFEST.as_bytes());
    write(root, "templates/appPackage/resources/color.png", &[0x89, 0x50, 0x4e, 0x47]);
    write(root, ".vscode/launch.json", LAUNCH.as_bytes());
    write(root, ".vscode/tasks.json", TASKS.as_bytes());
    write(root, "tabs/package.json", br#"{"name": "tabs"}"#);

    temp_dir
}

/// Relative path and content hash of every entry under `root`.
fn tree_hash(root: &Path) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| entry.unwrap())
        .map(|entry| {
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            let digest = if entry.file_type().is_dir() {
                "dir".to_string()
            } else {
                hex::encode(Sha256::digest(std::fs::read(entry.path()).unwrap()))
            };
            (rel, digest)
        })
        .collect();
    entries.sort();
    entries
}

fn migrator(root: &Path, services: Services) -> ProjectMigrator {
    ProjectMigrator::builder(root)
        .skip_confirmation(true)
        .services(services)
        .build()
}

#[tokio::test]
async fn test_full_migration() {
    let temp_dir = create_legacy_project();
    let root = temp_dir.path();
    let services = test_services(vec![("BOT_PASSWORD", "from-env")]);

    let outcome = migrator(root, services).migrate().await.unwrap();
    let report = match outcome {
        MigrationOutcome::Migrated(report) => report,
        other => panic!("unexpected outcome {:?}", other),
    };

    // Settings
    let settings: serde_json::Value = serde_json::from_str(&read(root, "teamsfx/settings.json")).unwrap();
    assert_eq!(settings, json!({"version": "3.0.0", "trackingId": "proj-1"}));
    assert_eq!(report.telemetry["tracking-id"], "proj-1");

    // Deployment descriptors
    let app_yml: serde_yaml::Value = serde_yaml::from_str(&read(root, "teamsfx/app.yml")).unwrap();
    assert_eq!(app_yml["version"], serde_yaml::Value::from("1.0.0"));
    assert_eq!(app_yml["deploy"]["tab"]["folder"], serde_yaml::Value::from("tabs"));
    let local_yml = read(root, "teamsfx/app.local.yml");
    assert!(local_yml.contains("devCert"));
    assert!(local_yml.contains("${{BOT_ENDPOINT}}/api/messages"));

    // Manifest
    let manifest = read(root, "appPackage/manifest.template.json");
    assert!(manifest.contains("\"id\": \"${{TEAMS_APP_ID}}\""));
    assert!(manifest.contains("${{CONFIG__MANIFEST__APPNAME__SHORT}}"));
    assert!(manifest.contains("${{TAB_DOMAIN}}"));
    assert!(root.join("appPackage/resources/color.png").is_file());

    // Environments
    assert_eq!(
        read(root, "teamsfx/.env.dev"),
        "TEAMS_APP_ID=app-dev\nPROVISIONOUTPUT__BOTOUTPUT__SKUNAME=B1\nCONFIG__MANIFEST__APPNAME__SHORT=hello\nSECRET_BOT_PASSWORD=crypto_dev\n"
    );
    let local_env = read(root, "teamsfx/.env.local");
    assert!(local_env.contains("BOT_ID=bot-local\n"));
    assert!(local_env.contains("TAB_DOMAIN=localhost:53000\n"));
    assert!(local_env.contains("SECRET_BOT_PASSWORD=crypto_from-env\n"));
    assert!(local_env.contains("SECRET_AAD_APP_CLIENT_SECRET=crypto_s3cret\n"));
    assert!(local_env.contains("AAD_APP_CLIENT_ID=client-1\n"));

    // Editor configuration
    let launch = read(root, ".vscode/launch.json");
    assert!(launch.contains("${local:teamsAppId}"));
    assert!(launch.starts_with("{\n  // launch\n"));

    let tasks_text = read(root, ".vscode/tasks.json");
    assert!(tasks_text.contains("// See https://go.microsoft.com/fwlink/?LinkId=733558"));
    assert!(tasks_text.contains("// Check prerequisites"));
    assert!(tasks_text.contains("/* user task */"));
    let doc = Document::parse(&tasks_text).unwrap();
    let tasks = doc.to_value(doc.root())["tasks"].as_array().cloned().unwrap();
    let labels: Vec<&str> = tasks.iter().filter_map(|t| t["label"].as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "Pre Debug Check & Start All",
            "validate local prerequisites",
            "prepare local environment",
            "Create resources",
            "Set up local projects",
            "Start All",
            "Start Frontend",
            "Start Bot",
            "lint",
        ]
    );
    assert_eq!(tasks[1]["args"]["prerequisites"], json!(["nodejs", "m365Account", "portOccupancy"]));
    assert_eq!(tasks[2]["dependsOn"], json!(["Create resources", "Set up local projects"]));
    assert_eq!(tasks[6]["type"], "shell");
    assert_eq!(
        tasks[6]["command"],
        "node ${workspaceFolder}/teamsfx/script/run.tab.js ${workspaceFolder}/tabs"
    );
    assert!(root.join("teamsfx/script/run.tab.js").is_file());
    assert!(root.join("teamsfx/script/run.bot.js").is_file());
    assert!(report.telemetry["debug-rules"].contains("set-up-sso"));

    // Legacy folder removed, snapshot kept
    assert!(!root.join(".fx").exists());
    assert!(root.join(".backup/.fx/configs/projectSettings.json").is_file());
    assert_eq!(report.backup_location, root.join(".backup"));
}

#[tokio::test]
async fn test_config_without_state_gets_no_env_file() {
    let temp_dir = create_legacy_project();
    let root = temp_dir.path();
    write(
        root,
        ".fx/configs/config.staging.json",
        br#"{"manifest": {"appName": {"short": "hello-staging"}}}"#,
    );

    let outcome = migrator(root, test_services(vec![])).migrate().await.unwrap();
    let report = match outcome {
        MigrationOutcome::Migrated(report) => report,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert!(root.join("teamsfx/.env.dev").is_file());
    assert!(!root.join("teamsfx/.env.staging").exists());
    assert!(!report.telemetry["environments"].contains("staging"));
}

#[tokio::test]
async fn test_keep_legacy_folder() {
    let temp_dir = create_legacy_project();
    let root = temp_dir.path();
    let migrator = ProjectMigrator::builder(root)
        .skip_confirmation(true)
        .keep_legacy_folder(true)
        .services(test_services(vec![]))
        .build();
    assert!(matches!(migrator.migrate().await.unwrap(), MigrationOutcome::Migrated(_)));
    assert!(root.join(".fx/configs/projectSettings.json").is_file());
}

#[tokio::test]
async fn test_current_project_is_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "teamsfx/settings.json", br#"{"version": "3.0.0", "trackingId": "x"}"#);
    write(root, ".vscode/tasks.json", TASKS.as_bytes());
    let before = tree_hash(root);

    let outcome = migrator(root, test_services(vec![])).migrate().await.unwrap();
    match outcome {
        MigrationOutcome::NotApplicable(check) => assert_eq!(check.state, ProjectVersion::Compatible),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(tree_hash(root), before);
}

#[tokio::test]
async fn test_migrated_project_second_run_is_noop() {
    let temp_dir = create_legacy_project();
    let root = temp_dir.path();
    migrator(root, test_services(vec![])).migrate().await.unwrap();
    let before = tree_hash(root);

    let outcome = migrator(root, test_services(vec![])).migrate().await.unwrap();
    assert!(matches!(outcome, MigrationOutcome::NotApplicable(_)));
    assert_eq!(tree_hash(root), before);
}

struct FailingStep;

#[async_trait]
impl MigrationStep for FailingStep {
    fn name(&self) -> &'static str {
        "injected-failure"
    }

    async fn run(&self, _ctx: &mut MigrationContext) -> fxmigrate_core::Result<()> {
        Err(std::io::Error::other("injected").into())
    }
}

fn standard_steps() -> Vec<Box<dyn MigrationStep>> {
    vec![
        Box::new(BackupStep),
        Box::new(SettingsStep),
        Box::new(DeployConfigStep),
        Box::new(ManifestStep),
        Box::new(EnvironmentStep),
        Box::new(EditorStep),
    ]
}

#[tokio::test]
async fn test_failure_after_any_step_restores_tree() {
    for completed in 0..=standard_steps().len() {
        let temp_dir = create_legacy_project();
        let root = temp_dir.path();
        let before = tree_hash(root);

        let mut steps = standard_steps();
        steps.truncate(completed);
        steps.push(Box::new(FailingStep));
        let migrator = ProjectMigrator::builder(root)
            .skip_confirmation(true)
            .services(test_services(vec![("BOT_PASSWORD", "p")]))
            .pipeline(MigrationPipeline::new(steps))
            .build();

        let err = migrator.migrate().await.unwrap_err();
        assert!(
            matches!(err, MigrationError::Internal { ref step, .. } if step == "injected-failure"),
            "after {} steps: {:?}",
            completed,
            err
        );
        assert_eq!(tree_hash(root), before, "tree changed after {} steps", completed);
    }
}

#[tokio::test]
async fn test_encryption_failure_rolls_back() {
    let temp_dir = create_legacy_project();
    let root = temp_dir.path();
    let before = tree_hash(root);

    // The default services refuse to encrypt.
    let err = migrator(root, Services::default()).migrate().await.unwrap_err();
    assert!(matches!(err, MigrationError::Encryption { .. }));
    assert_eq!(err.to_exit_code(), 1);
    assert_eq!(tree_hash(root), before);
}

#[tokio::test]
async fn test_unset_env_secret_is_omitted() {
    let temp_dir = create_legacy_project();
    let root = temp_dir.path();

    migrator(root, test_services(vec![])).migrate().await.unwrap();
    let local_env = read(root, "teamsfx/.env.local");
    assert!(!local_env.contains("SECRET_BOT_PASSWORD="));
    assert!(local_env.contains("SECRET_AAD_APP_CLIENT_SECRET=crypto_s3cret\n"));
}

#[tokio::test]
async fn test_missing_manifest_is_malformed() {
    let temp_dir = create_legacy_project();
    let root = temp_dir.path();
    std::fs::remove_file(root.join("templates/appPackage/manifest.template.json")).unwrap();
    let before = tree_hash(root);

    let err = migrator(root, test_services(vec![])).migrate().await.unwrap_err();
    assert!(matches!(err, MigrationError::MalformedProject { .. }));
    assert_eq!(err.to_exit_code(), 2);
    assert_eq!(tree_hash(root), before);
}

#[tokio::test]
async fn test_failed_migration_keeps_existing_backup_folder() {
    let temp_dir = create_legacy_project();
    let root = temp_dir.path();
    write(root, ".backup/.fx/configs/projectSettings.json", b"older snapshot");
    std::fs::remove_file(root.join("templates/appPackage/manifest.template.json")).unwrap();
    let before = tree_hash(root);

    let err = migrator(root, test_services(vec![])).migrate().await.unwrap_err();
    assert!(matches!(err, MigrationError::MalformedProject { .. }));
    assert_eq!(read(root, ".backup/.fx/configs/projectSettings.json"), "older snapshot");
    assert_eq!(tree_hash(root), before);
}

#[tokio::test]
async fn test_existing_backup_folder_gets_fresh_snapshot_area() {
    let temp_dir = create_legacy_project();
    let root = temp_dir.path();
    write(root, ".backup/.fx/configs/projectSettings.json", b"older snapshot");

    let outcome = migrator(root, test_services(vec![])).migrate().await.unwrap();
    let report = match outcome {
        MigrationOutcome::Migrated(report) => report,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(report.backup_location, root.join(".backup/migration-1"));
    assert_eq!(read(root, ".backup/.fx/configs/projectSettings.json"), "older snapshot");
    assert!(root.join(".backup/migration-1/.fx/configs/projectSettings.json").is_file());
}
