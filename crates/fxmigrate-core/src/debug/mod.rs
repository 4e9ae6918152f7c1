//! Rewrite of the editor debug tasks.
//!
//! The legacy `.vscode/tasks.json` drives local debugging through
//! `teamsfx` task commands that no longer exist. [`migrate`] runs the rule
//! table in [`rules`] over the task list, collecting the local deployment
//! descriptor, local environment values and companion scripts on the way.

pub mod generated;
pub mod rules;
pub mod scripts;
pub mod tasks;

use crate::app_yml::{AppYmlConfig, Section};
use crate::config::{DebugConfig, PathsConfig};
use crate::context::MigrationContext;
use crate::document::{Document, DocumentError, NodeId, NodeType};
use crate::env_file::EnvFile;
use crate::error::{MigrationError, Result};
use crate::legacy::{Capabilities, LegacySettings};
use crate::placeholder::env_reference;
use crate::services::Services;
use rules::{RuleOutcome, RULES};
use scripts::Surface;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

pub(crate) fn edit_error(e: DocumentError) -> MigrationError {
    MigrationError::Internal {
        step: "editor".to_string(),
        message: format!("task list edit failed: {}", e),
    }
}

/// State shared by the rules while the task list is rewritten.
pub struct DebugMigrationContext<'a> {
    services: &'a Services,
    settings: &'a LegacySettings,
    caps: Capabilities,
    pub(crate) doc: Document,
    tasks: NodeId,
    app_yml: AppYmlConfig,
    generated_labels: BTreeMap<String, String>,
    env: EnvFile,
    scripts: BTreeMap<String, String>,
    settled: BTreeSet<NodeId>,
}

/// Everything the rewrite produced.
#[derive(Debug)]
pub struct DebugMigrationOutput {
    pub tasks_json: String,
    pub app_yml: AppYmlConfig,
    pub env: EnvFile,
    /// Script file name to contents.
    pub scripts: BTreeMap<String, String>,
    /// Names of the rules that recognized at least one task, in table order.
    pub applied: Vec<&'static str>,
}

impl<'a> DebugMigrationContext<'a> {
    /// Returns `None` when the document has no `tasks` array.
    pub fn new(doc: Document, settings: &'a LegacySettings, services: &'a Services) -> Option<Self> {
        let tasks = doc
            .get(doc.root(), "tasks")
            .filter(|id| doc.node_type(*id) == NodeType::Array)?;
        Some(Self {
            services,
            settings,
            caps: settings.capabilities(),
            doc,
            tasks,
            app_yml: AppYmlConfig::new(),
            generated_labels: BTreeMap::new(),
            env: EnvFile::new(),
            scripts: BTreeMap::new(),
            settled: BTreeSet::new(),
        })
    }

    pub fn settings(&self) -> &LegacySettings {
        self.settings
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn merge(&mut self, section: Section, fragment: Value) {
        self.app_yml.merge(section, fragment);
    }

    /// Label for a synthetic task, and whether the task still has to be
    /// created. The first request for a base label picks a free name;
    /// later requests reuse it.
    pub fn generate_label(&mut self, base: &str, replacing: NodeId) -> (String, bool) {
        if let Some(label) = self.generated_labels.get(base) {
            return (label.clone(), false);
        }
        let label = tasks::LabelIndex::build(&self.doc, self.tasks, Some(replacing)).unique(base);
        self.generated_labels.insert(base.to_string(), label.clone());
        (label, true)
    }

    /// Literal value, or the variable a `${env:NAME}` reference points at.
    pub fn resolve(&self, raw: Option<&str>) -> Option<String> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
        match env_reference(raw) {
            Some(name) => self.services.env.var(name).filter(|v| !v.is_empty()),
            None => Some(raw.to_string()),
        }
    }

    pub fn set_env_value(&mut self, key: &str, raw: Option<String>) {
        match self.resolve(raw.as_deref()) {
            Some(value) => self.env.set(key, value),
            None => debug!("No value for {}, skipping", key),
        }
    }

    /// Encrypt and store a secret. Unresolved values are left out.
    pub fn set_secret(&mut self, key: &str, raw: Option<&str>) -> Result<()> {
        let value = match self.resolve(raw) {
            Some(value) => value,
            None => {
                debug!("No value for secret {}, skipping", key);
                return Ok(());
            }
        };
        let encrypted = self
            .services
            .encryptor
            .encrypt(&value)
            .map_err(|e| MigrationError::Encryption {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        self.env.set(key, encrypted);
        Ok(())
    }

    pub fn emit_script(&mut self, surface: Surface) {
        let caps = self.caps;
        self.scripts
            .entry(surface.file_name().to_string())
            .or_insert_with(|| surface.render(&caps));
    }

    /// Run every rule over the task list.
    pub fn run(mut self) -> Result<DebugMigrationOutput> {
        let mut applied = Vec::new();
        for rule in RULES {
            let mut hits = 0;
            let mut index = 0;
            while index < self.doc.len(self.tasks) {
                let task = self.doc.items(self.tasks)[index];
                if self.settled.contains(&task) || !rule.matcher.matches(&self.doc, task) {
                    index += 1;
                    continue;
                }
                debug!("Rule {} matched task {}", rule.name, index);
                hits += 1;
                match (rule.apply)(&mut self, task)? {
                    RuleOutcome::Rewritten => {
                        self.settled.insert(task);
                        index += 1;
                    }
                    RuleOutcome::Replaced { tasks, labels } => {
                        let old_label = self.doc.get_str(task, "label").map(str::to_string);
                        let inserted = self
                            .doc
                            .splice(self.tasks, index, 1, &tasks)
                            .map_err(edit_error)?;
                        index += inserted.len();
                        self.settled.extend(inserted);
                        if let Some(old) = old_label {
                            tasks::relabel(&mut self.doc, self.tasks, &old, &labels)
                                .map_err(edit_error)?;
                        }
                    }
                }
            }
            if hits > 0 {
                applied.push(rule.name);
            }
        }

        Ok(DebugMigrationOutput {
            tasks_json: self.doc.to_string(),
            app_yml: self.app_yml,
            env: self.env,
            scripts: self.scripts,
            applied,
        })
    }
}

/// Rewrite `.vscode/tasks.json` and write the local descriptor, env file
/// and companion scripts it needs.
pub async fn migrate(ctx: &mut MigrationContext) -> Result<()> {
    let doc = ctx.read_document(PathsConfig::TASKS_JSON).await?;
    let settings = LegacySettings::parse(&ctx.read_text(PathsConfig::LEGACY_SETTINGS).await?)?;
    let services = ctx.services().clone();

    let migration = match DebugMigrationContext::new(doc, &settings, &services) {
        Some(migration) => migration,
        None => {
            warn!("{} has no task list, skipping", PathsConfig::TASKS_JSON);
            return Ok(());
        }
    };
    let output = migration.run()?;

    ctx.write_file(PathsConfig::TASKS_JSON, output.tasks_json).await?;
    if !output.app_yml.is_empty() {
        ctx.write_file(PathsConfig::APP_LOCAL_YML, output.app_yml.to_yaml()?)
            .await?;
    }

    if !output.env.is_empty() {
        let env_path = format!("{}/.env.{}", PathsConfig::SETTINGS_DIR, DebugConfig::LOCAL_ENV);
        let mut env = if ctx.exists(&env_path).await {
            EnvFile::parse(&ctx.read_text(&env_path).await?)
        } else {
            EnvFile::new()
        };
        env.extend(&output.env);
        ctx.write_file(&env_path, env.render()).await?;
    }

    for (name, body) in &output.scripts {
        ctx.write_file(format!("{}/{}", PathsConfig::SCRIPT_DIR, name), body)
            .await?;
    }

    if !output.applied.is_empty() {
        ctx.add_telemetry("debug-rules", output.applied.join(","));
    }
    info!(
        "Rewrote debug tasks ({} rules, {} scripts)",
        output.applied.len(),
        output.scripts.len()
    );
    Ok(())
}
