//! Rule table for the debug-task rewrite.
//!
//! Rules run in table order. Each rule makes one pass over the task list and
//! a task handled by one rule is never offered to another.

use super::generated;
use super::scripts::Surface;
use super::tasks::{arg_str, is_teamsfx_command, replace_string, string_slots};
use super::{edit_error, DebugMigrationContext};
use crate::app_yml::Section;
use crate::config::{DebugConfig, PathsConfig};
use crate::document::{Document, NodeId, NodeType};
use crate::error::Result;
use serde_json::{json, Value};

/// What a rule did with the task it recognized.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// The task was edited where it is.
    Rewritten,
    /// The task was removed. `tasks` are spliced in at its position and
    /// references to it now point at `labels`.
    Replaced { tasks: Vec<Value>, labels: Vec<String> },
}

impl RuleOutcome {
    fn removed() -> Self {
        RuleOutcome::Replaced {
            tasks: Vec::new(),
            labels: Vec::new(),
        }
    }
}

/// How a rule recognizes its task.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// `{"type": "teamsfx", "command": <command>}`
    Teamsfx(&'static str),
    /// A `shell` task with the marker anywhere in its strings.
    ShellContaining(&'static str),
}

impl Matcher {
    pub fn matches(&self, doc: &Document, task: NodeId) -> bool {
        if doc.node_type(task) != NodeType::Object {
            return false;
        }
        match self {
            Matcher::Teamsfx(command) => is_teamsfx_command(doc, task, command),
            Matcher::ShellContaining(marker) => {
                doc.get_str(task, "type") == Some("shell")
                    && string_slots(doc, task)
                        .iter()
                        .any(|(_, value)| value.contains(marker))
            }
        }
    }
}

pub type Apply = fn(&mut DebugMigrationContext<'_>, NodeId) -> Result<RuleOutcome>;

pub struct TaskRule {
    pub name: &'static str,
    pub matcher: Matcher,
    pub apply: Apply,
}

pub const RULES: &[TaskRule] = &[
    // prerequisites
    TaskRule {
        name: "check-prerequisites",
        matcher: Matcher::Teamsfx("debug-check-prerequisites"),
        apply: check_prerequisites,
    },
    // tunnel
    TaskRule {
        name: "local-tunnel",
        matcher: Matcher::Teamsfx("debug-start-local-tunnel"),
        apply: local_tunnel,
    },
    TaskRule {
        name: "ngrok-start",
        matcher: Matcher::Teamsfx("ngrok start"),
        apply: ngrok_start,
    },
    // npm install
    TaskRule {
        name: "npm-install",
        matcher: Matcher::Teamsfx("debug-npm-install"),
        apply: npm_install,
    },
    // setup
    TaskRule {
        name: "set-up-tab",
        matcher: Matcher::Teamsfx("debug-set-up-tab"),
        apply: set_up_tab,
    },
    TaskRule {
        name: "set-up-bot",
        matcher: Matcher::Teamsfx("debug-set-up-bot"),
        apply: set_up_bot,
    },
    TaskRule {
        name: "set-up-sso",
        matcher: Matcher::Teamsfx("debug-set-up-sso"),
        apply: set_up_sso,
    },
    TaskRule {
        name: "prepare-manifest",
        matcher: Matcher::Teamsfx("debug-prepare-manifest"),
        apply: prepare_manifest,
    },
    // start
    TaskRule {
        name: "frontend-start",
        matcher: Matcher::Teamsfx("frontend start"),
        apply: frontend_start,
    },
    TaskRule {
        name: "auth-start",
        matcher: Matcher::Teamsfx("auth start"),
        apply: auth_start,
    },
    TaskRule {
        name: "bot-start",
        matcher: Matcher::Teamsfx("bot start"),
        apply: bot_start,
    },
    TaskRule {
        name: "backend-start",
        matcher: Matcher::Teamsfx("backend start"),
        apply: backend_start,
    },
    TaskRule {
        name: "backend-watch",
        matcher: Matcher::Teamsfx("backend watch"),
        apply: backend_watch,
    },
    TaskRule {
        name: "backend-extensions",
        matcher: Matcher::Teamsfx("backend extensions install"),
        apply: backend_extensions,
    },
    TaskRule {
        name: "func-path",
        matcher: Matcher::ShellContaining(DebugConfig::FUNC_PATH_MARKER),
        apply: func_path,
    },
    // validate
    TaskRule {
        name: "validate-prerequisites",
        matcher: Matcher::Teamsfx("validate local prerequisites"),
        apply: validate_prerequisites,
    },
    TaskRule {
        name: "pre-debug-check",
        matcher: Matcher::Teamsfx("pre-debug check"),
        apply: pre_debug_check,
    },
];

/// Names of every rule that recognizes `task`.
pub fn matching_rules(doc: &Document, task: NodeId) -> Vec<&'static str> {
    RULES
        .iter()
        .filter(|rule| rule.matcher.matches(doc, task))
        .map(|rule| rule.name)
        .collect()
}

fn dev_cert_tool() -> Value {
    json!({"tools": {"devCert": {"trust": true}}})
}

fn func_tool() -> Value {
    json!({"tools": {"func": {"version": "~4", "symlinkDir": "./devTools/func"}}})
}

fn dotnet_tool() -> Value {
    json!({"tools": {"dotnet": true}})
}

fn bot_endpoint(path: &str) -> Value {
    json!({"bot": {"messagingEndpoint": format!("${{{{BOT_ENDPOINT}}}}/{}", path.trim_start_matches('/'))}})
}

/// `${workspaceFolder}/tabs` -> `tabs`
fn workspace_relative(path: &str) -> String {
    let rel = path
        .strip_prefix("${workspaceFolder}")
        .unwrap_or(path)
        .trim_start_matches(['/', '\\']);
    if rel.is_empty() {
        ".".to_string()
    } else {
        rel.to_string()
    }
}

/// The task's `args` object, created when missing.
fn ensure_args(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<NodeId> {
    match ctx.doc.get(task, "args") {
        Some(args) if ctx.doc.node_type(args) == NodeType::Object => Ok(args),
        _ => ctx.doc.set(task, "args", &json!({})).map_err(edit_error),
    }
}

/// Replace a task with the shared "Create resources" and "Set up local
/// projects" helpers, creating them the first time.
fn setup_helpers(ctx: &mut DebugMigrationContext<'_>, replacing: NodeId) -> RuleOutcome {
    let mut tasks = Vec::new();
    let mut labels = Vec::new();

    let (create, fresh) = ctx.generate_label(DebugConfig::CREATE_RESOURCES_LABEL, replacing);
    if fresh {
        tasks.push(generated::create_resources(&create));
    }
    labels.push(create);

    let (set_up, fresh) = ctx.generate_label(DebugConfig::SET_UP_PROJECTS_LABEL, replacing);
    if fresh {
        tasks.push(generated::set_up_local_projects(&set_up));
    }
    labels.push(set_up);

    RuleOutcome::Replaced { tasks, labels }
}

fn check_prerequisites(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    let list = match ctx.doc.get(task, "args").and_then(|args| ctx.doc.get(args, "prerequisites")) {
        Some(list) => list,
        None => return Ok(RuleOutcome::Rewritten),
    };

    let mut dropped = Vec::new();
    for (index, item) in ctx.doc.items(list).into_iter().enumerate() {
        let fragment = match ctx.doc.as_str(item) {
            Some("devCert") => Some(dev_cert_tool()),
            Some("func") => Some(func_tool()),
            Some("dotnet") => Some(dotnet_tool()),
            Some("ngrok") => None,
            _ => continue,
        };
        if let Some(fragment) = fragment {
            ctx.merge(Section::Deploy, fragment);
        }
        dropped.push(index);
    }
    for index in dropped.into_iter().rev() {
        ctx.doc.splice(list, index, 1, &[]).map_err(edit_error)?;
    }
    Ok(RuleOutcome::Rewritten)
}

fn local_tunnel(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    let args = ensure_args(ctx, task)?;
    ctx.doc
        .set(args, "env", &json!(DebugConfig::LOCAL_ENV))
        .map_err(edit_error)?;
    ctx.doc
        .set(args, "output", &generated::tunnel_output())
        .map_err(edit_error)?;
    ctx.merge(Section::Provision, bot_endpoint("api/messages"));
    Ok(RuleOutcome::Rewritten)
}

fn ngrok_start(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    let (label, fresh) = ctx.generate_label(DebugConfig::START_TUNNEL_LABEL, task);
    ctx.merge(Section::Provision, bot_endpoint("api/messages"));
    let tasks = if fresh {
        vec![generated::start_local_tunnel(&label)]
    } else {
        Vec::new()
    };
    Ok(RuleOutcome::Replaced {
        tasks,
        labels: vec![label],
    })
}

fn npm_install(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    let doc = &ctx.doc;
    let projects = doc
        .get(task, "args")
        .and_then(|args| doc.get(args, "projects"))
        .map(|projects| doc.items(projects))
        .unwrap_or_default();

    let mut commands = Vec::new();
    for project in projects {
        let cwd = doc
            .get_str(project, "cwd")
            .map(workspace_relative)
            .unwrap_or_else(|| ".".to_string());
        let extra: Vec<String> = match doc.get(project, "npmInstallArgs").map(|id| doc.to_value(id)) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s],
            _ => Vec::new(),
        };
        let args = std::iter::once("install".to_string())
            .chain(extra)
            .collect::<Vec<_>>()
            .join(" ");
        commands.push(json!({"args": args, "workingDirectory": cwd}));
    }

    if !commands.is_empty() {
        ctx.merge(Section::Deploy, json!({"npmCommands": commands}));
    }
    Ok(RuleOutcome::removed())
}

fn set_up_tab(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    let base_url = arg_str(&ctx.doc, task, "baseUrl")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("https://localhost:{}", DebugConfig::TAB_PORT));
    let domain = url::Url::parse(&base_url)
        .ok()
        .and_then(|u| {
            u.host_str().map(|host| match u.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            })
        })
        .unwrap_or_else(|| "localhost".to_string());

    ctx.set_env_value("TAB_DOMAIN", Some(domain));
    ctx.set_env_value("TAB_ENDPOINT", Some(base_url));
    ctx.merge(Section::Deploy, dev_cert_tool());
    Ok(setup_helpers(ctx, task))
}

fn set_up_bot(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    let bot_id = arg_str(&ctx.doc, task, "botId");
    let password = arg_str(&ctx.doc, task, "botPassword");
    let endpoint = arg_str(&ctx.doc, task, "botMessagingEndpoint")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "api/messages".to_string());

    if ctx.resolve(bot_id.as_deref()).is_some() {
        ctx.set_env_value("BOT_ID", bot_id);
    } else {
        ctx.merge(Section::RegisterApp, json!({"bot": {"create": true}}));
    }
    ctx.set_secret("SECRET_BOT_PASSWORD", password.as_deref())?;
    ctx.merge(Section::Provision, bot_endpoint(&endpoint));
    Ok(setup_helpers(ctx, task))
}

fn set_up_sso(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    for (arg, key) in [
        ("objectId", "AAD_APP_OBJECT_ID"),
        ("clientId", "AAD_APP_CLIENT_ID"),
        ("accessAsUserScopeId", "AAD_APP_ACCESS_AS_USER_PERMISSION_ID"),
    ] {
        let value = arg_str(&ctx.doc, task, arg);
        ctx.set_env_value(key, value);
    }
    let secret = arg_str(&ctx.doc, task, "clientSecret");
    ctx.set_secret("SECRET_AAD_APP_CLIENT_SECRET", secret.as_deref())?;

    ctx.merge(Section::RegisterApp, json!({"aad": {"create": true}}));
    ctx.merge(
        Section::ConfigureApp,
        json!({"aad": {"manifestPath": format!("./{}", PathsConfig::AAD_MANIFEST)}}),
    );
    Ok(setup_helpers(ctx, task))
}

fn prepare_manifest(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    match arg_str(&ctx.doc, task, "appPackagePath").filter(|s| !s.is_empty()) {
        Some(path) => ctx.merge(
            Section::RegisterApp,
            json!({"teamsApp": {"appPackagePath": path}}),
        ),
        None => {
            ctx.merge(Section::RegisterApp, json!({"teamsApp": {"create": true}}));
            ctx.merge(
                Section::ConfigureApp,
                json!({"teamsApp": {"manifestPath": format!("./{}", PathsConfig::MANIFEST)}}),
            );
        }
    }
    Ok(setup_helpers(ctx, task))
}

fn start_task(
    ctx: &mut DebugMigrationContext<'_>,
    task: NodeId,
    surface: Surface,
    folder: Option<String>,
) -> Result<RuleOutcome> {
    ctx.doc.set(task, "type", &json!("shell")).map_err(edit_error)?;
    ctx.doc
        .set(task, "command", &json!(surface.task_command(folder.as_deref())))
        .map_err(edit_error)?;
    ctx.doc.remove(task, "args");
    ctx.emit_script(surface);
    Ok(RuleOutcome::Rewritten)
}

fn frontend_start(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    let folder = ctx.settings().tab_folder();
    start_task(ctx, task, Surface::Tab, Some(folder))
}

fn auth_start(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    start_task(ctx, task, Surface::Auth, None)
}

fn bot_start(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    let folder = ctx.settings().bot_folder();
    start_task(ctx, task, Surface::Bot, Some(folder))
}

fn backend_start(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    let folder = ctx.settings().api_folder();
    start_task(ctx, task, Surface::Api, Some(folder))
}

fn backend_watch(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    let cwd = format!("${{workspaceFolder}}/{}", ctx.settings().api_folder());
    ctx.doc.set(task, "type", &json!("shell")).map_err(edit_error)?;
    ctx.doc
        .set(task, "command", &json!(DebugConfig::WATCH_COMMAND))
        .map_err(edit_error)?;
    ctx.doc.remove(task, "args");
    match ctx.doc.get(task, "options") {
        Some(options) if ctx.doc.node_type(options) == NodeType::Object => {
            ctx.doc.set(options, "cwd", &json!(cwd)).map_err(edit_error)?;
        }
        _ => {
            ctx.doc
                .set(task, "options", &json!({"cwd": cwd}))
                .map_err(edit_error)?;
        }
    }
    Ok(RuleOutcome::Rewritten)
}

fn backend_extensions(ctx: &mut DebugMigrationContext<'_>, _task: NodeId) -> Result<RuleOutcome> {
    let folder = ctx.settings().api_folder();
    ctx.merge(Section::Deploy, dotnet_tool());
    ctx.merge(
        Section::Deploy,
        json!({
            "dotnetCommand": {
                "args": format!("build {} -o ./bin --ignore-failed-sources", DebugConfig::EXTENSIONS_CSPROJ),
                "workingDirectory": folder,
                "execPath": "${{DOTNET_PATH}}",
            }
        }),
    );
    Ok(RuleOutcome::removed())
}

fn func_path(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    for (slot, value) in string_slots(&ctx.doc, task) {
        if value.contains(DebugConfig::FUNC_PATH_MARKER) {
            let replaced = value.replace(DebugConfig::FUNC_PATH_MARKER, DebugConfig::FUNC_PATH_REPLACEMENT);
            replace_string(&mut ctx.doc, &slot, &replaced).map_err(edit_error)?;
        }
    }
    ctx.merge(Section::Deploy, func_tool());
    Ok(RuleOutcome::Rewritten)
}

fn validate_prerequisites(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    let caps = ctx.capabilities();
    if caps.tab {
        ctx.merge(Section::Deploy, dev_cert_tool());
    }
    if caps.function || caps.function_bot {
        ctx.merge(Section::Deploy, func_tool());
    }
    if caps.function {
        ctx.merge(Section::Deploy, dotnet_tool());
    }

    let (label, fresh) = ctx.generate_label(DebugConfig::VALIDATE_PREREQUISITES_LABEL, task);
    let tasks = if fresh {
        vec![generated::validate_prerequisites(&label, &caps)]
    } else {
        Vec::new()
    };
    Ok(RuleOutcome::Replaced {
        tasks,
        labels: vec![label],
    })
}

fn pre_debug_check(ctx: &mut DebugMigrationContext<'_>, task: NodeId) -> Result<RuleOutcome> {
    Ok(setup_helpers(ctx, task))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_are_mutually_exclusive() {
        let doc = Document::parse(
            r#"[
                {"type": "teamsfx", "command": "debug-check-prerequisites"},
                {"type": "teamsfx", "command": "debug-start-local-tunnel"},
                {"type": "teamsfx", "command": "ngrok start"},
                {"type": "teamsfx", "command": "debug-npm-install"},
                {"type": "teamsfx", "command": "debug-set-up-tab"},
                {"type": "teamsfx", "command": "debug-set-up-bot"},
                {"type": "teamsfx", "command": "debug-set-up-sso"},
                {"type": "teamsfx", "command": "debug-prepare-manifest"},
                {"type": "teamsfx", "command": "frontend start"},
                {"type": "teamsfx", "command": "auth start"},
                {"type": "teamsfx", "command": "bot start"},
                {"type": "teamsfx", "command": "backend start"},
                {"type": "teamsfx", "command": "backend watch"},
                {"type": "teamsfx", "command": "backend extensions install"},
                {"type": "shell", "command": "func start", "options": {"env": {"PATH": "${command:fx-extension.get-func-path}${env:PATH}"}}},
                {"type": "teamsfx", "command": "validate local prerequisites"},
                {"type": "teamsfx", "command": "pre-debug check"},
                {"type": "shell", "command": "npm run build"}
            ]"#,
        )
        .unwrap();
        let items = doc.items(doc.root());
        for (index, task) in items.iter().enumerate() {
            let matched = matching_rules(&doc, *task);
            if index < RULES.len() {
                assert_eq!(matched, vec![RULES[index].name]);
            } else {
                assert!(matched.is_empty());
            }
        }
    }

    #[test]
    fn test_workspace_relative() {
        assert_eq!(workspace_relative("${workspaceFolder}/tabs"), "tabs");
        assert_eq!(workspace_relative("${workspaceFolder}"), ".");
        assert_eq!(workspace_relative("bot"), "bot");
    }

    #[test]
    fn test_bot_endpoint() {
        assert_eq!(
            bot_endpoint("/api/messages"),
            json!({"bot": {"messagingEndpoint": "${{BOT_ENDPOINT}}/api/messages"}})
        );
    }
}
