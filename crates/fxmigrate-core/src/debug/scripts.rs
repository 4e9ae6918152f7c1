//! Companion scripts started by the rewritten start tasks.
//!
//! Each script loads `teamsfx/.env.local`, maps the V3 names onto the
//! variables the legacy project code reads, then runs the surface's dev
//! command in the folder passed as its first argument.

use crate::config::DebugConfig;
use crate::legacy::{Capabilities, Language};

/// Runtime surface a script starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Surface {
    Tab,
    Auth,
    Bot,
    Api,
}

impl Surface {
    pub fn file_name(self) -> &'static str {
        match self {
            Surface::Tab => "run.tab.js",
            Surface::Auth => "run.auth.js",
            Surface::Bot => "run.bot.js",
            Surface::Api => "run.api.js",
        }
    }

    /// Shell command of the rewritten start task.
    pub fn task_command(self, folder: Option<&str>) -> String {
        let script = format!("${{workspaceFolder}}/teamsfx/script/{}", self.file_name());
        match folder {
            Some(folder) => format!("node {} ${{workspaceFolder}}/{}", script, folder),
            None => format!("node {}", script),
        }
    }

    pub fn render(self, caps: &Capabilities) -> String {
        let (command, env_lines) = match self {
            Surface::Tab => (dev_command(caps.language), tab_env(caps)),
            Surface::Auth => ("dotnet Microsoft.TeamsFx.SimpleAuth.dll".to_string(), auth_env()),
            Surface::Bot => (dev_command(caps.language), bot_env(caps)),
            Surface::Api => (dev_command(caps.language), api_env()),
        };
        let default_cwd = match self {
            Surface::Auth => r#"path.join(os.homedir(), ".fx", "localauth")"#,
            _ => "process.cwd()",
        };
        let env_block = env_lines.join("\n");

        format!(
            r##"const cp = require("child_process");
const fs = require("fs");
const os = require("os");
const path = require("path");

function loadEnv(file) {{
  const result = {{}};
  if (!fs.existsSync(file)) {{
    return result;
  }}
  for (const line of fs.readFileSync(file, "utf8").split(/\r?\n/)) {{
    const trimmed = line.trim();
    if (!trimmed || trimmed.startsWith("#")) {{
      continue;
    }}
    const index = trimmed.indexOf("=");
    if (index > 0) {{
      result[trimmed.slice(0, index).trim()] = trimmed.slice(index + 1).trim();
    }}
  }}
  return result;
}}

const cwd = process.argv[2] || {default_cwd};
const env = {{ ...process.env, ...loadEnv(path.join(__dirname, "..", ".env.local")) }};
{env_block}

const child = cp.spawn("{command}", {{ cwd, env, stdio: "inherit", shell: true }});
child.on("exit", (code) => process.exit(code ?? 0));
"##
        )
    }
}

fn dev_command(language: Language) -> String {
    match language {
        Language::CSharp => "dotnet run".to_string(),
        _ => "npm run dev:teamsfx".to_string(),
    }
}

fn tab_env(caps: &Capabilities) -> Vec<String> {
    let mut lines = vec![
        "env.BROWSER = \"none\";".to_string(),
        "env.HTTPS = \"true\";".to_string(),
        format!("env.PORT = \"{}\";", DebugConfig::TAB_PORT),
    ];
    if caps.sso {
        lines.push("env.REACT_APP_CLIENT_ID = env.AAD_APP_CLIENT_ID;".to_string());
        lines.push(
            "env.REACT_APP_START_LOGIN_PAGE_URL = `${env.TAB_ENDPOINT}/auth-start.html`;".to_string(),
        );
    }
    if caps.function {
        lines.push(format!(
            "env.REACT_APP_FUNC_ENDPOINT = \"http://localhost:{}\";",
            DebugConfig::FUNC_PORT
        ));
    }
    lines
}

fn auth_env() -> Vec<String> {
    vec![
        "env.CLIENT_ID = env.AAD_APP_CLIENT_ID;".to_string(),
        "env.CLIENT_SECRET = env.SECRET_AAD_APP_CLIENT_SECRET;".to_string(),
        "env.OAUTH_AUTHORITY = env.AAD_APP_OAUTH_AUTHORITY;".to_string(),
        "env.TAB_APP_ENDPOINT = env.TAB_ENDPOINT;".to_string(),
        format!("env.urls = \"http://localhost:{}\";", DebugConfig::AUTH_PORT),
    ]
}

fn bot_env(caps: &Capabilities) -> Vec<String> {
    let mut lines = vec![
        "env.BOT_PASSWORD = env.SECRET_BOT_PASSWORD;".to_string(),
        format!("env.PORT = \"{}\";", DebugConfig::BOT_PORT),
    ];
    if caps.sso {
        lines.push("env.M365_CLIENT_ID = env.AAD_APP_CLIENT_ID;".to_string());
        lines.push("env.M365_CLIENT_SECRET = env.SECRET_AAD_APP_CLIENT_SECRET;".to_string());
        lines.push("env.M365_TENANT_ID = env.AAD_APP_TENANT_ID;".to_string());
        lines.push("env.INITIATE_LOGIN_ENDPOINT = `${env.BOT_ENDPOINT}/auth-start.html`;".to_string());
    }
    if caps.function {
        lines.push(format!(
            "env.API_ENDPOINT = \"http://localhost:{}\";",
            DebugConfig::FUNC_PORT
        ));
    }
    lines
}

fn api_env() -> Vec<String> {
    vec![
        "env.M365_CLIENT_ID = env.AAD_APP_CLIENT_ID;".to_string(),
        "env.M365_CLIENT_SECRET = env.SECRET_AAD_APP_CLIENT_SECRET;".to_string(),
        "env.M365_TENANT_ID = env.AAD_APP_TENANT_ID;".to_string(),
        "env.M365_AUTHORITY_HOST = env.AAD_APP_OAUTH_AUTHORITY_HOST;".to_string(),
        "env.ALLOWED_APP_IDS = \"1fec8e78-bce4-4aaf-ab1b-5451cc387264;5e3ce6c0-2b1f-4285-8d4b-75ee78787346\";"
            .to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_script_uses_capabilities() {
        let caps = Capabilities {
            tab: true,
            sso: true,
            ..Default::default()
        };
        let script = Surface::Tab.render(&caps);
        assert!(script.contains("env.PORT = \"53000\";"));
        assert!(script.contains("REACT_APP_CLIENT_ID"));
        assert!(!script.contains("REACT_APP_FUNC_ENDPOINT"));
        assert!(script.contains("cp.spawn(\"npm run dev:teamsfx\""));
        assert!(script.contains(r##"trimmed.startsWith("#")"##));
        assert!(script.ends_with("process.exit(code ?? 0));\n"));
    }

    #[test]
    fn test_csharp_bot_script() {
        let caps = Capabilities {
            bot: true,
            language: Language::CSharp,
            ..Default::default()
        };
        let script = Surface::Bot.render(&caps);
        assert!(script.contains("cp.spawn(\"dotnet run\""));
        assert!(!script.contains("M365_CLIENT_ID"));
    }

    #[test]
    fn test_task_command() {
        assert_eq!(
            Surface::Tab.task_command(Some("tabs")),
            "node ${workspaceFolder}/teamsfx/script/run.tab.js ${workspaceFolder}/tabs"
        );
        assert_eq!(
            Surface::Auth.task_command(None),
            "node ${workspaceFolder}/teamsfx/script/run.auth.js"
        );
    }
}
