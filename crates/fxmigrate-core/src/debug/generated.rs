//! Bodies of the synthetic tasks spliced into the task list.

use crate::config::DebugConfig;
use crate::legacy::Capabilities;
use serde_json::{json, Value};

/// Prerequisites the V3 check keeps handling itself.
pub const KEPT_PREREQUISITES: [&str; 3] = ["nodejs", "m365Account", "portOccupancy"];

/// Local ports the running surfaces occupy.
pub fn local_ports(caps: &Capabilities) -> Vec<u16> {
    let mut ports = Vec::new();
    if caps.tab {
        ports.push(DebugConfig::TAB_PORT);
        if caps.sso {
            ports.push(DebugConfig::AUTH_PORT);
        }
    }
    if caps.bot {
        ports.push(DebugConfig::BOT_PORT);
        ports.push(DebugConfig::BOT_DEBUG_PORT);
    }
    if caps.function {
        ports.push(DebugConfig::FUNC_PORT);
        ports.push(DebugConfig::FUNC_DEBUG_PORT);
    }
    ports
}

pub fn validate_prerequisites(label: &str, caps: &Capabilities) -> Value {
    json!({
        "label": label,
        "type": "teamsfx",
        "command": "debug-check-prerequisites",
        "args": {
            "prerequisites": KEPT_PREREQUISITES,
            "portOccupancy": local_ports(caps),
        }
    })
}

pub fn start_local_tunnel(label: &str) -> Value {
    json!({
        "label": label,
        "type": "teamsfx",
        "command": "debug-start-local-tunnel",
        "args": {
            "ngrokArgs": format!("http {} --log=stdout --log-format=logfmt", DebugConfig::BOT_PORT),
            "env": DebugConfig::LOCAL_ENV,
            "output": tunnel_output(),
        },
        "isBackground": true,
        "problemMatcher": "$teamsfx-local-tunnel-watch"
    })
}

/// Env names the tunnel task writes its public address to.
pub fn tunnel_output() -> Value {
    json!({"endpoint": "BOT_ENDPOINT", "domain": "BOT_DOMAIN"})
}

pub fn create_resources(label: &str) -> Value {
    lifecycle_task(label, "provision")
}

pub fn set_up_local_projects(label: &str) -> Value {
    lifecycle_task(label, "deploy")
}

fn lifecycle_task(label: &str, command: &str) -> Value {
    json!({
        "label": label,
        "type": "teamsfx",
        "command": command,
        "args": {
            "template": DebugConfig::LOCAL_TEMPLATE,
            "env": DebugConfig::LOCAL_ENV,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_ports() {
        let caps = Capabilities {
            tab: true,
            bot: true,
            ..Default::default()
        };
        assert_eq!(local_ports(&caps), vec![53000, 3978, 9239]);
    }

    #[test]
    fn test_lifecycle_tasks() {
        let task = create_resources("Create resources");
        assert_eq!(task["command"], "provision");
        assert_eq!(task["args"]["template"], "${workspaceFolder}/teamsfx/app.local.yml");
        assert_eq!(set_up_local_projects("x")["command"], "deploy");
    }
}
