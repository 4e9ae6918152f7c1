//! Deployment descriptor accumulator.
//!
//! Contributions are merged into sections, never assigned. Objects merge key
//! by key, arrays gain the items they do not already hold, and a scalar that
//! is already present is kept.

use crate::config::VersionConfig;
use crate::error::Result;
use serde_json::{Map, Value};

/// Top-level sections of the descriptor, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    RegisterApp,
    Provision,
    ConfigureApp,
    Deploy,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::RegisterApp,
        Section::Provision,
        Section::ConfigureApp,
        Section::Deploy,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Section::RegisterApp => "registerApp",
            Section::Provision => "provision",
            Section::ConfigureApp => "configureApp",
            Section::Deploy => "deploy",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Merge-only builder for `app.yml` style documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppYmlConfig {
    sections: [Option<Value>; 4],
}

impl AppYmlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `fragment` into `section`, creating the section on first use.
    pub fn merge(&mut self, section: Section, fragment: Value) {
        let slot = &mut self.sections[section.index()];
        match slot {
            Some(existing) => merge_value(existing, fragment),
            None => *slot = Some(fragment),
        }
    }

    pub fn section(&self, section: Section) -> Option<&Value> {
        self.sections[section.index()].as_ref()
    }

    /// Value at a dotted path inside a section, e.g. `tools.devCert`.
    pub fn lookup(&self, section: Section, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(self.section(section)?, |value, key| value.get(key))
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(Option::is_none)
    }

    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        root.insert("version".into(), Value::String(VersionConfig::APP_YML_VERSION.into()));
        for section in Section::ALL {
            if let Some(value) = self.section(section) {
                root.insert(section.key().into(), value.clone());
            }
        }
        Value::Object(root)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.to_value())?)
    }
}

fn merge_value(target: &mut Value, fragment: Value) {
    match (target, fragment) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(existing), Value::Array(incoming)) => {
            for item in incoming {
                if !existing.contains(&item) {
                    existing.push(item);
                }
            }
        }
        // Earlier contributions win.
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sections_are_lazy() {
        let mut config = AppYmlConfig::new();
        assert!(config.is_empty());
        config.merge(Section::Deploy, json!({"tools": {"devCert": {"trust": true}}}));
        assert!(config.section(Section::Provision).is_none());
        assert_eq!(config.lookup(Section::Deploy, "tools.devCert.trust"), Some(&json!(true)));
    }

    #[test]
    fn test_merge_never_overwrites() {
        let mut config = AppYmlConfig::new();
        config.merge(
            Section::Deploy,
            json!({"npmCommands": [{"args": "install", "cwd": "tabs"}], "tab": {"port": 53000}}),
        );
        config.merge(
            Section::Deploy,
            json!({
                "npmCommands": [{"args": "install", "cwd": "tabs"}, {"args": "install", "cwd": "bot"}],
                "tab": {"port": 1, "domain": "localhost"}
            }),
        );
        let deploy = config.section(Section::Deploy).unwrap();
        assert_eq!(deploy["npmCommands"].as_array().unwrap().len(), 2);
        assert_eq!(deploy["tab"], json!({"port": 53000, "domain": "localhost"}));
    }

    #[test]
    fn test_yaml_section_order() {
        let mut config = AppYmlConfig::new();
        config.merge(Section::Deploy, json!({"dotnetCommand": {"args": "build"}}));
        config.merge(Section::RegisterApp, json!({"teamsApp": true}));
        let yaml = config.to_yaml().unwrap();
        let version = yaml.find("version").unwrap();
        let register = yaml.find("registerApp").unwrap();
        let deploy = yaml.find("deploy").unwrap();
        assert!(version < register && register < deploy);
    }
}
