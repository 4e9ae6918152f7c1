use super::manifest::resolver_for;
use super::MigrationStep;
use crate::config::PathsConfig;
use crate::context::MigrationContext;
use crate::env_file::EnvFile;
use crate::error::{IoResultExt, MigrationError, Result};
use crate::placeholder::{is_secret_reference, NameResolver};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

static STATE_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^state\.([A-Za-z0-9_\-]+)\.json$").unwrap());

/// Convert per-environment state files to flat `.env.<env>` files.
pub struct EnvironmentStep;

#[async_trait]
impl MigrationStep for EnvironmentStep {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn run(&self, ctx: &mut MigrationContext) -> Result<()> {
        if !ctx.exists(PathsConfig::LEGACY_STATES_DIR).await {
            debug!("No legacy state folder, nothing to convert");
            return Ok(());
        }
        let resolver = resolver_for(ctx).await?;

        let mut envs = Vec::new();
        let states_dir = ctx.path(PathsConfig::LEGACY_STATES_DIR);
        let mut entries = tokio::fs::read_dir(&states_dir).await.with_path(&states_dir)?;
        while let Some(entry) = entries.next_entry().await.with_path(&states_dir)? {
            let file_name = entry.file_name();
            if let Some(caps) = STATE_FILE.captures(&file_name.to_string_lossy()) {
                envs.push(caps[1].to_string());
            }
        }
        envs.sort();

        for env_name in &envs {
            let env = convert_env(ctx, &resolver, env_name).await?;
            let target = format!("{}/.env.{}", PathsConfig::SETTINGS_DIR, env_name);
            ctx.write_file(&target, env.render()).await?;
            debug!("Converted state for environment {} ({} keys)", env_name, env.len());
        }
        ctx.add_telemetry("environments", envs.join(","));
        Ok(())
    }
}

async fn convert_env(ctx: &MigrationContext, resolver: &NameResolver, env_name: &str) -> Result<EnvFile> {
    let mut env = EnvFile::new();

    let state_rel = format!("{}/state.{}.json", PathsConfig::LEGACY_STATES_DIR, env_name);
    let state = parse_json(&ctx.read_text(&state_rel).await?, &state_rel)?;
    for (path, value) in flatten(&state) {
        if is_secret_reference(&value) {
            continue;
        }
        env.set(resolver.state_name(&path), value);
    }

    let config_rel = format!("{}/config.{}.json", PathsConfig::LEGACY_CONFIGS_DIR, env_name);
    if ctx.exists(&config_rel).await {
        let config = parse_json(&ctx.read_text(&config_rel).await?, &config_rel)?;
        for (path, value) in flatten(&config) {
            env.set(resolver.config_name(&path), value);
        }
    }

    let userdata_rel = format!("{}/{}.userdata", PathsConfig::LEGACY_STATES_DIR, env_name);
    if ctx.exists(&userdata_rel).await {
        for (key, value) in EnvFile::parse(&ctx.read_text(&userdata_rel).await?).iter() {
            env.set(resolver.secret_name(key), value);
        }
    }
    Ok(env)
}

fn parse_json(text: &str, rel: &str) -> Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| MigrationError::malformed(format!("cannot parse {}: {}", rel, e)))
}

/// Dotted paths of every scalar leaf. Keys starting with `$` are skipped.
fn flatten(value: &Value) -> Vec<(String, String)> {
    fn walk(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    if key.starts_with('$') {
                        continue;
                    }
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    walk(&path, child, out);
                }
            }
            Value::Null => {}
            Value::String(s) => out.push((prefix.to_string(), s.clone())),
            other => out.push((prefix.to_string(), other.to_string())),
        }
    }
    let mut out = Vec::new();
    walk("", value, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Services;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_flatten() {
        let value = json!({
            "$schema": "x",
            "manifest": {"appName": {"short": "hello"}},
            "skip": null,
            "tags": ["a"],
            "count": 2
        });
        assert_eq!(
            flatten(&value),
            vec![
                ("manifest.appName.short".to_string(), "hello".to_string()),
                ("tags".to_string(), "[\"a\"]".to_string()),
                ("count".to_string(), "2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_convert_state_config_and_userdata() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join(".fx/states")).unwrap();
        std::fs::create_dir_all(root.join(".fx/configs")).unwrap();
        std::fs::write(
            root.join(".fx/states/state.dev.json"),
            r#"{"fx-resource-bot": {"botId": "b1", "botPassword": "{{fx-resource-bot.botPassword}}"}}"#,
        )
        .unwrap();
        std::fs::write(
            root.join(".fx/configs/config.dev.json"),
            r#"{"$schema": "s", "manifest": {"appName": {"short": "hello"}}}"#,
        )
        .unwrap();
        std::fs::write(
            root.join(".fx/states/dev.userdata"),
            "fx-resource-bot.botPassword=crypto_abc\n",
        )
        .unwrap();

        let mut ctx = MigrationContext::new(root, Services::default());
        EnvironmentStep.run(&mut ctx).await.unwrap();

        let env = std::fs::read_to_string(root.join("teamsfx/.env.dev")).unwrap();
        assert_eq!(
            env,
            "BOT_ID=b1\nCONFIG__MANIFEST__APPNAME__SHORT=hello\nSECRET_BOT_PASSWORD=crypto_abc\n"
        );
        assert_eq!(ctx.telemetry()["environments"], "dev");
    }

    #[tokio::test]
    async fn test_missing_state_folder_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut ctx = MigrationContext::new(temp_dir.path(), Services::default());
        EnvironmentStep.run(&mut ctx).await.unwrap();
        assert!(!temp_dir.path().join("teamsfx").exists());
    }
}
