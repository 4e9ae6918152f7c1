use super::MigrationStep;
use crate::config::PathsConfig;
use crate::context::MigrationContext;
use crate::error::{MigrationError, Result};
use crate::placeholder::{host_for_scope, NameResolver};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// Rewrite manifest placeholders and move the app package.
pub struct ManifestStep;

#[async_trait]
impl MigrationStep for ManifestStep {
    fn name(&self) -> &'static str {
        "manifest"
    }

    async fn run(&self, ctx: &mut MigrationContext) -> Result<()> {
        if !ctx.exists(PathsConfig::LEGACY_MANIFEST).await {
            return Err(MigrationError::malformed(format!(
                "missing {}",
                PathsConfig::LEGACY_MANIFEST
            )));
        }
        let resolver = resolver_for(ctx).await?;

        let manifest = resolver.rewrite_template(&ctx.read_text(PathsConfig::LEGACY_MANIFEST).await?);
        let hosts = extension_hosts(&manifest);
        if !hosts.is_empty() {
            ctx.add_telemetry("manifest-hosts", hosts.join(","));
        }
        ctx.write_file(PathsConfig::MANIFEST, manifest).await?;

        if ctx.exists(PathsConfig::LEGACY_AAD_MANIFEST).await {
            let aad = resolver.rewrite_template(&ctx.read_text(PathsConfig::LEGACY_AAD_MANIFEST).await?);
            ctx.write_file(PathsConfig::AAD_MANIFEST, aad).await?;
        } else {
            debug!("No identity manifest, skipping");
        }

        if ctx.exists(PathsConfig::LEGACY_RESOURCES_DIR).await {
            ctx.copy(PathsConfig::LEGACY_RESOURCES_DIR, PathsConfig::RESOURCES_DIR)
                .await?;
        }
        Ok(())
    }
}

/// Resolver seeded with the infrastructure template outputs, when present.
pub(crate) async fn resolver_for(ctx: &MigrationContext) -> Result<NameResolver> {
    if ctx.exists(PathsConfig::INFRA_TEMPLATE).await {
        Ok(NameResolver::new(&ctx.read_text(PathsConfig::INFRA_TEMPLATE).await?))
    } else {
        Ok(NameResolver::default())
    }
}

/// Office hosts reached through `extensions[].requirements.scopes`.
fn extension_hosts(manifest: &str) -> Vec<&'static str> {
    let value: Value = match serde_json::from_str(manifest) {
        Ok(v) => v,
        Err(e) => {
            warn!("Manifest is not plain JSON, skipping host detection: {}", e);
            return Vec::new();
        }
    };
    let mut hosts = Vec::new();
    let extensions = value.get("extensions").and_then(Value::as_array);
    for extension in extensions.into_iter().flatten() {
        let scopes = extension
            .pointer("/requirements/scopes")
            .and_then(Value::as_array);
        for scope in scopes.into_iter().flatten().filter_map(Value::as_str) {
            match host_for_scope(scope) {
                Some(host) if !hosts.contains(&host.as_str()) => hosts.push(host.as_str()),
                Some(_) => {}
                None => debug!("Unsupported extension scope {}", scope),
            }
        }
    }
    hosts
}
