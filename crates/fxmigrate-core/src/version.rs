//! Project version detection.

use crate::config::{PathsConfig, VersionConfig};
use semver::Version;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Classification of a project's declared version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectVersion {
    /// Already on the target layout.
    Compatible,
    /// Legacy project that can be migrated.
    Upgradeable,
    /// Declares a version this engine does not handle.
    Unsupported,
    /// Not a project this engine knows about.
    Unrelated,
}

/// Result of inspecting a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCheck {
    pub state: ProjectVersion,
    pub version: Option<String>,
}

impl VersionCheck {
    pub fn is_eligible(&self) -> bool {
        self.state == ProjectVersion::Upgradeable
    }
}

/// Inspect the project's settings files. Never writes.
pub async fn check_project(project_root: &Path) -> VersionCheck {
    if let Some(version) = read_version(&project_root.join(PathsConfig::LEGACY_SETTINGS)).await {
        let state = classify_legacy(&version);
        debug!("Legacy project version {} is {:?}", version, state);
        return VersionCheck {
            state,
            version: Some(version),
        };
    }

    if let Some(version) = read_version(&project_root.join(PathsConfig::SETTINGS_FILE)).await {
        let state = classify_current(&version);
        debug!("Project version {} is {:?}", version, state);
        return VersionCheck {
            state,
            version: Some(version),
        };
    }

    VersionCheck {
        state: ProjectVersion::Unrelated,
        version: None,
    }
}

fn classify_legacy(version: &str) -> ProjectVersion {
    if version == VersionConfig::SOURCE_VERSION {
        ProjectVersion::Upgradeable
    } else {
        classify_current(version)
    }
}

fn classify_current(version: &str) -> ProjectVersion {
    match (Version::parse(version), Version::parse(VersionConfig::TARGET_VERSION)) {
        (Ok(declared), Ok(target)) if declared >= target => ProjectVersion::Compatible,
        _ => ProjectVersion::Unsupported,
    }
}

async fn read_version(path: &Path) -> Option<String> {
    let text = tokio::fs::read_to_string(path).await.ok()?;
    let value: Value = serde_json::from_str(&text).ok()?;
    value.get("version")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify_legacy("2.0.0"), ProjectVersion::Upgradeable);
        assert_eq!(classify_legacy("2.1.0"), ProjectVersion::Unsupported);
        assert_eq!(classify_legacy("1.0.0"), ProjectVersion::Unsupported);
        assert_eq!(classify_current("3.0.0"), ProjectVersion::Compatible);
        assert_eq!(classify_current("3.2.1"), ProjectVersion::Compatible);
        assert_eq!(classify_current("not-a-version"), ProjectVersion::Unsupported);
    }

    #[tokio::test]
    async fn test_check_legacy_project() {
        let temp_dir = TempDir::new().unwrap();
        write(
            temp_dir.path(),
            ".fx/configs/projectSettings.json",
            r#"{"version": "2.0.0", "projectId": "abc"}"#,
        );
        let check = check_project(temp_dir.path()).await;
        assert!(check.is_eligible());
        assert_eq!(check.version.as_deref(), Some("2.0.0"));
    }

    #[tokio::test]
    async fn test_check_migrated_project() {
        let temp_dir = TempDir::new().unwrap();
        write(
            temp_dir.path(),
            "teamsfx/settings.json",
            r#"{"version": "3.0.0", "trackingId": "abc"}"#,
        );
        let check = check_project(temp_dir.path()).await;
        assert_eq!(check.state, ProjectVersion::Compatible);
        assert!(!check.is_eligible());
    }

    #[tokio::test]
    async fn test_check_unrelated_directory() {
        let temp_dir = TempDir::new().unwrap();
        let check = check_project(temp_dir.path()).await;
        assert_eq!(check.state, ProjectVersion::Unrelated);
        assert_eq!(check.version, None);
    }
}
