//! fxmigrate core - upgrades legacy Teams Toolkit projects to the V3 layout.
//!
//! The legacy layout keeps its configuration under `.fx/` and
//! `templates/`. A migration rewrites it into `teamsfx/` (settings,
//! deployment descriptors, per-environment env files), `appPackage/`, and
//! updated editor debug configuration. Every write goes through a backup
//! ledger, so a failed migration leaves the project as it was.
//!
//! # Example
//!
//! ```rust,ignore
//! use fxmigrate_core::{MigrationOutcome, ProjectMigrator};
//!
//! #[tokio::main]
//! async fn main() -> fxmigrate_core::Result<()> {
//!     let migrator = ProjectMigrator::builder("/path/to/project").build();
//!     if let MigrationOutcome::Migrated(report) = migrator.migrate().await? {
//!         println!("Created {} paths", report.created_paths.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod app_yml;
pub mod config;
pub mod context;
pub mod debug;
pub mod document;
pub mod env_file;
pub mod error;
pub mod ledger;
pub mod legacy;
pub mod migrator;
pub mod pipeline;
pub mod placeholder;
pub mod services;
pub mod steps;
pub mod version;

pub use app_yml::{AppYmlConfig, Section};
pub use context::MigrationContext;
pub use document::{Document, DocumentError, NodeId, NodeType};
pub use env_file::EnvFile;
pub use error::{MigrationError, Result};
pub use ledger::{BackupLedger, RollbackReport};
pub use legacy::{Capabilities, Language, LegacySettings};
pub use migrator::{MigrationOutcome, MigrationReport, ProjectMigrator, ProjectMigratorBuilder};
pub use pipeline::MigrationPipeline;
pub use services::{
    AutoConfirm, ConfirmationResponse, EncryptError, EnvLookup, NoEncryption, ProcessEnv,
    SecretEncryptor, Services, UpgradeRequest, UserConfirmation,
};
pub use steps::MigrationStep;
pub use version::{check_project, ProjectVersion, VersionCheck};
