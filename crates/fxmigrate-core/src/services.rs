//! Collaborators supplied by the host application.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// What the user is asked to approve before anything is touched.
#[derive(Debug, Clone)]
pub struct UpgradeRequest {
    pub project_path: std::path::PathBuf,
    pub current_version: String,
    pub target_version: String,
}

/// Answer to an [`UpgradeRequest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmationResponse {
    pub accepted: bool,
    pub dont_show_again: bool,
}

impl ConfirmationResponse {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            dont_show_again: false,
        }
    }

    pub fn decline() -> Self {
        Self::default()
    }
}

/// Prompts the user to approve the upgrade.
#[async_trait]
pub trait UserConfirmation: Send + Sync {
    async fn confirm(&self, request: &UpgradeRequest) -> ConfirmationResponse;
}

/// Confirmation that always accepts, for unattended runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl UserConfirmation for AutoConfirm {
    async fn confirm(&self, _request: &UpgradeRequest) -> ConfirmationResponse {
        ConfirmationResponse::accept()
    }
}

/// Failure reported by a [`SecretEncryptor`].
#[derive(Debug, Clone)]
pub struct EncryptError(pub String);

impl fmt::Display for EncryptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for EncryptError {}

/// Encrypts individual secret values before they are written to env files.
pub trait SecretEncryptor: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> std::result::Result<String, EncryptError>;
}

/// Encryptor for hosts without a key store. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEncryption;

impl SecretEncryptor for NoEncryption {
    fn encrypt(&self, _plaintext: &str) -> std::result::Result<String, EncryptError> {
        Err(EncryptError("no secret encryptor configured".to_string()))
    }
}

/// Resolves `${env:NAME}` references.
pub trait EnvLookup: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// The injected collaborators, shared by every step of one attempt.
#[derive(Clone)]
pub struct Services {
    pub encryptor: Arc<dyn SecretEncryptor>,
    pub env: Arc<dyn EnvLookup>,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            encryptor: Arc::new(NoEncryption),
            env: Arc::new(ProcessEnv),
        }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
