use std::{
    env, fs,
    path::{Path, PathBuf},
};

use multistripe_core::{Credentials, DEFAULT_QUEUE_CAPACITY};
use multistripe_driver_stripe::{BindingOptions, DEFAULT_API_BASE, RELEASES};
use serde::{Deserialize, Serialize};
use url::Url;

pub const MANIFEST_FILE_NAME: &str = "multistripe.yaml";

/// MultiStripe manifest file (multistripe.yaml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Versions to register (e.g., "v74", "v82"); every supported release when empty
    #[serde(default)]
    pub versions: Vec<String>,

    /// Environment variable holding the vendor secret key
    #[serde(default = "default_secret_key_env")]
    pub secret_key_env: String,

    /// Environment variable holding the webhook signing secret
    #[serde(default = "default_webhook_secret_env")]
    pub webhook_secret_env: String,

    /// Capacity of each adapter's callback queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Root of the vendor REST API; production when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<Url>,

    #[serde(default)]
    pub ignore_api_version_mismatch: bool,
}

fn default_secret_key_env() -> String {
    "STRIPE_SECRET_KEY".to_string()
}

fn default_webhook_secret_env() -> String {
    "STRIPE_WEBHOOK_SECRET".to_string()
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

#[derive(Debug, thiserror::Error)]
pub enum LoadManifestError {
    #[error("{} not found at {}", MANIFEST_FILE_NAME, .0.display())]
    FileNotFound(PathBuf),
    #[error("Failed to read {}: {}", .0.display(), .1)]
    ReadError(PathBuf, std::io::Error),
    #[error("Failed to parse {}: {}", .0.display(), .1)]
    ParseError(PathBuf, serde_yml::Error),
    #[error("Unsupported version '{0}' (known: {1})")]
    UnsupportedVersion(String, String),
}

#[derive(Debug, thiserror::Error)]
#[error("environment variable {0} is not set")]
pub struct MissingSecret(pub String);

impl Manifest {
    /// Load manifest from the specified file path
    pub fn load(manifest_file_path: &Path) -> Result<Self, LoadManifestError> {
        if !manifest_file_path.exists() {
            return Err(LoadManifestError::FileNotFound(
                manifest_file_path.to_path_buf(),
            ));
        }

        let content = fs::read_to_string(manifest_file_path)
            .map_err(|e| LoadManifestError::ReadError(manifest_file_path.to_path_buf(), e))?;

        let manifest: Manifest = serde_yml::from_str(&content)
            .map_err(|e| LoadManifestError::ParseError(manifest_file_path.to_path_buf(), e))?;

        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), LoadManifestError> {
        let known: Vec<&str> = RELEASES.iter().map(|(key, _)| *key).collect();
        match self
            .versions
            .iter()
            .find(|version| !known.contains(&version.as_str()))
        {
            Some(unknown) => Err(LoadManifestError::UnsupportedVersion(
                unknown.clone(),
                known.join(", "),
            )),
            None => Ok(()),
        }
    }

    /// Versions to register, in manifest order
    pub fn enabled_versions(&self) -> Vec<&str> {
        if self.versions.is_empty() {
            return RELEASES.iter().map(|(key, _)| *key).collect();
        }
        self.versions.iter().map(String::as_str).collect()
    }

    pub fn is_enabled(&self, version: &str) -> bool {
        self.enabled_versions().contains(&version)
    }

    pub fn binding_options(&self) -> BindingOptions {
        BindingOptions {
            api_base: self
                .api_base
                .as_ref()
                .map_or_else(|| DEFAULT_API_BASE.to_string(), Url::to_string),
            ignore_api_version_mismatch: self.ignore_api_version_mismatch,
        }
    }

    /// Read both secrets from the environment
    ///
    /// The webhook secret is required. A missing secret key leaves it empty,
    /// which only affects outbound vendor calls.
    pub fn credentials(&self) -> Result<Credentials, MissingSecret> {
        let webhook_secret = env::var(&self.webhook_secret_env)
            .ok()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| MissingSecret(self.webhook_secret_env.clone()))?;
        let secret_key = env::var(&self.secret_key_env).unwrap_or_default();
        Ok(Credentials::new(secret_key, webhook_secret))
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest {
            versions: Vec::new(),
            secret_key_env: default_secret_key_env(),
            webhook_secret_env: default_webhook_secret_env(),
            queue_capacity: default_queue_capacity(),
            api_base: None,
            ignore_api_version_mismatch: false,
        }
    }
}
