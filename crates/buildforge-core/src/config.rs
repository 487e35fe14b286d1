//! The immutable build request submitted by a client.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A build request as submitted by a client. Immutable once a Job is created
/// from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Git repository URL to clone.
    pub repo_url: String,
    /// Git ref to check out (branch, tag, or sha).
    pub git_ref: String,
    /// Branch name used for the temp-image tag and the lock key.
    ///
    /// Usually equal to `git_ref` but kept distinct because `git_ref` may be
    /// a sha or tag while the lock/temp-image naming wants a stable branch
    /// identity.
    pub branch: String,
    /// Path to the Dockerfile, relative to the repository root.
    pub dockerfile_path: String,
    /// Image name (without registry or tag), e.g. "myorg/myservice".
    pub image_name: String,
    /// Destination tags to publish, e.g. ["v1.0", "latest"].
    pub image_tags: Vec<String>,
    /// Destination registry URL, e.g. "registry.example.com".
    pub registry_url: String,
    /// Path to git credentials in the secret store, if the repo is private.
    #[serde(default)]
    pub git_credential_path: Option<String>,
    /// Path to registry credentials in the secret store, if auth is required.
    #[serde(default)]
    pub registry_credential_path: Option<String>,
    /// Optional test configuration. Absence triggers the fast path (§4.2).
    #[serde(default)]
    pub tests: Option<TestConfig>,
    /// Per-phase resource overrides.
    #[serde(default)]
    pub resources: PhaseResources,
    /// Webhook delivery configuration.
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    /// Wipe the per-image layer cache before building.
    #[serde(default)]
    pub clear_cache: bool,
}

/// Tests to run against the temp image between build and publish.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestConfig {
    /// Shell commands to run, each in its own workload.
    #[serde(default)]
    pub commands: Vec<String>,
    /// Run the image's default entrypoint as an additional test.
    #[serde(default)]
    pub entrypoint: bool,
}

impl TestConfig {
    /// Whether this config declares any actual test work.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && !self.entrypoint
    }
}

/// CPU/memory overrides per phase. `None` falls back to service defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseResources {
    #[serde(default)]
    pub build: Option<ResourceLimits>,
    #[serde(default)]
    pub test: Option<ResourceLimits>,
    #[serde(default)]
    pub publish: Option<ResourceLimits>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpu_mhz: Option<u32>,
    pub memory_mb: Option<u32>,
}

/// Webhook delivery settings for a single Job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "WebhookConfig::default_on_success")]
    pub notify_on_success: bool,
    #[serde(default = "WebhookConfig::default_on_failure")]
    pub notify_on_failure: bool,
}

impl WebhookConfig {
    fn default_on_success() -> bool {
        true
    }

    fn default_on_failure() -> bool {
        true
    }
}
