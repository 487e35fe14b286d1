//! The service's runtime settings: orchestrator connection info, Monitor
//! poll interval, Driver tunables, and webhook delivery timeout. Loaded from
//! env vars with typed defaults, then optionally overridden by a KDL file.

use std::path::Path;
use std::time::Duration;

use kdl::KdlDocument;
use tracing::{debug, warn};

use crate::env;
use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub base_url: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub lock_acquire_timeout: chrono::Duration,
    pub build_to_test_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub orchestrator: OrchestratorSettings,
    pub monitor: MonitorSettings,
    pub driver: DriverSettings,
    pub webhook: WebhookSettings,
}

impl ServiceConfig {
    /// Loads from environment variables, each with a sane default except
    /// `BUILDFORGE_ORCHESTRATOR_URL`, which is required.
    pub fn from_env() -> ConfigResult<Self> {
        let base_url = env::required("BUILDFORGE_ORCHESTRATOR_URL")?;
        let orchestrator_timeout_secs: u64 =
            env::parsed("BUILDFORGE_ORCHESTRATOR_TIMEOUT_SECS", 10)?;
        let poll_interval_secs: u64 = env::parsed("BUILDFORGE_MONITOR_POLL_INTERVAL_SECS", 5)?;
        let lock_acquire_timeout_mins: i64 =
            env::parsed("BUILDFORGE_LOCK_ACQUIRE_TIMEOUT_MINUTES", 30)?;
        let build_to_test_delay_secs: u64 = env::parsed("BUILDFORGE_BUILD_TO_TEST_DELAY_SECS", 3)?;
        let webhook_timeout_secs: u64 = env::parsed("BUILDFORGE_WEBHOOK_TIMEOUT_SECS", 30)?;

        Ok(Self {
            orchestrator: OrchestratorSettings {
                base_url,
                request_timeout: Duration::from_secs(orchestrator_timeout_secs),
            },
            monitor: MonitorSettings {
                poll_interval: Duration::from_secs(poll_interval_secs),
            },
            driver: DriverSettings {
                lock_acquire_timeout: chrono::Duration::minutes(lock_acquire_timeout_mins),
                build_to_test_delay: Duration::from_secs(build_to_test_delay_secs),
            },
            webhook: WebhookSettings {
                request_timeout: Duration::from_secs(webhook_timeout_secs),
            },
        })
    }

    /// Loads from the environment, then applies overrides from an optional
    /// KDL file. A missing file is not an error — overrides are opt-in.
    pub fn load(override_path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = Self::from_env()?;
        let Some(path) = override_path else {
            return Ok(config);
        };
        if !path.exists() {
            debug!(path = %path.display(), "no config override file found, using env-derived settings");
            return Ok(config);
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let doc: KdlDocument = text.parse().map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        apply_overrides(&doc, &mut config)?;
        Ok(config)
    }
}

fn node_str(node: &kdl::KdlNode, key: &str) -> Option<String> {
    node.entries()
        .iter()
        .find(|entry| entry.name().map(|n| n.value()) == Some(key))
        .and_then(|entry| entry.value().as_string())
        .map(str::to_string)
}

fn node_u64(node: &kdl::KdlNode, key: &str) -> Option<u64> {
    node.entries()
        .iter()
        .find(|entry| entry.name().map(|n| n.value()) == Some(key))
        .and_then(|entry| entry.value().as_integer())
        .map(|value| value as u64)
}

fn node_i64(node: &kdl::KdlNode, key: &str) -> Option<i64> {
    node.entries()
        .iter()
        .find(|entry| entry.name().map(|n| n.value()) == Some(key))
        .and_then(|entry| entry.value().as_integer())
        .map(|value| value as i64)
}

fn apply_overrides(doc: &KdlDocument, config: &mut ServiceConfig) -> ConfigResult<()> {
    for node in doc.nodes() {
        match node.name().value() {
            "orchestrator" => {
                if let Some(url) = node_str(node, "base-url") {
                    config.orchestrator.base_url = url;
                }
                if let Some(secs) = node_u64(node, "timeout-secs") {
                    config.orchestrator.request_timeout = Duration::from_secs(secs);
                }
            }
            "monitor" => {
                if let Some(secs) = node_u64(node, "poll-interval-secs") {
                    config.monitor.poll_interval = Duration::from_secs(secs);
                }
            }
            "driver" => {
                if let Some(mins) = node_i64(node, "lock-acquire-timeout-mins") {
                    config.driver.lock_acquire_timeout = chrono::Duration::minutes(mins);
                }
                if let Some(secs) = node_u64(node, "build-to-test-delay-secs") {
                    config.driver.build_to_test_delay = Duration::from_secs(secs);
                }
            }
            "webhook" => {
                if let Some(secs) = node_u64(node, "timeout-secs") {
                    config.webhook.request_timeout = Duration::from_secs(secs);
                }
            }
            other => {
                warn!(node = %other, "unrecognized config override node, ignoring");
            }
        }
    }
    Ok(())
}
