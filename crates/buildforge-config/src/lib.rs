//! Layered configuration for the BuildForge service: typed environment
//! variables with defaults, optionally overridden by a KDL file.

pub mod env;
pub mod error;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{DriverSettings, MonitorSettings, OrchestratorSettings, ServiceConfig, WebhookSettings};
