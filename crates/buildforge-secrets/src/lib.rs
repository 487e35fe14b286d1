//! Secret materialization: resolves the [`SecretTemplateRequest`]s a
//! `WorkloadSpec` carries into rendered values. Out of scope for depth (the
//! service treats the secret backend as swappable infrastructure) but still
//! needs a real trait and a reference implementation so the Driver's
//! *secret-template-invalid* error path is exercisable.

use std::collections::HashMap;

use async_trait::async_trait;
use buildforge_core::{Error, Result};
use buildforge_orchestrator::SecretTemplateRequest;

/// A secret value: a single string, or a map of keys (e.g. registry
/// username/password pairs).
#[derive(Debug, Clone)]
pub enum SecretValue {
    String(String),
    Map(HashMap<String, String>),
}

impl SecretValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            SecretValue::String(s) => Some(s),
            SecretValue::Map(m) => m.values().next().map(String::as_str),
        }
    }
}

#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn get(&self, path: &str) -> Result<SecretValue>;
    async fn set(&self, path: &str, value: SecretValue) -> Result<()>;
    async fn delete(&self, path: &str) -> Result<()>;

    /// Validate that every template request in `templates` resolves to an
    /// existing secret. Returns the first offending path as
    /// [`Error::SecretTemplateInvalid`] — this is the error the Driver
    /// translates into a submission-refused diagnostic (SPEC_FULL §4.3.1).
    async fn validate_templates(&self, templates: &[SecretTemplateRequest]) -> Result<()> {
        for template in templates {
            if self.get(&template.secret_path).await.is_err() {
                return Err(Error::SecretTemplateInvalid {
                    path: template.secret_path.clone(),
                    message: format!("no secret found at {}", template.secret_path),
                });
            }
        }
        Ok(())
    }
}

/// Reference in-process implementation backed by a map. Production
/// deployments would swap in a real secret store without the Driver or
/// JobSpecBuilder noticing — they only ever see [`SecretProvider`].
#[derive(Default)]
pub struct InMemorySecretProvider {
    secrets: std::sync::Mutex<HashMap<String, SecretValue>>,
}

impl InMemorySecretProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretProvider for InMemorySecretProvider {
    async fn get(&self, path: &str) -> Result<SecretValue> {
        self.secrets
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn set(&self, path: &str, value: SecretValue) -> Result<()> {
        self.secrets.lock().unwrap().insert(path.to_string(), value);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.secrets.lock().unwrap().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn validate_templates_passes_when_all_paths_exist() {
        let provider = InMemorySecretProvider::new();
        provider
            .set("secret/git", SecretValue::String("token".into()))
            .await
            .unwrap();
        let templates = vec![SecretTemplateRequest {
            secret_path: "secret/git".to_string(),
            destination: "/secrets/git-credentials".to_string(),
        }];
        assert!(provider.validate_templates(&templates).await.is_ok());
    }

    #[tokio::test]
    async fn validate_templates_reports_missing_path() {
        let provider = InMemorySecretProvider::new();
        let templates = vec![SecretTemplateRequest {
            secret_path: "secret/missing".to_string(),
            destination: "/secrets/missing".to_string(),
        }];
        let err = provider.validate_templates(&templates).await.unwrap_err();
        assert!(matches!(err, Error::SecretTemplateInvalid { .. }));
    }
}
