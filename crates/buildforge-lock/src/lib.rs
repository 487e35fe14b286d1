//! A tiny façade over [`Storage`]'s session-based locking (C5).
//!
//! The lock's lifetime is tied to a Job's active window: acquired once in
//! `CreateJob`, released once on the Job's transition into a terminal
//! status. Re-acquiring per phase would lose the mutual-exclusion guarantee
//! during the inter-phase sleep (SPEC_FULL §9).

use std::sync::Arc;

use buildforge_core::Result;
use buildforge_storage::Storage;
use chrono::Duration;
use tracing::warn;

pub struct LockCoordinator {
    storage: Arc<dyn Storage>,
}

impl LockCoordinator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Deterministic key over `(registry, image, branch)`; the same triple
    /// always maps to the same key regardless of call site.
    pub fn key_for(&self, registry: &str, image: &str, branch: &str) -> String {
        self.storage.generate_image_lock_key(registry, image, branch)
    }

    /// Blocks up to `ttl`. Fails with [`buildforge_core::Error::LockAlreadyHeld`]
    /// if the key is still held when the timeout elapses.
    pub async fn acquire(&self, key: &str, ttl: Duration) -> Result<String> {
        self.storage
            .acquire_lock(key, ttl)
            .await
            .map_err(Into::into)
    }

    /// Idempotent: a mismatched or already-released session id is logged,
    /// never returned as an error.
    pub async fn release(&self, key: &str, session_id: &str) {
        if let Err(err) = self.storage.release_lock(key, session_id).await {
            warn!(key, error = %err, "lock release reported an error, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildforge_storage::InMemoryStorage;

    fn coordinator() -> LockCoordinator {
        LockCoordinator::new(Arc::new(InMemoryStorage::new()))
    }

    #[tokio::test]
    async fn key_for_is_stable_across_calls() {
        let coordinator = coordinator();
        let a = coordinator.key_for("registry.example.com", "acme/widget", "main");
        let b = coordinator.key_for("registry.example.com", "acme/widget", "main");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn acquire_then_release_allows_reacquire() {
        let coordinator = coordinator();
        let key = coordinator.key_for("registry.example.com", "acme/widget", "main");
        let session = coordinator
            .acquire(&key, Duration::milliseconds(200))
            .await
            .unwrap();
        coordinator.release(&key, &session).await;
        assert!(coordinator
            .acquire(&key, Duration::milliseconds(200))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn concurrent_acquire_for_same_key_serializes() {
        let coordinator = coordinator();
        let key = coordinator.key_for("registry.example.com", "acme/widget", "main");
        let _session = coordinator
            .acquire(&key, Duration::milliseconds(500))
            .await
            .unwrap();
        let second = coordinator.acquire(&key, Duration::milliseconds(50)).await;
        assert!(second.is_err());
    }
}
