//! Per-Job mutex registry (SPEC_FULL §5): every mutating path against a Job —
//! Monitor tick, API cancellation, API cleanup, a log request that updates
//! cached logs — holds this mutex for its full read-modify-write cycle.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use buildforge_core::JobId;
use tokio::sync::Mutex;

/// Lazily-populated map of per-Job mutexes behind an outer rw-lock. Entries
/// are never removed: Jobs are low-cardinality within an active window, and
/// a removed-then-recreated mutex would defeat the serialization it exists
/// to provide if two callers raced on the same id around the removal.
#[derive(Default)]
pub struct JobMutexRegistry {
    mutexes: RwLock<HashMap<JobId, Arc<Mutex<()>>>>,
}

impl JobMutexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mutex_for(&self, job_id: JobId) -> Arc<Mutex<()>> {
        if let Some(mutex) = self.mutexes.read().unwrap().get(&job_id) {
            return mutex.clone();
        }
        self.mutexes
            .write()
            .unwrap()
            .entry(job_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_job_id_returns_the_same_mutex() {
        let registry = JobMutexRegistry::new();
        let id = JobId::new();
        let a = registry.mutex_for(id);
        let b = registry.mutex_for(id);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_job_ids_get_distinct_mutexes() {
        let registry = JobMutexRegistry::new();
        let a = registry.mutex_for(JobId::new());
        let b = registry.mutex_for(JobId::new());
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn mutex_actually_serializes() {
        let registry = JobMutexRegistry::new();
        let id = JobId::new();
        let first = registry.mutex_for(id);
        let guard = first.lock().await;

        let second = registry.mutex_for(id);
        assert!(second.try_lock().is_err());
        drop(guard);
        assert!(second.try_lock().is_ok());
    }
}
