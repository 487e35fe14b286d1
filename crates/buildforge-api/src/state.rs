//! Shared application state handed to every RPC method handler.

use std::sync::Arc;

use buildforge_driver::Driver;
use buildforge_monitor::registry::JobMutexRegistry;
use buildforge_storage::Storage;
use buildforge_webhook::WebhookDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<Driver>,
    pub storage: Arc<dyn Storage>,
    pub dispatcher: Arc<WebhookDispatcher>,
    /// Shared with the Monitor so that API-triggered mutations (cancel)
    /// serialize against the same per-Job lock the background tick loop
    /// uses.
    pub registry: Arc<JobMutexRegistry>,
}

impl AppState {
    pub fn new(
        driver: Arc<Driver>,
        storage: Arc<dyn Storage>,
        dispatcher: Arc<WebhookDispatcher>,
        registry: Arc<JobMutexRegistry>,
    ) -> Self {
        Self {
            driver,
            storage,
            dispatcher,
            registry,
        }
    }
}
