//! WebhookDispatcher (C6): translates Job phase transitions into outbound
//! HTTP notifications, HMAC-signed and retried, always fire-and-forget with
//! respect to the Monitor loop.

pub mod dispatcher;
pub mod payload;
pub mod transitions;

pub use dispatcher::WebhookDispatcher;
pub use payload::{owner_from_repo_url, WebhookPayload};
pub use transitions::{events_for_transition, Snapshot};
