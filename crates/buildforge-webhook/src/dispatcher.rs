use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::{info, warn};

use buildforge_core::Job;

use crate::payload::WebhookPayload;

type HmacSha256 = Hmac<Sha256>;

const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BACKOFF_STEP: Duration = Duration::from_secs(1);
const USER_AGENT: &str = concat!("buildforge/", env!("CARGO_PKG_VERSION"));

/// Dispatches webhook deliveries. Holds one pooled `reqwest::Client` for the
/// process, matching the Monitor's "shared resources" requirement
/// (SPEC_FULL §5).
pub struct WebhookDispatcher {
    client: Client,
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookDispatcher {
    pub fn new() -> Self {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(request_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client builder");
        Self { client }
    }

    /// Fire-and-forget: spawns the delivery as its own task so the caller
    /// (the Monitor loop) never awaits it (SPEC_FULL §9).
    pub fn dispatch(&self, job: &Job, event: &str) {
        let Some(webhook) = job.config.webhook.as_ref() else {
            return;
        };
        let should_notify = if event.ends_with(".failed") {
            webhook.notify_on_failure
        } else {
            webhook.notify_on_success
        };
        if !should_notify {
            return;
        }

        let phase = phase_hint(event);
        let include_depth = event == "job.completed" || event == "job.failed";
        let payload = WebhookPayload::for_job(job, phase, include_depth);

        let client = self.client.clone();
        let url = webhook.url.clone();
        let secret = webhook.secret.clone();
        let headers = webhook.headers.clone();
        let event = event.to_string();
        let job_id = job.id.to_string();

        tokio::spawn(async move {
            deliver_with_retry(&client, &url, secret.as_deref(), &headers, &payload, &job_id, &event)
                .await;
        });
    }
}

/// Best-effort mapping from an event name back to its phase, for the
/// payload's optional `phase` field. Not load-bearing for delivery.
fn phase_hint(event: &str) -> Option<buildforge_core::Phase> {
    if event.starts_with("build.") {
        Some(buildforge_core::Phase::Build)
    } else if event.starts_with("test.") {
        Some(buildforge_core::Phase::Test)
    } else if event.starts_with("publish.") {
        Some(buildforge_core::Phase::Publish)
    } else {
        None
    }
}

fn sign(secret: &str, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

async fn deliver_with_retry(
    client: &Client,
    url: &str,
    secret: Option<&str>,
    headers: &std::collections::HashMap<String, String>,
    payload: &WebhookPayload,
    job_id: &str,
    event: &str,
) {
    let mut payload = payload.clone();
    let body = match serde_json::to_string(&payload) {
        Ok(body) => body,
        Err(err) => {
            warn!(job_id, event, error = %err, "failed to serialize webhook payload");
            return;
        }
    };
    let signature = secret.map(|secret| format!("sha256={}", sign(secret, &body)));
    payload.signature = signature.clone();

    for attempt in 1..=MAX_ATTEMPTS {
        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT)
            .body(body.clone());
        if let Some(signature) = &signature {
            request = request.header("X-Webhook-Signature", signature.clone());
        }
        for (name, value) in headers {
            request = request.header(name, value);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                info!(job_id, event, attempt, "webhook delivered");
                return;
            }
            Ok(response) => {
                warn!(
                    job_id,
                    event,
                    attempt,
                    status = %response.status(),
                    "webhook delivery rejected"
                );
            }
            Err(err) => {
                warn!(job_id, event, attempt, error = %err, "webhook delivery transport error");
            }
        }

        if attempt < MAX_ATTEMPTS {
            tokio::time::sleep(BACKOFF_STEP * attempt).await;
        }
    }

    warn!(job_id, event, attempts = MAX_ATTEMPTS, "webhook delivery exhausted retries");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use buildforge_core::config::{BuildConfig, PhaseResources, WebhookConfig};
    use buildforge_core::{Job, JobId};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    #[test]
    fn signature_is_deterministic_for_the_same_body() {
        let a = sign("shh", "{\"a\":1}");
        let b = sign("shh", "{\"a\":1}");
        assert_eq!(a, b);
    }

    #[test]
    fn signature_changes_with_secret() {
        let a = sign("shh", "{\"a\":1}");
        let b = sign("other", "{\"a\":1}");
        assert_ne!(a, b);
    }

    fn job_with_webhook(url: &str) -> Job {
        let config = BuildConfig {
            repo_url: "https://github.com/acme/widget.git".to_string(),
            git_ref: "main".to_string(),
            branch: "main".to_string(),
            dockerfile_path: "Dockerfile".to_string(),
            image_name: "acme/widget".to_string(),
            image_tags: vec!["latest".to_string()],
            registry_url: "registry.example.com".to_string(),
            git_credential_path: None,
            registry_credential_path: None,
            tests: None,
            resources: PhaseResources::default(),
            webhook: Some(WebhookConfig {
                url: url.to_string(),
                secret: Some("shh".to_string()),
                headers: Default::default(),
                notify_on_success: true,
                notify_on_failure: true,
            }),
            clear_cache: false,
        };
        Job::new(JobId::new(), config, "k".into(), "s".into())
    }

    /// Fails the first two deliveries, succeeds on the third, recording the
    /// signature header seen on every attempt.
    struct FlakyThenOk {
        attempts: AtomicUsize,
        signatures: std::sync::Mutex<Vec<Option<String>>>,
    }

    impl Respond for &FlakyThenOk {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let signature = request
                .headers
                .get("X-Webhook-Signature")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.signatures.lock().unwrap().push(signature);
            if attempt < 3 {
                ResponseTemplate::new(500)
            } else {
                ResponseTemplate::new(200)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_retries_twice_then_succeeds_with_a_stable_signature() {
        let server = MockServer::start().await;
        let responder = Box::leak(Box::new(FlakyThenOk {
            attempts: AtomicUsize::new(0),
            signatures: std::sync::Mutex::new(Vec::new()),
        }));

        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(&*responder)
            .expect(3)
            .mount(&server)
            .await;

        let job = job_with_webhook(&format!("{}/hook", server.uri()));
        let dispatcher = WebhookDispatcher::new();
        dispatcher.dispatch(&job, "job.completed");

        tokio::time::sleep(std::time::Duration::from_secs(10)).await;

        assert_eq!(responder.attempts.load(Ordering::SeqCst), 3);
        let signatures = responder.signatures.lock().unwrap();
        assert_eq!(signatures.len(), 3);
        assert!(signatures.iter().all(|s| s == &signatures[0]));
        assert!(signatures[0].as_deref().unwrap().starts_with("sha256="));
    }
}
