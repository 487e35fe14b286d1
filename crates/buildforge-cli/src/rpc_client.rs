//! A thin JSON-RPC client for the control surface's `/rpc` endpoint.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};

pub struct RpcClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RpcClient {
    pub fn new(api_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/rpc", api_url.trim_end_matches('/')),
        }
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.endpoint))?;

        let envelope: Value = response
            .json()
            .await
            .context("server returned a non-JSON response")?;

        if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown RPC error");
            bail!("{method} failed: {message}");
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{method} response had neither result nor error"))
    }
}
