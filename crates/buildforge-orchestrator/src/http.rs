//! HTTP-backed [`WorkloadClient`] modeled on Nomad's job/allocation/logs API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::{LogStream, WorkloadClient};
use crate::error::{ClientError, Result};
use crate::spec::WorkloadSpec;
use crate::status::{
    derive_status, extract_failure_detail, Allocation, Evaluation, RawWorkloadStatus,
    WorkloadStatus,
};

/// Connects to the orchestrator's HTTP API at `base_url`, e.g.
/// `http://orchestrator.internal:4646`.
pub struct HttpWorkloadClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpWorkloadClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builder");
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(rename = "EvalID")]
    eval_id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    #[serde(rename = "Status")]
    status: RawWorkloadStatus,
}

#[async_trait]
impl WorkloadClient for HttpWorkloadClient {
    async fn submit(&self, spec: WorkloadSpec) -> Result<(String, String)> {
        let workload_id = spec.id.clone();
        let response = self
            .client
            .post(self.url("/v1/job"))
            .json(&spec)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            let detail = response.text().await.unwrap_or_default();
            if detail.contains("secret") || detail.contains("template") {
                return Err(ClientError::SecretTemplateInvalid {
                    path: workload_id,
                    message: detail,
                });
            }
            return Err(ClientError::SubmitRefused(detail));
        }
        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClientError::SubmitRefused(detail));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        debug!(workload_id = %workload_id, eval_id = %body.eval_id, "workload submitted");
        Ok((workload_id, body.eval_id))
    }

    async fn status(&self, workload_id: &str) -> Result<WorkloadStatus> {
        let response = self
            .client
            .get(self.url(&format!("/v1/job/{workload_id}")))
            .send()
            .await
            .map_err(|e| ClientError::RetriableTransport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(workload_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let raw: JobStatusResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let allocations = self.allocations(workload_id).await?;
        Ok(derive_status(raw.status, &allocations))
    }

    async fn allocations(&self, workload_id: &str) -> Result<Vec<Allocation>> {
        let response = self
            .client
            .get(self.url(&format!("/v1/job/{workload_id}/allocations")))
            .send()
            .await
            .map_err(|e| ClientError::RetriableTransport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn deregister(&self, workload_id: &str, purge: bool) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/v1/job/{workload_id}?purge={purge}")))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND
        {
            return Err(ClientError::Transport(format!(
                "unexpected status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn task_logs(
        &self,
        alloc_id: &str,
        task: &str,
        stream: LogStream,
    ) -> Result<Vec<String>> {
        let stream_name = match stream {
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
        };
        let response = self
            .client
            .get(self.url(&format!(
                "/v1/client/fs/logs/{alloc_id}?task={task}&type={stream_name}&plain=true"
            )))
            .send()
            .await
            .map_err(|e| ClientError::RetriableTransport(e.to_string()))?;

        if !response.status().is_success() {
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(Vec::new());
            }
            return Err(ClientError::RetriableTransport(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ClientError::RetriableTransport(e.to_string()))?;
        Ok(text.lines().map(str::to_string).collect())
    }

    async fn list_matching(&self, prefix: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url(&format!("/v1/jobs?prefix={prefix}")))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct JobListEntry {
            #[serde(rename = "ID")]
            id: String,
        }
        let entries: Vec<JobListEntry> = response
            .json()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(entries.into_iter().map(|e| e.id).collect())
    }

    async fn failure_detail(&self, workload_id: &str) -> Result<String> {
        let response = self
            .client
            .get(self.url(&format!("/v1/job/{workload_id}/evaluations")))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let evaluations: Vec<Evaluation> = if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?
        } else {
            Vec::new()
        };

        let allocations = self.allocations(workload_id).await?;
        Ok(extract_failure_detail(&evaluations, &allocations))
    }

    async fn leader_health(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url("/v1/status/leader"))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "orchestrator leader health check failed");
            return Err(ClientError::Transport(format!(
                "unexpected status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
