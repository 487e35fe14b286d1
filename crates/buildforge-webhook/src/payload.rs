use serde::Serialize;

use buildforge_core::job::{JobLogs, JobMetrics};
use buildforge_core::{Job, JobStatus, Phase};

/// Bit-exact external wire format (SPEC_FULL §6). Field presence, not just
/// naming, is part of the contract: logs/metrics/error/phase are only
/// populated when meaningful for the emitted event.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub job_id: String,
    pub status: JobStatus,
    pub timestamp: String,
    pub duration: Option<i64>,
    pub owner: String,
    pub repo_url: String,
    pub git_ref: String,
    pub image_name: String,
    pub image_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<JobLogs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<JobMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Best-effort extraction of the repo owner from a git URL, e.g.
/// `https://github.com/acme/widget.git` or `git@github.com:acme/widget.git`
/// both yield `"acme"`.
pub fn owner_from_repo_url(repo_url: &str) -> String {
    let trimmed = repo_url.trim_end_matches(".git");
    let path = trimmed
        .rsplit_once(':')
        .map(|(_, rest)| rest)
        .or_else(|| trimmed.split("://").nth(1))
        .unwrap_or(trimmed);
    path.split('/')
        .rev()
        .nth(1)
        .unwrap_or_default()
        .to_string()
}

impl WebhookPayload {
    pub fn for_job(job: &Job, phase: Option<Phase>, include_depth: bool) -> Self {
        let duration = job
            .metrics
            .total_duration()
            .and_then(|d| d.num_nanoseconds());
        Self {
            job_id: job.id.to_string(),
            status: job.status,
            timestamp: chrono::Utc::now().to_rfc3339(),
            duration,
            owner: owner_from_repo_url(&job.config.repo_url),
            repo_url: job.config.repo_url.clone(),
            git_ref: job.config.git_ref.clone(),
            image_name: job.config.image_name.clone(),
            image_tags: job.config.image_tags.clone(),
            error: job.error.clone(),
            logs: include_depth.then(|| job.logs.clone()),
            metrics: include_depth.then(|| job.metrics.clone()),
            phase,
            signature: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_from_https_url() {
        assert_eq!(
            owner_from_repo_url("https://github.com/acme/widget.git"),
            "acme"
        );
    }

    #[test]
    fn owner_from_ssh_url() {
        assert_eq!(owner_from_repo_url("git@github.com:acme/widget.git"), "acme");
    }
}
