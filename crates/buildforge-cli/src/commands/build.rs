//! `build.*` subcommands: thin wrappers over the JSON-RPC control surface.

use anyhow::{Context, Result};
use serde_json::json;

use buildforge_core::config::BuildConfig;

use crate::rpc_client::RpcClient;

pub async fn create(api_url: &str, config_path: &str) -> Result<()> {
    let text = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read build config: {config_path}"))?;
    let config: BuildConfig = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse build config: {config_path}"))?;

    let client = RpcClient::new(api_url);
    let result = client
        .call("build.create", serde_json::to_value(config)?)
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub async fn status(api_url: &str, job_id: &str) -> Result<()> {
    let client = RpcClient::new(api_url);
    let result = client
        .call("build.status", json!({ "job_id": job_id }))
        .await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub async fn logs(api_url: &str, job_id: &str, phase: Option<String>) -> Result<()> {
    let client = RpcClient::new(api_url);
    let mut params = json!({ "job_id": job_id });
    if let Some(phase) = phase {
        params["phase"] = json!(phase);
    }
    let result = client.call("build.logs", params).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub async fn cancel(api_url: &str, job_id: &str) -> Result<()> {
    let client = RpcClient::new(api_url);
    let result = client
        .call("build.cancel", json!({ "job_id": job_id }))
        .await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub async fn history(api_url: &str, limit: u64, offset: u64) -> Result<()> {
    let client = RpcClient::new(api_url);
    let result = client
        .call("build.history", json!({ "limit": limit, "offset": offset }))
        .await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
