//! `diploma status`: query the status of a running node.

use clap::Args;
use serde::Deserialize;

use super::{unreachable, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    public_key: String,
    active_sessions: usize,
}

pub async fn run(args: &StatusArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/status", args.endpoint);
    let resp = reqwest::get(&url)
        .await
        .map_err(|e| unreachable(&args.endpoint, e))?;
    if !resp.status().is_success() {
        anyhow::bail!("node returned HTTP {}", resp.status());
    }

    let status: StatusResponse = resp.json().await?;
    println!("Node Status:");
    println!("  Version:     {}", status.version);
    println!("  Uptime:      {}s", status.uptime_secs);
    println!("  Sessions:    {}", status.active_sessions);
    println!("  Issuer key:  {}", status.public_key);
    Ok(())
}
