//! `diploma list`: list the credentials visible to the caller.

use clap::Args;
use serde::Deserialize;

use diploma_core::CredentialSummary;

use super::{api_error, unreachable, AuthArgs};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Deserialize)]
struct ListResponse {
    summaries: Vec<CredentialSummary>,
    count: usize,
}

pub async fn run(args: &ListArgs) -> anyhow::Result<()> {
    let token = args.auth.bearer()?;
    let url = format!("{}/api/v1/credentials?summary=true", args.auth.endpoint);

    let resp = reqwest::Client::new()
        .get(&url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| unreachable(&args.auth.endpoint, e))?;
    if !resp.status().is_success() {
        return Err(api_error("list", resp).await);
    }

    let data: ListResponse = resp.json().await?;
    println!("Credentials ({}):", data.count);
    if data.summaries.is_empty() {
        println!("  (none)");
    }
    for s in &data.summaries {
        let state = if s.revoked { "REVOKED" } else { "active" };
        println!(
            "  {}  {:<24} {:<32} {}  [{}]",
            s.id,
            s.subject_name,
            s.credential_title,
            s.issued_at.format("%Y-%m-%d"),
            state
        );
    }
    Ok(())
}
