//! `diploma issue`: issue a signed diploma credential.

use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use diploma_core::Credential;

use super::{api_error, unreachable, AuthArgs};

#[derive(Args, Debug)]
pub struct IssueArgs {
    /// Name of the credential subject.
    #[arg(short, long)]
    pub subject: String,

    /// Title of the credential, e.g. "BSc Physics".
    #[arg(short, long)]
    pub title: String,

    /// Also write the signed record to this file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Serialize)]
struct IssueRequest<'a> {
    subject_name: &'a str,
    credential_title: &'a str,
}

#[derive(Deserialize)]
struct IssueResponse {
    id: String,
    download_url: String,
    credential: Credential,
}

pub async fn run(args: &IssueArgs) -> anyhow::Result<()> {
    let token = args.auth.bearer()?;
    let url = format!("{}/api/v1/credentials", args.auth.endpoint);
    let body = IssueRequest {
        subject_name: &args.subject,
        credential_title: &args.title,
    };

    let resp = reqwest::Client::new()
        .post(&url)
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .map_err(|e| unreachable(&args.auth.endpoint, e))?;
    if !resp.status().is_success() {
        return Err(api_error("issuance", resp).await);
    }

    let data: IssueResponse = resp.json().await?;
    println!("Credential issued!");
    println!("  ID:        {}", data.id);
    println!("  Subject:   {}", data.credential.subject_name);
    println!("  Title:     {}", data.credential.credential_title);
    println!("  Issued at: {}", data.credential.issued_at.to_rfc3339());
    println!("  Download:  {}{}", args.auth.endpoint, data.download_url);

    if let Some(ref path) = args.output {
        std::fs::write(path, serde_json::to_vec_pretty(&data.credential)?)?;
        println!("  Saved to:  {}", path.display());
    }
    Ok(())
}
