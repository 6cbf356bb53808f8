//! `diploma get`: fetch one credential record.

use clap::Args;
use std::path::PathBuf;

use diploma_core::Credential;

use super::{api_error, unreachable, AuthArgs};

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Credential id.
    pub id: String,

    /// Write the record to this file instead of printing it.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub auth: AuthArgs,
}

pub async fn run(args: &GetArgs) -> anyhow::Result<()> {
    let token = args.auth.bearer()?;
    let url = format!("{}/api/v1/credentials/{}", args.auth.endpoint, args.id);

    let resp = reqwest::Client::new()
        .get(&url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| unreachable(&args.auth.endpoint, e))?;
    if !resp.status().is_success() {
        return Err(api_error("get", resp).await);
    }

    let credential: Credential = resp.json().await?;
    let pretty = serde_json::to_string_pretty(&credential)?;
    match args.output {
        Some(ref path) => {
            std::fs::write(path, pretty)?;
            println!("Saved credential {} to {}", credential.id, path.display());
        }
        None => println!("{}", pretty),
    }
    Ok(())
}
