//! `diploma revoke`: revoke an issued credential.

use clap::Args;
use serde::Deserialize;

use super::{api_error, unreachable, AuthArgs};

#[derive(Args, Debug)]
pub struct RevokeArgs {
    /// Credential id.
    pub id: String,

    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Deserialize)]
struct RevokeResponse {
    id: String,
    revoked: bool,
}

pub async fn run(args: &RevokeArgs) -> anyhow::Result<()> {
    let token = args.auth.bearer()?;
    let url = format!("{}/api/v1/credentials/{}/revoke", args.auth.endpoint, args.id);

    let resp = reqwest::Client::new()
        .post(&url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| unreachable(&args.auth.endpoint, e))?;
    if !resp.status().is_success() {
        return Err(api_error("revocation", resp).await);
    }

    let data: RevokeResponse = resp.json().await?;
    println!("Credential {} revoked: {}", data.id, data.revoked);
    Ok(())
}
