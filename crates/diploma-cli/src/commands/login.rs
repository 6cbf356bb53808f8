//! `diploma login`: open a session and save its token.

use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{api_error, unreachable, write_token, DEFAULT_ENDPOINT, DEFAULT_TOKEN_FILE};

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Username of the principal.
    #[arg(short, long)]
    pub username: String,

    /// Password of the principal.
    #[arg(short, long)]
    pub password: String,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Where to save the session token.
    #[arg(long, default_value = DEFAULT_TOKEN_FILE)]
    pub token_file: PathBuf,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    expires_in: u64,
    username: String,
    role: String,
}

pub async fn run(args: &LoginArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/login", args.endpoint);
    let body = LoginRequest {
        username: &args.username,
        password: &args.password,
    };

    let resp = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| unreachable(&args.endpoint, e))?;
    if !resp.status().is_success() {
        return Err(api_error("login", resp).await);
    }

    let data: LoginResponse = resp.json().await?;
    write_token(&args.token_file, &data.token)?;
    println!("Logged in as {} ({})", data.username, data.role);
    println!("  Session expires in {}s", data.expires_in);
    println!("  Token saved to {}", args.token_file.display());
    Ok(())
}
