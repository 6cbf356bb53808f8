pub mod get;
pub mod issue;
pub mod list;
pub mod login;
pub mod revoke;
pub mod status;
pub mod verify;

use clap::Args;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080";
pub const DEFAULT_TOKEN_FILE: &str = ".diploma-token";

/// Connection options shared by every authenticated command.
#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Bearer token; defaults to the one saved by `diploma login`.
    #[arg(long)]
    pub token: Option<String>,

    /// Where `diploma login` saved the token.
    #[arg(long, default_value = DEFAULT_TOKEN_FILE)]
    pub token_file: PathBuf,
}

impl AuthArgs {
    pub fn bearer(&self) -> anyhow::Result<String> {
        if let Some(ref token) = self.token {
            return Ok(token.clone());
        }
        read_token(&self.token_file)
    }
}

pub fn read_token(path: &Path) -> anyhow::Result<String> {
    let token = std::fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!(
            "no session token at {} ({}); run `diploma login` first",
            path.display(),
            e
        )
    })?;
    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("session token file {} is empty", path.display());
    }
    Ok(token.to_string())
}

pub fn write_token(path: &Path, token: &str) -> anyhow::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    std::io::Write::write_all(&mut file, token.as_bytes())?;
    Ok(())
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Turn a non-success response into an error carrying the node's message.
pub async fn api_error(action: &str, resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status();
    match resp.json::<ErrorBody>().await {
        Ok(body) => anyhow::anyhow!(
            "{} failed (HTTP {}, {}): {}",
            action,
            status,
            body.error.code,
            body.error.message
        ),
        Err(_) => anyhow::anyhow!("{} failed (HTTP {})", action, status),
    }
}

pub fn unreachable(endpoint: &str, e: reqwest::Error) -> anyhow::Error {
    tracing::debug!(error = ?e, %endpoint, "request failed");
    anyhow::anyhow!(
        "could not reach node at {}: {}\nIs the node running? Start it with: diploma-node",
        endpoint,
        e
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file() -> PathBuf {
        std::env::temp_dir().join(format!("diploma-token-{}", rand::random::<u64>()))
    }

    #[test]
    fn test_token_roundtrip_through_file() {
        let path = temp_file();
        write_token(&path, "abc123").unwrap();
        assert_eq!(read_token(&path).unwrap(), "abc123");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_token_file_mentions_login() {
        let err = read_token(&temp_file()).unwrap_err();
        assert!(err.to_string().contains("diploma login"));
    }

    #[test]
    fn test_explicit_token_wins() {
        let args = AuthArgs {
            endpoint: DEFAULT_ENDPOINT.into(),
            token: Some("explicit".into()),
            token_file: temp_file(),
        };
        assert_eq!(args.bearer().unwrap(), "explicit");
    }
}
