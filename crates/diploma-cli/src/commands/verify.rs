//! `diploma verify`: verify a credential file.
//!
//! Online verification asks the node, which also checks revocation.
//! With `--public-key` the signature is checked locally and the node is
//! never contacted.

use clap::Args;
use std::path::PathBuf;

use diploma_core::types::format_timestamp;
use diploma_core::{Credential, Verdict};
use diploma_crypto::PublicKey;
use diploma_registry::verify_credential_signature;

use super::{api_error, unreachable, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Path to the credential JSON file.
    pub file: PathBuf,

    /// Check the signature locally against this issuer key (hex) instead
    /// of asking the node. Revocation is not checked.
    #[arg(long)]
    pub public_key: Option<String>,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

pub async fn run(args: &VerifyArgs) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(&args.file)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", args.file.display(), e))?;

    match args.public_key {
        Some(ref key) => {
            let public_key = PublicKey::from_hex(key)?;
            let valid = verify_offline(&contents, &public_key);
            if valid {
                println!("Signature is VALID for issuer key {}", public_key);
                println!("  (offline check: revocation status not consulted)");
            } else {
                println!("Signature is INVALID for issuer key {}", public_key);
            }
            Ok(())
        }
        None => {
            // Sent as-is: the node turns unparseable input into a verdict.
            let url = format!("{}/api/v1/verify", args.endpoint);
            let resp = reqwest::Client::new()
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(contents)
                .send()
                .await
                .map_err(|e| unreachable(&args.endpoint, e))?;
            if !resp.status().is_success() {
                return Err(api_error("verification", resp).await);
            }
            let verdict: Verdict = resp.json().await?;
            print_verdict(&verdict);
            Ok(())
        }
    }
}

/// Local signature check of a credential document.
pub fn verify_offline(contents: &str, public_key: &PublicKey) -> bool {
    let Ok(document) = serde_json::from_str::<serde_json::Value>(contents) else {
        return false;
    };
    let raw_issued_at = document
        .get("issued_at")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    match serde_json::from_value::<Credential>(document) {
        // The signature only vouches for the canonical timestamp spelling.
        Ok(credential)
            if raw_issued_at.as_deref() == Some(format_timestamp(credential.issued_at).as_str()) =>
        {
            verify_credential_signature(&credential, public_key)
        }
        _ => false,
    }
}

fn print_verdict(verdict: &Verdict) {
    if verdict.valid {
        println!("Credential is VALID");
    } else {
        println!("Credential is INVALID");
    }
    println!("  Reason:   {}", verdict.reason);
    if let Some(ref id) = verdict.credential_id {
        println!("  ID:       {}", id);
    }
    if let Some(ref subject) = verdict.subject_name {
        println!("  Subject:  {}", subject);
    }
}
