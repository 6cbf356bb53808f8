//! Diploma CLI: Command-line client for the diploma credential node.
//!
//! Subcommands: login, issue, get, list, revoke, verify, status.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Diploma: issue, inspect, revoke and verify signed diplomas.
#[derive(Parser, Debug)]
#[command(name = "diploma", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and save a session token.
    Login(commands::login::LoginArgs),
    /// Issue a signed credential (issuer only).
    Issue(commands::issue::IssueArgs),
    /// Fetch a credential by id.
    Get(commands::get::GetArgs),
    /// List credentials visible to you.
    List(commands::list::ListArgs),
    /// Revoke a credential (issuer only).
    Revoke(commands::revoke::RevokeArgs),
    /// Verify a credential file.
    Verify(commands::verify::VerifyArgs),
    /// Query the status of a running node.
    Status(commands::status::StatusArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Login(args) => commands::login::run(args).await,
        Commands::Issue(args) => commands::issue::run(args).await,
        Commands::Get(args) => commands::get::run(args).await,
        Commands::List(args) => commands::list::run(args).await,
        Commands::Revoke(args) => commands::revoke::run(args).await,
        Commands::Verify(args) => commands::verify::run(args).await,
        Commands::Status(args) => commands::status::run(args).await,
    }
}
