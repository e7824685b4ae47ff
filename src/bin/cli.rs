//! Retro Forward CLI
//!
//! Runs one port-forwarding session from a JSON request and prints the
//! JSON result on stdout.
//!
//! Usage: `retro-forward [--config <file>] <request.json>`

use anyhow::{Context, Result};
use clap::Parser;
use retro_forward::session::SessionDeps;
use retro_forward::{RouterSession, SessionConfig, SessionRequest};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// retro-forward: open router ports for online retro consoles
#[derive(Parser, Debug)]
#[command(
    name = "retro-forward",
    version,
    about = "Router port-forwarding for Saturn and Dreamcast online play"
)]
struct Args {
    /// Session configuration file; defaults apply when it does not exist
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        default_value = "retro-forward.json"
    )]
    config: PathBuf,

    /// JSON session request
    #[arg(value_name = "REQUEST")]
    request: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    retro_forward::init_logging("info");

    let args = Args::parse();
    let config = SessionConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let data = std::fs::read_to_string(&args.request)
        .with_context(|| format!("Failed to read {}", args.request.display()))?;
    let request: SessionRequest =
        serde_json::from_str(&data).context("Failed to parse session request")?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling session");
            ctrl_c.cancel();
        }
    });

    let deps = SessionDeps::system(&config);
    let session = RouterSession::new(config, deps);
    info!("Session {}", session.id());

    let result = session.run(request, cancel).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_config() {
        let args = Args::try_parse_from(["retro-forward", "request.json"]).unwrap();
        assert_eq!(args.config, PathBuf::from("retro-forward.json"));
        assert_eq!(args.request, PathBuf::from("request.json"));
    }

    #[test]
    fn test_args_config_flag() {
        let args =
            Args::try_parse_from(["retro-forward", "-c", "home.json", "request.json"]).unwrap();
        assert_eq!(args.config, PathBuf::from("home.json"));

        let args = Args::try_parse_from([
            "retro-forward",
            "request.json",
            "--config",
            "lab.json",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("lab.json"));
    }

    #[test]
    fn test_args_require_request() {
        assert!(Args::try_parse_from(["retro-forward"]).is_err());
        assert!(Args::try_parse_from(["retro-forward", "a.json", "b.json"]).is_err());
    }
}
