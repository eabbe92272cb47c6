//! reconnect-sim binary
//!
//! Usage:
//!   reconnect-sim [--seed N] [--nodes N] [--mutations N] [--custom P]
//!                 [--empty-learner] [--tcp] [--config PATH]

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use reconnect_protocol::ReconnectConfig;
use reconnect_sim::{run, SimConfig, TransportKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_usage() {
    eprintln!("reconnect-sim - Run one teacher/learner reconnect session");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  --seed N          Random seed (default: 1)");
    eprintln!("  --nodes N         Size of the learner's tree (default: 1000)");
    eprintln!("  --mutations N     Edits applied for the teacher's tree (default: 20)");
    eprintln!("  --custom P        Share of custom view roots (default: 0.05)");
    eprintln!("  --empty-learner   Learner starts without a tree");
    eprintln!("  --tcp             Connect the peers over loopback TCP");
    eprintln!("  --config PATH     JSON reconnect configuration");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RECONNECT_MAX_ACK_DELAY_MS, RECONNECT_STREAM_TIMEOUT_MS,");
    eprintln!("  RECONNECT_STREAM_BUFFER_SIZE, RECONNECT_STRICT_HASH_CHECKS");
    eprintln!("  RUST_LOG (default: reconnect=info)");
}

fn value<T>(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = args.next().with_context(|| format!("{flag} needs a value"))?;
    raw.parse()
        .with_context(|| format!("invalid value for {flag}: {raw}"))
}

/// Parse arguments. `None` means usage was requested.
fn parse_args() -> anyhow::Result<Option<SimConfig>> {
    let mut config = SimConfig::default();
    let mut config_path: Option<PathBuf> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--seed" => config.seed = value(&mut args, "--seed")?,
            "--nodes" => config.nodes = value(&mut args, "--nodes")?,
            "--mutations" => config.mutations = value(&mut args, "--mutations")?,
            "--custom" => config.custom_probability = value(&mut args, "--custom")?,
            "--empty-learner" => config.empty_learner = true,
            "--tcp" => config.transport = TransportKind::Tcp,
            "--config" => config_path = Some(value(&mut args, "--config")?),
            "-h" | "--help" => return Ok(None),
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    config.reconnect = match config_path {
        Some(path) => ReconnectConfig::from_json_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ReconnectConfig::from_env(),
    };
    Ok(Some(config))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reconnect=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some(config) = parse_args()? else {
        print_usage();
        return Ok(());
    };

    let report = run(&config).await.context("reconnect session failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.converged {
        anyhow::bail!("learner did not converge to the teacher's tree");
    }
    Ok(())
}
