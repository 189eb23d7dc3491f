use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use devboard::{config, server};

#[derive(Parser, Debug)]
#[command(name = "devboard")]
#[command(about = "Metrics-aggregation backend for an Azure DevOps dashboard")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/devboard/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Port to listen on (overrides the config file)
  #[arg(short, long)]
  port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override port if specified on command line
  if let Some(port) = args.port {
    config.server.port = port;
  }

  server::run(config).await?;

  Ok(())
}
