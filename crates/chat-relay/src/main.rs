//! `chat-relay` binary entrypoint.
//!
//! Configuration comes from environment variables, optionally overlaid by a
//! YAML file and command-line flags.

use chat_relay::{serve, RelayConfig};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chat-relay")]
#[command(version, about = "Relay Ollama chat streams as OpenAI-style SSE", long_about = None)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides PORT and the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Model to request from Ollama (overrides OLLAMA_MODEL and the config file)
    #[arg(short, long)]
    model: Option<String>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Respect `RUST_LOG` if set; otherwise default to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RelayConfig::from_yaml_file(path)?,
        None => RelayConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(model) = cli.model {
        config.model = model;
    }

    serve(config).await
}
