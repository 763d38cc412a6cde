//! Mekan restaurant directory server
//!
//! Binary entry point: serves the REST API, or issues a development token.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mekan::MekanServer;
use mekan_auth::JwtManager;
use mekan_common::config::MekanConfig;

#[derive(Parser, Debug)]
#[command(name = "mekan")]
#[command(about = "Restaurant directory REST backend", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "MEKAN_CONFIG", default_value = "mekan.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the REST API (default)
    Serve,
    /// Print a signed access token for local development
    Token {
        /// Subject (user id)
        #[arg(long)]
        sub: String,
        /// Display name
        #[arg(long)]
        username: Option<String>,
        /// Group membership, repeatable
        #[arg(long = "group")]
        groups: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match args.log_format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

fn load_config(path: &Path) -> anyhow::Result<MekanConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    } else {
        info!("{} not found, using default configuration", path.display());
        Ok(MekanConfig::default())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let config = load_config(&args.config)?;

    if let Some(Command::Token {
        sub,
        username,
        groups,
    }) = &args.command
    {
        if config.auth.jwt_secret.is_none() {
            anyhow::bail!("auth.jwt_secret must be set to issue tokens the server will accept");
        }
        let manager = JwtManager::from_config(&config.auth)?;
        let token = manager.issue_token(sub, username.as_deref(), groups)?;
        println!("{}", token);
        return Ok(());
    }

    info!("Mekan restaurant directory v{}", env!("CARGO_PKG_VERSION"));

    // Create and run server
    let server = MekanServer::new(config).await?;

    // Handle shutdown signals
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        () = shutdown => {
            server.shutdown().await?;
        }
    }

    Ok(())
}
