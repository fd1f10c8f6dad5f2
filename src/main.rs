//! Ferricd - main binary

use clap::{Parser, Subcommand};
use ferricd_core::{Config, Reactor, Server};
use std::path::PathBuf;
use tracing::{error, info};

/// An IRC server daemon in Rust
#[derive(Parser)]
#[command(name = "ferricd")]
#[command(about = "An IRC server daemon in Rust")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "ferricd.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Test configuration and exit
    #[arg(long)]
    test_config: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a default configuration file
    Config {
        /// Output file path
        #[arg(short, long, default_value = "ferricd.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    if let Some(Commands::Config { output }) = cli.command {
        let mut config = Config::default();
        config.listeners.push(ferricd_core::ListenerConfig::default());
        config.to_file(&output)?;
        info!("wrote default configuration to {:?}", output);
        return Ok(());
    }

    let config = if cli.config.exists() {
        info!("loading configuration from {:?}", cli.config);
        Config::from_file(&cli.config)?
    } else {
        anyhow::bail!(
            "configuration file {:?} not found (generate one with `ferricd config`)",
            cli.config
        );
    };

    if cli.test_config {
        config.validate()?;
        info!("configuration is valid");
        return Ok(());
    }

    let mut reactor = Reactor::new();
    let mut server = match Server::new(config, &reactor) {
        Ok(server) => server,
        Err(e) => {
            error!("startup failed: {}", e);
            std::process::exit(1);
        }
    };
    ferricd_modules::register_all(&mut server);
    if let Err(e) = server.start().await {
        error!("startup failed: {}", e);
        std::process::exit(1);
    }

    // Ctrl-C ends the reactor loop after in-flight dispatch.
    let handle = reactor.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            handle.stop();
        }
    });

    reactor.run(&mut server).await;
    info!("reactor stopped, exiting");
    Ok(())
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("default filter is valid");
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}
