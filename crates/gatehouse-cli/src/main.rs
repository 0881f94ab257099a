use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use gatehouse_broker::{ClientInfo, ProxySocket, ProxySocketFactory, TcpProxySocketFactory};
use gatehouse_common::logging::{self, LogFormat};
use gatehouse_config::{ConfigManager, ConfigStore, GatewayConfig};
use gatehouse_directory::{Argon2PasswordEncryption, Connection, PasswordEncryption};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "gatehouse")]
#[command(about = "Operate a gatehouse remote-access gateway")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "gatehouse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration, then print the effective values
    CheckConfig,
    /// Hash a password for storage in a user directory
    HashPassword {
        /// Password to hash
        #[arg(short, long)]
        password: String,
    },
    /// Check that the proxy daemon accepts connections
    Probe {
        /// Override the configured proxy address (host:port)
        #[arg(short, long)]
        address: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    logging::init(&config.logging.level, LogFormat::parse(&config.logging.format));

    match cli.command {
        Commands::CheckConfig => check_config(&cli.config, &config)?,
        Commands::HashPassword { password } => hash_password(&password)?,
        Commands::Probe { address } => probe(&config, address).await?,
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<GatewayConfig> {
    ConfigManager::with_path(path)
        .load_config()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn check_config(path: &Path, config: &GatewayConfig) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    if path.exists() {
        println!("# Effective configuration ({})", path.display());
    } else {
        println!("# Effective configuration (defaults; {} not found)", path.display());
    }
    println!("{}", rendered);
    Ok(())
}

fn hash_password(password: &str) -> anyhow::Result<()> {
    let hasher = Argon2PasswordEncryption::new();
    let hash = hasher.hash(password).context("Failed to hash password")?;
    println!("{}", hash);
    Ok(())
}

async fn probe(config: &GatewayConfig, address: Option<String>) -> anyhow::Result<()> {
    let factory = match address {
        Some(address) => TcpProxySocketFactory::new(address, config.proxy.connect_timeout()),
        None => TcpProxySocketFactory::from_config(&config.proxy),
    };

    let probe = Connection::new("probe", "probe");
    match factory.open(&probe, &ClientInfo::default()).await {
        Ok(socket) => {
            socket.close().await?;
            info!(address = factory.address(), "Proxy reachable");
            println!("Proxy at {} is reachable", factory.address());
            Ok(())
        }
        Err(e) => {
            error!(address = factory.address(), error = %e, "Proxy unreachable");
            anyhow::bail!("Proxy at {} is unreachable: {}", factory.address(), e)
        }
    }
}
