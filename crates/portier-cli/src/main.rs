//! Portier - Basic authentication gate
//!
//! Verifies HTTP Basic credentials against an LDAP directory, caching
//! verified principals for a short time.

use clap::{Parser, Subcommand};
use portier_core::config::{BrowserChallenge, DenyMode, PortierConfig};
use portier_server::PortierServer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "portier")]
#[command(author = "Portier Team")]
#[command(version = portier_core::VERSION)]
#[command(about = "Basic authentication gate backed by LDAP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PORTIER_CONFIG")]
    config: Option<String>,

    /// Bind address
    #[arg(long)]
    bind: Option<String>,

    /// Port number
    #[arg(short, long)]
    port: Option<u16>,

    /// LDAP server URL
    #[arg(long)]
    ldap_url: Option<String>,

    /// Realm announced to browsers on 401 responses
    #[arg(long)]
    realm: Option<String>,

    /// Answer every denial with 401
    #[arg(long)]
    uniform_deny: bool,

    /// Disable the credential cache
    #[arg(long)]
    no_cache: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the authentication gate
    Server,

    /// Validate the configuration and exit
    Check,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load or create config
    let mut config = if let Some(config_path) = &cli.config {
        PortierConfig::from_file(config_path)?
    } else {
        PortierConfig::from_env()
    };

    // Override with CLI args
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(url) = cli.ldap_url {
        config.directory.url = url;
    }
    if let Some(realm) = cli.realm {
        config.auth.browser_challenge = Some(BrowserChallenge { realm });
    }
    if cli.uniform_deny {
        config.auth.deny_mode = DenyMode::Uniform;
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json_logs {
        config.logging.format = "json".to_string();
    }

    init_logging(&config);

    match cli.command {
        Some(Commands::Version) => {
            print_banner();
        }
        Some(Commands::Check) => {
            config.validate()?;
            println!("Configuration OK");
        }
        Some(Commands::Server) | None => {
            print_banner();
            run_server(config).await?;
        }
    }

    Ok(())
}

fn init_logging(config: &PortierConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

fn print_banner() {
    println!(
        r#"
    ____             __  _
   / __ \____  _____/ /_(_)__  _____
  / /_/ / __ \/ ___/ __/ / _ \/ ___/
 / ____/ /_/ / /  / /_/ /  __/ /
/_/    \____/_/   \__/_/\___/_/

   Basic authentication gate
   Version: {}
"#,
        portier_core::VERSION
    );
}

async fn run_server(config: PortierConfig) -> anyhow::Result<()> {
    info!("Starting Portier...");
    info!("Directory: {}", config.directory.url);
    info!("Topology: {:?}", config.directory.topology);

    let server = PortierServer::new(config);
    server.run().await?;

    Ok(())
}
