use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rategate::config::{LogFormat, ServiceConfig};
use rategate::policy::{compile_config, validate_config, Configuration};

#[derive(Parser)]
#[command(name = "rategate")]
#[command(about = "Validate and compile rate limit configuration", long_about = None)]
struct Cli {
    /// Settings file (YAML, TOML or JSON)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Rate limit configuration file, overrides the settings
    #[arg(short, long)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration
    Check,
    /// Validate, compile and print the resulting policy as JSON
    Show,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = ServiceConfig::load(cli.settings.as_deref()).context("loading settings")?;
    init_tracing(&settings);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let path = cli.file.unwrap_or_else(|| settings.policy.path.clone());
    let config = Configuration::from_file(&path)
        .with_context(|| format!("reading {}", path.display()))?;

    let validated = match validate_config(&config) {
        Ok(validated) => validated,
        Err(e) => {
            error!(kind = ?e.kind(), error = %e, "Configuration is invalid");
            return Err(e).with_context(|| format!("validating {}", path.display()));
        }
    };

    match cli.command {
        Commands::Check => {
            println!("{}: configuration is valid", path.display());
        }
        Commands::Show => {
            let policy = compile_config(&validated);
            println!("{}", serde_json::to_string_pretty(&policy.summary())?);
        }
    }

    Ok(())
}

/// Initialize tracing from the logging settings, letting `RUST_LOG` win.
fn init_tracing(settings: &ServiceConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match settings.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
