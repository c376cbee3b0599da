use colored::Colorize;
use hh_server::{HackhubServer, ServerConfig};

use crate::cli::*;

/// Load the configuration named on the command line, or the defaults.
pub fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    match &cli.config {
        Some(path) => Ok(ServerConfig::load(path)?),
        None => Ok(ServerConfig::default()),
    }
}

/// Apply `serve` flags on top of the loaded configuration.
pub fn apply_overrides(mut config: ServerConfig, args: &ServeArgs) -> ServerConfig {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(url) = &args.identity_url {
        config.identity_url = url.clone();
    }
    if let Some(root) = &args.blob_root {
        config.blob_root = Some(root.clone());
    }
    config
}

pub async fn run_command(cli: Cli, config: ServerConfig) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(apply_overrides(config, &args)).await,
        Command::Config(args) => cmd_config(config, args),
    }
}

async fn cmd_serve(config: ServerConfig) -> anyhow::Result<()> {
    println!("{} hackhub on {}", "▶".green().bold(), config.bind_addr.to_string().bold());
    println!("  Identity: {}", config.identity_url.blue());
    match &config.blob_root {
        Some(root) => println!("  Assets: {}", root.display().to_string().cyan()),
        None => println!("  Assets: {}", "in memory".yellow()),
    }
    HackhubServer::new(config).serve().await?;
    Ok(())
}

fn cmd_config(config: ServerConfig, args: ConfigArgs) -> anyhow::Result<()> {
    let config = if args.defaults { ServerConfig::default() } else { config };
    print!("{}", config.to_toml()?);
    Ok(())
}
