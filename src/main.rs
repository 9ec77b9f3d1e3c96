mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, warn};

use enroller_core::config::AppConfig;

use crate::cli::{Cli, Commands};

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Failures are reported, not turned into a non-zero exit.
    if let Err(e) = dispatch(cli).await {
        error!("{:#}", e);
    }

    Ok(())
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli.config)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    match cli.command {
        Commands::Run { accounts, workers } => {
            if let Some(path) = accounts {
                config.general.accounts_file = path;
            }
            if let Some(n) = workers {
                config.general.workers = n;
            }
            config.validate()?;
            commands::enroll::run(config).await?;
        }
        Commands::Check { accounts } => {
            if let Some(path) = accounts {
                config.general.accounts_file = path;
            }
            config.validate()?;
            commands::enroll::check(&config)?;
        }
    }

    Ok(())
}

fn load_config(path: &str) -> Result<AppConfig> {
    let config_str = std::fs::read_to_string(path).unwrap_or_else(|_| {
        warn!(path = %path, "config file not found, using defaults");
        include_str!("../config/default.toml").to_string()
    });

    toml::from_str(&config_str).with_context(|| format!("invalid config {}", path))
}

/// Environment variable overrides, applied between the config file and CLI flags.
fn apply_env_overrides(config: &mut AppConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(key) = var("CAPMONSTER_API_KEY") {
        config.captcha.api_key = key;
    }
    if let Some(n) = var("ENROLL_WORKERS").and_then(|v| v.parse::<usize>().ok()) {
        config.general.workers = n;
    }
    if let Some(n) = var("ENROLL_SLEEP_MIN").and_then(|v| v.parse::<u64>().ok()) {
        config.general.sleep_min_seconds = n;
    }
    if let Some(n) = var("ENROLL_SLEEP_MAX").and_then(|v| v.parse::<u64>().ok()) {
        config.general.sleep_max_seconds = n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_embedded_config_parses() {
        let config: AppConfig = toml::from_str(include_str!("../config/default.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.general.workers, 3);
    }

    #[test]
    fn test_env_overrides() {
        let mut config: AppConfig = toml::from_str(include_str!("../config/default.toml")).unwrap();
        let env: HashMap<&str, &str> = [
            ("CAPMONSTER_API_KEY", "secret"),
            ("ENROLL_WORKERS", "5"),
            ("ENROLL_SLEEP_MIN", "1"),
            ("ENROLL_SLEEP_MAX", "not-a-number"),
        ]
        .into_iter()
        .collect();

        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.captcha.api_key, "secret");
        assert_eq!(config.general.workers, 5);
        assert_eq!(config.general.sleep_min_seconds, 1);
        assert_eq!(config.general.sleep_max_seconds, 30);
    }
}
