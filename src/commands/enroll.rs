use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use enroller_core::config::AppConfig;
use enroller_core::{parse_accounts, Account};
use enroller_registration::{
    AutoRegister, AutoRegisterConfig, CapMonsterSolver, CaptchaSolver, Enroller,
    LiveSessionOpener, RegistrationConfig, RegistrationEngine,
};

fn load_accounts(path: &str) -> Result<Vec<Account>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read accounts file {}", path))?;
    Ok(parse_accounts(&contents)?)
}

/// Enroll every account; returns when the queue is drained or on Ctrl-C.
pub async fn run(config: AppConfig) -> Result<()> {
    let accounts = load_accounts(&config.general.accounts_file)?;
    if accounts.is_empty() {
        warn!(path = %config.general.accounts_file, "accounts file is empty, nothing to do");
        return Ok(());
    }

    let solver: Arc<dyn CaptchaSolver> = Arc::new(CapMonsterSolver::new(&config.captcha)?);
    let engine = RegistrationEngine::new(RegistrationConfig::from_app(&config)?, solver);
    let enroller = Enroller::new(Box::new(LiveSessionOpener::new(&config)), engine);

    let pool = AutoRegister::new(
        AutoRegisterConfig {
            workers: config.general.workers,
            sleep_min_seconds: config.general.sleep_min_seconds,
            sleep_max_seconds: config.general.sleep_max_seconds,
        },
        Arc::new(enroller),
    );

    tokio::select! {
        dequeued = pool.run(accounts) => {
            info!("Finished, {} accounts attempted", dequeued);
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, abandoning in-flight accounts");
        }
    }

    Ok(())
}

/// Offline validation of the accounts file.
pub fn check(config: &AppConfig) -> Result<()> {
    let accounts = load_accounts(&config.general.accounts_file)?;

    println!("{} accounts in {}:\n", accounts.len(), config.general.accounts_file);
    for account in &accounts {
        println!(
            "  {} @ {}  ref={}  proxy={}",
            account.email_username,
            account.email_host,
            account.ref_code.as_deref().unwrap_or("-"),
            if account.proxy.is_some() { "yes" } else { "no" }
        );
    }
    println!(
        "\nworkers={}  think-time={}..{}s  captcha key {}",
        config.general.workers,
        config.general.sleep_min_seconds,
        config.general.sleep_max_seconds,
        if config.captcha.api_key.is_empty() { "MISSING" } else { "set" }
    );

    Ok(())
}
