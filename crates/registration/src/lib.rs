// Core modules
pub mod core;
pub mod orchestrator;
pub mod auto_register;
pub mod queue;
pub mod session;

// Collaborators
pub mod captcha;
pub mod email_verifier;
pub mod http;
pub mod verification_helpers;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use self::core::types::*;
pub use self::core::context::*;
pub use self::core::result::*;
pub use orchestrator::*;
pub use auto_register::*;
pub use queue::AccountQueue;
pub use session::*;
pub use captcha::{CapMonsterSolver, CaptchaSolver};
pub use http::{HttpWaitlistClient, WaitlistApi};

use std::time::Duration;

use enroller_core::{AppConfig, EnrollError, Result};
use enroller_parser::ReferralMatcher;

/// Everything the state machine needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    /// Page URL reported to the CAPTCHA provider.
    pub signup_page_url: String,
    /// Used when the signup page does not carry a `data-sitekey`.
    pub captcha_site_key: String,
    pub confirmation_subject: String,
    pub referral: ReferralMatcher,
    pub poll_interval: Duration,
    pub poll_budget: Duration,
    pub max_resend_cycles: Option<u32>,
}

impl RegistrationConfig {
    pub fn from_app(config: &AppConfig) -> Result<Self> {
        let referral = ReferralMatcher::new(&config.provider.referral_url_prefix)
            .map_err(|e| EnrollError::Configuration(format!("referral_url_prefix: {}", e)))?;
        if config.mailbox.poll_interval_seconds == 0 {
            return Err(EnrollError::Configuration(
                "mailbox.poll_interval_seconds must be non-zero".into(),
            ));
        }

        Ok(Self {
            signup_page_url: config.provider.signup_page_url.clone(),
            captcha_site_key: config.provider.captcha_site_key.clone(),
            confirmation_subject: config.provider.confirmation_subject.clone(),
            referral,
            poll_interval: Duration::from_secs(config.mailbox.poll_interval_seconds),
            poll_budget: Duration::from_secs(config.mailbox.poll_budget_seconds),
            max_resend_cycles: config.mailbox.max_resend_cycles,
        })
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            signup_page_url: "https://www.nansen.ai/early-access".to_string(),
            captcha_site_key: "6LcnRGwnAAAAAH-fdJFy0hD3e4GeYxWkMcbkCwi2".to_string(),
            confirmation_subject: "Verify Email Address - Nansen 2 Early Access Waitlist Program"
                .to_string(),
            referral: ReferralMatcher::new("https://nansen.ai/early-access/")
                .expect("static referral prefix"),
            poll_interval: Duration::from_secs(5),
            poll_budget: Duration::from_secs(60),
            max_resend_cycles: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_config_from_default_toml() {
        let app = AppConfig::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        let config = RegistrationConfig::from_app(&app).unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.poll_budget, Duration::from_secs(60));
        assert_eq!(config.max_resend_cycles, None);
        assert_eq!(
            config.referral.find("go to https://nansen.ai/early-access/?ref=AB12 now").as_deref(),
            Some("https://nansen.ai/early-access/?ref=AB12")
        );
    }

    #[test]
    fn test_zero_poll_interval_is_config_error() {
        let mut app = AppConfig::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        app.mailbox.poll_interval_seconds = 0;

        let err = RegistrationConfig::from_app(&app).unwrap_err();
        assert!(matches!(err, EnrollError::Configuration(_)), "{}", err);
    }
}
