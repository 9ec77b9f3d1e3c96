use serde::Deserialize;

use crate::error::EnrollError;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub captcha: CaptchaConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_accounts_file")]
    pub accounts_file: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_sleep_min")]
    pub sleep_min_seconds: u64,
    #[serde(default = "default_sleep_max")]
    pub sleep_max_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Endpoints and fingerprints of the waitlist being joined.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub signup_page_url: String,
    pub signup_endpoint: String,
    /// The account email is appended as the last path segment.
    pub resend_endpoint: String,
    pub site_origin: String,
    pub resend_origin: String,
    pub captcha_site_key: String,
    pub confirmation_subject: String,
    /// Referral links look like `<prefix>?ref=<code>`.
    pub referral_url_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailboxConfig {
    #[serde(default = "default_imap_port")]
    pub port: u16,
    #[serde(default = "default_mailbox_name")]
    pub mailbox: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_poll_budget")]
    pub poll_budget_seconds: u64,
    /// Unset means resend forever.
    #[serde(default)]
    pub max_resend_cycles: Option<u32>,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            port: default_imap_port(),
            mailbox: default_mailbox_name(),
            poll_interval_seconds: default_poll_interval(),
            poll_budget_seconds: default_poll_budget(),
            max_resend_cycles: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptchaConfig {
    #[serde(default = "default_captcha_api")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_captcha_poll")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_captcha_wait")]
    pub max_wait_seconds: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            api_url: default_captcha_api(),
            api_key: String::new(),
            poll_interval_seconds: default_captcha_poll(),
            max_wait_seconds: default_captcha_wait(),
        }
    }
}

fn default_accounts_file() -> String { "accounts.txt".to_string() }
fn default_workers() -> usize { 3 }
fn default_sleep_min() -> u64 { 10 }
fn default_sleep_max() -> u64 { 30 }
fn default_request_timeout() -> u64 { 30 }
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0".to_string()
}
fn default_imap_port() -> u16 { 993 }
fn default_mailbox_name() -> String { "INBOX".to_string() }
fn default_poll_interval() -> u64 { 5 }
fn default_poll_budget() -> u64 { 60 }
fn default_captcha_api() -> String { "https://api.capmonster.cloud".to_string() }
fn default_captcha_poll() -> u64 { 3 }
fn default_captcha_wait() -> u64 { 120 }

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, EnrollError> {
        toml::from_str(s).map_err(|e| EnrollError::Configuration(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), EnrollError> {
        if self.general.workers == 0 {
            return Err(EnrollError::Configuration("workers must be at least 1".into()));
        }
        if self.general.sleep_min_seconds > self.general.sleep_max_seconds {
            return Err(EnrollError::Configuration(format!(
                "sleep range is empty: {} > {}",
                self.general.sleep_min_seconds, self.general.sleep_max_seconds
            )));
        }
        if self.mailbox.poll_interval_seconds == 0 || self.captcha.poll_interval_seconds == 0 {
            return Err(EnrollError::Configuration("poll intervals must be non-zero".into()));
        }
        Ok(())
    }
}
