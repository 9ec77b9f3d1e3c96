use async_trait::async_trait;
use tracing::debug;

use enroller_core::config::{AppConfig, HttpConfig, MailboxConfig, ProviderConfig};
use enroller_core::{Account, Result};
use enroller_mailbox::{ImapMailbox, ImapSettings, Mailbox};

use crate::core::RegistrationOutcome;
use crate::http::{HttpWaitlistClient, WaitlistApi};
use crate::orchestrator::RegistrationEngine;

/// Per-account connections. Opened HTTP first, then mailbox.
pub struct SessionResources {
    pub http: Box<dyn WaitlistApi>,
    pub mailbox: Box<dyn Mailbox>,
}

impl SessionResources {
    /// Log out of the mailbox. Errors are logged, never returned.
    pub async fn close(&mut self) {
        if let Err(e) = self.mailbox.close().await {
            debug!("mailbox close failed: {}", e);
        }
    }
}

/// Opens the connections an account needs.
#[async_trait]
pub trait SessionOpener: Send + Sync {
    async fn open(&self, account: &Account) -> Result<SessionResources>;
}

/// reqwest client with the account's proxy plus an IMAP session on the account's host.
pub struct LiveSessionOpener {
    provider: ProviderConfig,
    http: HttpConfig,
    mailbox: MailboxConfig,
}

impl LiveSessionOpener {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            http: config.http.clone(),
            mailbox: config.mailbox.clone(),
        }
    }
}

#[async_trait]
impl SessionOpener for LiveSessionOpener {
    async fn open(&self, account: &Account) -> Result<SessionResources> {
        let http = HttpWaitlistClient::new(
            self.provider.clone(),
            &self.http,
            account.proxy.as_deref(),
        )?;

        let mailbox = ImapMailbox::connect(ImapSettings {
            host: account.email_host.clone(),
            port: self.mailbox.port,
            username: account.email_username.clone(),
            password: account.email_password.clone(),
            mailbox: self.mailbox.mailbox.clone(),
        })
        .await?;

        Ok(SessionResources {
            http: Box::new(http),
            mailbox: Box::new(mailbox),
        })
    }
}

/// Unit of work handed to the worker pool.
#[async_trait]
pub trait AccountProcessor: Send + Sync {
    async fn process(&self, account: &Account) -> Result<RegistrationOutcome>;
}

/// Opens an account's session, runs the registration and closes the session on
/// every exit path.
pub struct Enroller {
    opener: Box<dyn SessionOpener>,
    engine: RegistrationEngine,
}

impl Enroller {
    pub fn new(opener: Box<dyn SessionOpener>, engine: RegistrationEngine) -> Self {
        Self { opener, engine }
    }
}

#[async_trait]
impl AccountProcessor for Enroller {
    async fn process(&self, account: &Account) -> Result<RegistrationOutcome> {
        let mut resources = self.opener.open(account).await?;

        let result = self
            .engine
            .register(account, resources.http.as_ref(), resources.mailbox.as_mut())
            .await;

        resources.close().await;
        result
    }
}
