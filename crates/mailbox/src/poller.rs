use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use enroller_core::{EnrollError, Result};

use crate::message::MailboxMessage;

/// A live mailbox session.
#[async_trait]
pub trait Mailbox: Send {
    /// Newest message in the selected mailbox, `None` when there is none yet.
    async fn fetch_newest(&mut self) -> Result<Option<MailboxMessage>>;

    /// Release the session. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;

    /// Block until a message with a UID different from the current newest one
    /// shows up, or `timeout` elapses.
    async fn wait_for_new_message(
        &mut self,
        timeout: Duration,
        interval: Duration,
    ) -> Result<Option<MailboxMessage>> {
        let baseline = self.fetch_newest().await?.map(|m| m.uid);
        debug!(?baseline, "waiting for new message");

        await_message(self, timeout, interval, |m| Some(m.uid) != baseline).await
    }
}

/// Poll `fetch_newest` every `interval` until `matches` accepts a message or the
/// budget runs out. The first fetch happens immediately. A zero interval is a
/// `Configuration` error unless the budget is zero too.
pub async fn await_message<M, F>(
    mailbox: &mut M,
    budget: Duration,
    interval: Duration,
    mut matches: F,
) -> Result<Option<MailboxMessage>>
where
    M: Mailbox + ?Sized,
    F: FnMut(&MailboxMessage) -> bool + Send,
{
    if interval.is_zero() && !budget.is_zero() {
        return Err(EnrollError::Configuration("mailbox poll interval must be non-zero".into()));
    }

    let mut remaining = budget;

    while !remaining.is_zero() {
        if let Some(message) = mailbox.fetch_newest().await? {
            if matches(&message) {
                return Ok(Some(message));
            }
        }

        tokio::time::sleep(interval).await;
        remaining = remaining.saturating_sub(interval);
    }

    Ok(None)
}
