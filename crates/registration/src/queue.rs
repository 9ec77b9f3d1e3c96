use std::collections::VecDeque;
use std::sync::Mutex;

use enroller_core::Account;

/// FIFO of accounts filled once and drained by the workers. Nothing is re-queued.
#[derive(Debug, Default)]
pub struct AccountQueue {
    inner: Mutex<VecDeque<Account>>,
}

impl AccountQueue {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            inner: Mutex::new(accounts.into()),
        }
    }

    /// Take the next account, or `None` once the queue is drained.
    pub fn try_dequeue(&self) -> Option<Account> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
