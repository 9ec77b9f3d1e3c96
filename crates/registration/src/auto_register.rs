use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, info, info_span, warn, Instrument};

use enroller_core::{Account, EnrollError};

use crate::queue::AccountQueue;
use crate::session::AccountProcessor;

/// Configuration for the enrollment worker pool
#[derive(Debug, Clone)]
pub struct AutoRegisterConfig {
    pub workers: usize,
    /// Think-time after every account, uniform in `[sleep_min, sleep_max]` seconds.
    pub sleep_min_seconds: u64,
    pub sleep_max_seconds: u64,
}

impl Default for AutoRegisterConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            sleep_min_seconds: 10,
            sleep_max_seconds: 30,
        }
    }
}

/// Fixed set of workers draining a shared account queue
pub struct AutoRegister {
    config: AutoRegisterConfig,
    processor: Arc<dyn AccountProcessor>,
}

impl AutoRegister {
    /// An inverted think-time range is swapped and zero workers becomes one.
    pub fn new(mut config: AutoRegisterConfig, processor: Arc<dyn AccountProcessor>) -> Self {
        if config.sleep_min_seconds > config.sleep_max_seconds {
            warn!(
                "Think-time range {}..{}s is inverted, swapping",
                config.sleep_min_seconds, config.sleep_max_seconds
            );
            std::mem::swap(&mut config.sleep_min_seconds, &mut config.sleep_max_seconds);
        }
        config.workers = config.workers.max(1);

        Self { config, processor }
    }

    /// Process every account once. Returns how many accounts were dequeued.
    pub async fn run(&self, accounts: Vec<Account>) -> usize {
        let queue = Arc::new(AccountQueue::new(accounts));
        if queue.is_empty() {
            info!("No accounts to enroll");
            return 0;
        }
        let workers = self.config.workers;

        info!("🤖 Starting {} workers for {} accounts", workers, queue.len());

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let queue = queue.clone();
            let processor = self.processor.clone();
            let config = self.config.clone();

            handles.push(tokio::spawn(async move {
                Self::worker(worker_id, queue, processor, config).await
            }));
        }

        let mut dequeued = 0;
        for handle in handles {
            match handle.await {
                Ok(count) => dequeued += count,
                Err(e) => error!("Worker task failed: {}", e),
            }
        }

        info!("✅ All workers finished ({} accounts processed)", dequeued);
        dequeued
    }

    async fn worker(
        worker_id: usize,
        queue: Arc<AccountQueue>,
        processor: Arc<dyn AccountProcessor>,
        config: AutoRegisterConfig,
    ) -> usize {
        let mut dequeued = 0;

        while let Some(account) = queue.try_dequeue() {
            dequeued += 1;

            let span = info_span!("account", email = %account.email_username);
            let result = processor.process(&account).instrument(span.clone()).await;

            span.in_scope(|| match result {
                Ok(outcome) => info!("{}", outcome.summary()),
                Err(e) => report_failure(&e),
            });

            let pause = rand::thread_rng().gen_range(config.sleep_min_seconds..=config.sleep_max_seconds);
            debug!(worker_id, "sleeping {}s before next account", pause);
            tokio::time::sleep(Duration::from_secs(pause)).await;
        }

        debug!(worker_id, "queue drained, worker exiting");
        dequeued
    }
}

fn report_failure(err: &EnrollError) {
    match err {
        EnrollError::Configuration(_) => warn!("✗ Skipping account: {}", err),
        EnrollError::Transport(_) => error!("✗ Network failure: {}", err),
        EnrollError::Protocol(_) => error!("✗ Waitlist flow broke: {}", err),
        EnrollError::TimeoutExhausted { .. } => error!("✗ Gave up: {}", err),
    }
}
