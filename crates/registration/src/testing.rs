//! In-memory collaborators for engine, session and worker tests.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use enroller_core::{EnrollError, Result};
use enroller_mailbox::{BodyPart, Mailbox, MailboxMessage};

use crate::captcha::{CaptchaSolver, TaskId};
use crate::core::SignupForm;
use crate::http::WaitlistApi;

pub const SUBJECT: &str = "Verify Email Address - Nansen 2 Early Access Waitlist Program";

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

pub fn message(uid: u32, subject: &str, body: &str) -> MailboxMessage {
    MailboxMessage {
        uid,
        subject: Some(subject.to_string()),
        from: Some("Nansen <noreply@getlaunchlist.com>".to_string()),
        to: Some("user@test.com".to_string()),
        sender: None,
        date: None,
        received_at: None,
        body: vec![BodyPart {
            content_type: "text/plain".to_string(),
            content: body.to_string(),
        }],
    }
}

/// Waitlist site that answers every call from canned pages and records the calls.
pub struct FakeApi {
    pub signup_page: String,
    pub signup_response: String,
    pub landing_page: String,
    pub resend_ack: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            signup_page: r#"<form><input type="hidden" name="captcha_settings" value="cfg123"></form>"#
                .to_string(),
            signup_response: r#"<head><meta name="csrf-token" content="tok456"></head>"#.to_string(),
            landing_page: r#"<p>Share https://nansen.ai/early-access/?ref=ZXY9 with friends</p>"#
                .to_string(),
            resend_ack: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl WaitlistApi for FakeApi {
    async fn fetch_signup_page(&self, ref_code: Option<&str>) -> Result<String> {
        self.record(format!("GET signup ref={}", ref_code.unwrap_or("-")));
        Ok(self.signup_page.clone())
    }

    async fn submit_signup(&self, form: &SignupForm, _ref_code: Option<&str>) -> Result<String> {
        self.record(format!(
            "POST signup {} {} {}",
            form.email, form.captcha_settings, form.captcha_response
        ));
        Ok(self.signup_response.clone())
    }

    async fn resend_confirmation(&self, email: &str, csrf_token: &str) -> Result<bool> {
        self.record(format!("POST resend {} {}", email, csrf_token));
        Ok(self.resend_ack)
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.record(format!("GET {}", url));
        Ok(self.landing_page.clone())
    }
}

/// Solver that hands back a fixed token.
#[derive(Default)]
pub struct FakeSolver {
    pub created: AtomicUsize,
    pub fail: bool,
}

impl FakeSolver {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptchaSolver for FakeSolver {
    async fn create_task(&self, _page_url: &str, _site_key: &str) -> Result<TaskId> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EnrollError::protocol("captcha provider error ERROR_ZERO_BALANCE"));
        }
        Ok(1)
    }

    async fn await_result(&self, _task_id: TaskId) -> Result<String> {
        Ok("captcha-ok".to_string())
    }
}

/// Mailbox whose newest message changes at scheduled offsets from creation.
pub struct ScriptedMailbox {
    start: Instant,
    script: Vec<(Duration, MailboxMessage)>,
    pub closes: Arc<AtomicUsize>,
}

impl ScriptedMailbox {
    pub fn new(script: Vec<(Duration, MailboxMessage)>) -> Self {
        Self {
            start: Instant::now(),
            script,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Mailbox for ScriptedMailbox {
    async fn fetch_newest(&mut self) -> Result<Option<MailboxMessage>> {
        let elapsed = self.start.elapsed();
        Ok(self
            .script
            .iter()
            .filter(|(at, _)| *at <= elapsed)
            .last()
            .map(|(_, m)| m.clone()))
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
