use std::sync::Arc;

use tracing::{debug, error, info, warn};

use enroller_core::{Account, EnrollError, Result};
use enroller_mailbox::{await_message, Mailbox, MailboxMessage};
use enroller_parser::{input_value, meta_content, referral_code};

use crate::captcha::{extract_recaptcha_key, CaptchaSolver};
use crate::core::*;
use crate::email_verifier::{extract_verification_link, ConfirmationMatcher};
use crate::http::WaitlistApi;
use crate::verification_helpers::follow_verification_link;
use crate::RegistrationConfig;

/// Drives one account through signup, confirmation and referral extraction
pub struct RegistrationEngine {
    config: RegistrationConfig,
    captcha: Arc<dyn CaptchaSolver>,
}

impl RegistrationEngine {
    pub fn new(config: RegistrationConfig, captcha: Arc<dyn CaptchaSolver>) -> Self {
        Self { config, captcha }
    }

    /// Register an account. The caller owns the collaborators and closes them.
    pub async fn register(
        &self,
        account: &Account,
        api: &dyn WaitlistApi,
        mailbox: &mut dyn Mailbox,
    ) -> Result<RegistrationOutcome> {
        let mut context = RegistrationContext::new(account.email_username.clone());

        info!("Starting registration");

        let result = self.drive(account, api, mailbox, &mut context).await;

        match &result {
            Ok(_) => context.transition(RegistrationState::Done, None),
            Err(e) => context.transition(
                RegistrationState::Failed { kind: e.kind() },
                Some(e.to_string()),
            ),
        }
        debug!(trail = ?context.trail(), "registration finished");

        result
    }

    async fn drive(
        &self,
        account: &Account,
        api: &dyn WaitlistApi,
        mailbox: &mut dyn Mailbox,
        context: &mut RegistrationContext,
    ) -> Result<RegistrationOutcome> {
        let ref_code = account.ref_code.as_deref();

        // Signup page
        context.transition(RegistrationState::FetchSignupPage, ref_code.map(String::from));
        let page = api.fetch_signup_page(ref_code).await?;
        let captcha_settings = input_value(&page, "captcha_settings")
            .ok_or_else(|| EnrollError::protocol("signup page has no captcha_settings input"))?;
        let site_key =
            extract_recaptcha_key(&page).unwrap_or_else(|| self.config.captcha_site_key.clone());

        // CAPTCHA
        context.transition(RegistrationState::SolveChallenge, Some(site_key.clone()));
        let task_id = self
            .captcha
            .create_task(&self.config.signup_page_url, &site_key)
            .await?;
        debug!(task_id, "captcha task created");
        let captcha_response = self.captcha.await_result(task_id).await?;

        // Signup
        context.transition(RegistrationState::SubmitSignup, None);
        let form = SignupForm {
            email: context.email.clone(),
            captcha_settings,
            captcha_response,
        };
        let response = api.submit_signup(&form, ref_code).await?;
        let csrf_token = meta_content(&response, "csrf-token")
            .ok_or_else(|| EnrollError::protocol("signup response has no csrf-token meta"))?;
        context.session.csrf_token = Some(csrf_token);
        info!("📝 Signup submitted, waiting for confirmation email");

        let message = self.await_confirmation(api, mailbox, context).await?;

        // Verification
        context.transition(
            RegistrationState::ConfirmAndExtractReferral,
            Some(format!("uid {}", message.uid)),
        );
        let link = extract_verification_link(&message)?;
        context.session.own_ref_url = follow_verification_link(api, &link, &self.config.referral).await?;

        let own_ref_code = context
            .session
            .own_ref_url
            .as_deref()
            .and_then(referral_code)
            .unwrap_or_default();

        Ok(RegistrationOutcome {
            email: context.email.clone(),
            own_ref_url: context.session.own_ref_url.clone(),
            own_ref_code,
            resend_cycles: context.session.resend_cycles,
            duration: context.duration(),
        })
    }

    /// Wait for the confirmation email, asking for a resend each time a poll budget
    /// runs out.
    async fn await_confirmation(
        &self,
        api: &dyn WaitlistApi,
        mailbox: &mut dyn Mailbox,
        context: &mut RegistrationContext,
    ) -> Result<MailboxMessage> {
        let matcher = ConfirmationMatcher::new(self.config.confirmation_subject.clone());

        loop {
            let cycle = context.session.resend_cycles;
            context.transition(RegistrationState::AwaitConfirmationEmail { cycle }, None);

            let found = await_message(
                &mut *mailbox,
                self.config.poll_budget,
                self.config.poll_interval,
                |m| matcher.matches(m),
            )
            .await?;

            if let Some(message) = found {
                info!("📧 Confirmation email arrived (uid {})", message.uid);
                return Ok(message);
            }

            if let Some(max) = self.config.max_resend_cycles {
                if cycle >= max {
                    error!("Confirmation email never arrived after {} resends", cycle);
                    return Err(EnrollError::TimeoutExhausted { cycles: cycle });
                }
            }

            warn!(
                "No confirmation email after {}s, requesting resend",
                self.config.poll_budget.as_secs()
            );
            context.transition(RegistrationState::ResendConfirmation { cycle: cycle + 1 }, None);

            let csrf_token = context
                .session
                .csrf_token
                .as_deref()
                .ok_or_else(|| EnrollError::protocol("no csrf token to request a resend"))?;

            if !api.resend_confirmation(&context.email, csrf_token).await? {
                return Err(EnrollError::protocol("resend request was not acknowledged"));
            }
            context.session.resend_cycles += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn account(line: &str) -> Account {
        Account::parse_line(line).unwrap()
    }

    fn engine(solver: Arc<FakeSolver>) -> RegistrationEngine {
        RegistrationEngine::new(RegistrationConfig::default(), solver)
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_without_resend() {
        let api = FakeApi::new();
        let solver = Arc::new(FakeSolver::default());
        let mut mailbox = ScriptedMailbox::new(vec![(
            secs(10),
            message(3, SUBJECT, "Confirm here: https://verify.example.com/abc"),
        )]);

        let outcome = engine(solver.clone())
            .register(&account("user@test.com:pw:imap.test.com::"), &api, &mut mailbox)
            .await
            .unwrap();

        assert_eq!(outcome.own_ref_code, "ZXY9");
        assert_eq!(
            outcome.own_ref_url.as_deref(),
            Some("https://nansen.ai/early-access/?ref=ZXY9")
        );
        assert_eq!(outcome.resend_cycles, 0);
        assert_eq!(solver.created(), 1);
        assert_eq!(
            api.calls(),
            vec![
                "GET signup ref=-",
                "POST signup user@test.com cfg123 captcha-ok",
                "GET https://verify.example.com/abc",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_referral_code_passed_to_signup() {
        let api = FakeApi::new();
        let mut mailbox = ScriptedMailbox::new(vec![(
            secs(0),
            message(1, SUBJECT, "https://verify.example.com/abc"),
        )]);

        engine(Arc::new(FakeSolver::default()))
            .register(&account("user@test.com:pw:imap.test.com:FRIEND1:"), &api, &mut mailbox)
            .await
            .unwrap();

        assert_eq!(api.calls()[0], "GET signup ref=FRIEND1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_challenge_input_fails_before_captcha() {
        let mut api = FakeApi::new();
        api.signup_page = "<form><input name=\"email\"></form>".to_string();
        let solver = Arc::new(FakeSolver::default());
        let mut mailbox = ScriptedMailbox::new(vec![]);

        let err = engine(solver.clone())
            .register(&account("user@test.com:pw:imap.test.com::"), &api, &mut mailbox)
            .await
            .unwrap_err();

        assert!(matches!(err, EnrollError::Protocol(_)));
        assert_eq!(solver.created(), 0);
        assert_eq!(api.count("POST"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_captcha_failure_is_fatal() {
        let api = FakeApi::new();
        let solver = Arc::new(FakeSolver { fail: true, ..Default::default() });
        let mut mailbox = ScriptedMailbox::new(vec![]);

        let err = engine(solver)
            .register(&account("user@test.com:pw:imap.test.com::"), &api, &mut mailbox)
            .await
            .unwrap_err();

        assert!(matches!(err, EnrollError::Protocol(_)));
        assert_eq!(api.count("POST signup"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_csrf_token_is_protocol_error() {
        let mut api = FakeApi::new();
        api.signup_response = "<html><body>Thanks!</body></html>".to_string();
        let mut mailbox = ScriptedMailbox::new(vec![]);

        let err = engine(Arc::new(FakeSolver::default()))
            .register(&account("user@test.com:pw:imap.test.com::"), &api, &mut mailbox)
            .await
            .unwrap_err();

        assert!(matches!(err, EnrollError::Protocol(_)));
        assert!(err.to_string().contains("csrf"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_confirmation_triggers_one_resend() {
        let api = FakeApi::new();
        let mut mailbox = ScriptedMailbox::new(vec![
            (secs(0), message(1, "Welcome to the newsletter", "hello")),
            (secs(61), message(2, SUBJECT, "https://verify.example.com/abc")),
        ]);

        let outcome = engine(Arc::new(FakeSolver::default()))
            .register(&account("user@test.com:pw:imap.test.com::"), &api, &mut mailbox)
            .await
            .unwrap();

        assert_eq!(outcome.resend_cycles, 1);
        assert_eq!(api.count("POST resend user@test.com tok456"), 1);
        assert_eq!(outcome.own_ref_code, "ZXY9");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacknowledged_resend_is_protocol_error() {
        let mut api = FakeApi::new();
        api.resend_ack = false;
        let mut mailbox = ScriptedMailbox::new(vec![]);

        let err = engine(Arc::new(FakeSolver::default()))
            .register(&account("user@test.com:pw:imap.test.com::"), &api, &mut mailbox)
            .await
            .unwrap_err();

        assert!(matches!(err, EnrollError::Protocol(_)));
        assert_eq!(api.count("POST resend"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resend_cap_exhausts() {
        let api = FakeApi::new();
        let mut mailbox = ScriptedMailbox::new(vec![]);
        let config = RegistrationConfig {
            max_resend_cycles: Some(2),
            ..RegistrationConfig::default()
        };

        let err = RegistrationEngine::new(config, Arc::new(FakeSolver::default()))
            .register(&account("user@test.com:pw:imap.test.com::"), &api, &mut mailbox)
            .await
            .unwrap_err();

        assert!(matches!(err, EnrollError::TimeoutExhausted { cycles: 2 }));
        assert_eq!(api.count("POST resend"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_landing_page_without_referral() {
        let mut api = FakeApi::new();
        api.landing_page = "<p>Your email is verified.</p>".to_string();
        let mut mailbox = ScriptedMailbox::new(vec![(
            secs(5),
            message(9, SUBJECT, "https://verify.example.com/abc"),
        )]);

        let outcome = engine(Arc::new(FakeSolver::default()))
            .register(&account("user@test.com:pw:imap.test.com::"), &api, &mut mailbox)
            .await
            .unwrap();

        assert_eq!(outcome.own_ref_code, "");
        assert_eq!(outcome.own_ref_url, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_without_link_is_protocol_error() {
        let api = FakeApi::new();
        let mut mailbox = ScriptedMailbox::new(vec![(
            secs(0),
            message(4, SUBJECT, "Please confirm your address."),
        )]);

        let err = engine(Arc::new(FakeSolver::default()))
            .register(&account("user@test.com:pw:imap.test.com::"), &api, &mut mailbox)
            .await
            .unwrap_err();

        assert!(matches!(err, EnrollError::Protocol(_)));
        assert_eq!(api.count("GET https://"), 0);
    }
}
