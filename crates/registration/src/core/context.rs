use std::time::Duration;

use tokio::time::Instant;

/// Steps of one account's enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    Initial,
    FetchSignupPage,
    SolveChallenge,
    SubmitSignup,
    AwaitConfirmationEmail { cycle: u32 },
    ResendConfirmation { cycle: u32 },
    ConfirmAndExtractReferral,
    Done,
    Failed { kind: &'static str },
}

/// Transition between states with the offset it happened at
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: RegistrationState,
    pub to: RegistrationState,
    pub at: Duration,
    pub details: Option<String>,
}

/// Per-account state discovered along the way.
#[derive(Debug, Default, Clone)]
pub struct RegistrationSession {
    pub csrf_token: Option<String>,
    pub own_ref_url: Option<String>,
    pub resend_cycles: u32,
}

/// Context for one registration attempt
#[derive(Debug)]
pub struct RegistrationContext {
    pub state: RegistrationState,
    pub email: String,
    pub session: RegistrationSession,
    pub evidence: Vec<StateTransition>,
    pub started_at: Instant,
}

impl RegistrationContext {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            state: RegistrationState::Initial,
            email: email.into(),
            session: RegistrationSession::default(),
            evidence: Vec::new(),
            started_at: Instant::now(),
        }
    }

    /// Transition to a new state
    pub fn transition(&mut self, new_state: RegistrationState, details: Option<String>) {
        let old_state = std::mem::replace(&mut self.state, new_state);

        self.evidence.push(StateTransition {
            from: old_state,
            to: self.state.clone(),
            at: self.started_at.elapsed(),
            details,
        });
    }

    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// `from -> to` lines for debug output.
    pub fn trail(&self) -> Vec<String> {
        self.evidence
            .iter()
            .map(|t| format!("{:?} -> {:?}", t.from, t.to))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_recorded() {
        let mut ctx = RegistrationContext::new("user@test.com");
        ctx.transition(RegistrationState::FetchSignupPage, None);
        ctx.transition(
            RegistrationState::AwaitConfirmationEmail { cycle: 0 },
            Some("csrf set".to_string()),
        );

        assert_eq!(ctx.state, RegistrationState::AwaitConfirmationEmail { cycle: 0 });
        assert_eq!(ctx.evidence.len(), 2);
        assert_eq!(ctx.evidence[0].from, RegistrationState::Initial);
        assert_eq!(ctx.evidence[1].details.as_deref(), Some("csrf set"));
        assert_eq!(
            ctx.trail()[1],
            "FetchSignupPage -> AwaitConfirmationEmail { cycle: 0 }"
        );
    }
}
