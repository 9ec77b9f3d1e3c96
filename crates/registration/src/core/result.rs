use std::time::Duration;

/// What a completed enrollment produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub email: String,
    pub own_ref_url: Option<String>,
    /// `ref` parameter of `own_ref_url`, empty when no referral link was found.
    pub own_ref_code: String,
    pub resend_cycles: u32,
    pub duration: Duration,
}

impl RegistrationOutcome {
    pub fn summary(&self) -> String {
        if self.own_ref_code.is_empty() {
            format!(
                "✓ Registered {} without referral link ({} resends, {}s)",
                self.email,
                self.resend_cycles,
                self.duration.as_secs()
            )
        } else {
            format!(
                "✓ Registered {} with referral code {} ({} resends, {}s)",
                self.email,
                self.own_ref_code,
                self.resend_cycles,
                self.duration.as_secs()
            )
        }
    }
}
