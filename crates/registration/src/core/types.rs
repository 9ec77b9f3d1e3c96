/// Fields posted to the waitlist signup endpoint.
#[derive(Debug, Clone)]
pub struct SignupForm {
    pub email: String,
    pub captcha_settings: String,
    pub captcha_response: String,
}

impl SignupForm {
    /// Form-encoded body in the order the site's own form sends it.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("_gotcha", ""),
            ("email", &self.email),
            ("captcha_settings", &self.captcha_settings),
            ("g-recaptcha-response", &self.captcha_response),
            ("submit", "Join Waitlist"),
        ]
    }
}
