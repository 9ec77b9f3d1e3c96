//! Recognizes the waitlist confirmation email and pulls the verification link out of it
use enroller_core::{EnrollError, Result};
use enroller_mailbox::MailboxMessage;
use enroller_parser::first_url;

#[derive(Debug, Clone)]
pub struct ConfirmationMatcher {
    subject: String,
}

impl ConfirmationMatcher {
    pub fn new(subject: impl Into<String>) -> Self {
        Self { subject: subject.into() }
    }

    /// Exact subject comparison; no trimming, no case folding.
    pub fn matches(&self, message: &MailboxMessage) -> bool {
        message.subject.as_deref() == Some(self.subject.as_str())
    }
}

/// First absolute URL in the first body part.
pub fn extract_verification_link(message: &MailboxMessage) -> Result<String> {
    let part = message
        .first_part()
        .ok_or_else(|| EnrollError::protocol("confirmation email has no body"))?;

    first_url(&part.content).ok_or_else(|| {
        EnrollError::Protocol(format!(
            "no verification link in confirmation email (uid {})",
            message.uid
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use enroller_mailbox::BodyPart;

    fn message(subject: &str, body: &str) -> MailboxMessage {
        MailboxMessage {
            uid: 7,
            subject: Some(subject.to_string()),
            from: None,
            to: None,
            sender: None,
            date: None,
            received_at: None,
            body: vec![BodyPart {
                content_type: "text/plain".to_string(),
                content: body.to_string(),
            }],
        }
    }

    #[test]
    fn test_subject_must_match_exactly() {
        let matcher = ConfirmationMatcher::new("Verify Email Address");

        assert!(matcher.matches(&message("Verify Email Address", "")));
        assert!(!matcher.matches(&message("verify email address", "")));
        assert!(!matcher.matches(&message("Re: Verify Email Address", "")));

        let mut no_subject = message("", "");
        no_subject.subject = None;
        assert!(!matcher.matches(&no_subject));
    }

    #[test]
    fn test_extract_verification_link() {
        let msg = message(
            "Verify",
            "Hi!\nClick https://verify.example.com/abc?t=1. Thanks",
        );
        assert_eq!(
            extract_verification_link(&msg).unwrap(),
            "https://verify.example.com/abc?t=1"
        );
    }

    #[test]
    fn test_missing_link_is_protocol_error() {
        let err = extract_verification_link(&message("Verify", "no links here")).unwrap_err();
        assert!(matches!(err, EnrollError::Protocol(_)));

        let mut empty = message("Verify", "");
        empty.body.clear();
        assert!(matches!(
            extract_verification_link(&empty),
            Err(EnrollError::Protocol(_))
        ));
    }
}
