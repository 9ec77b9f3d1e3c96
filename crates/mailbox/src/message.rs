use chrono::{DateTime, Utc};
use mailparse::{MailHeaderMap, ParsedMail};

/// One decoded leaf part of a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    pub content_type: String,
    pub content: String,
}

/// A fetched email. The UID is a change marker assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxMessage {
    pub uid: u32,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub sender: Option<String>,
    /// Raw `Date` header.
    pub date: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub body: Vec<BodyPart>,
}

impl MailboxMessage {
    /// Parse a raw RFC 5322 payload. Transfer encodings and charsets are decoded.
    pub fn parse(uid: u32, raw: &[u8]) -> Result<Self, mailparse::MailParseError> {
        let parsed = mailparse::parse_mail(raw)?;

        let date = parsed.headers.get_first_value("Date");
        let received_at = date
            .as_deref()
            .and_then(|d| mailparse::dateparse(d).ok())
            .and_then(|ts| DateTime::from_timestamp(ts, 0));

        let mut body = Vec::new();
        collect_parts(&parsed, &mut body)?;

        Ok(Self {
            uid,
            subject: parsed.headers.get_first_value("Subject"),
            from: parsed.headers.get_first_value("From"),
            to: parsed.headers.get_first_value("To"),
            sender: parsed.headers.get_first_value("Sender"),
            date,
            received_at,
            body,
        })
    }

    pub fn first_part(&self) -> Option<&BodyPart> {
        self.body.first()
    }
}

// Depth-first, so the order matches the order parts appear in the message.
fn collect_parts(
    part: &ParsedMail,
    out: &mut Vec<BodyPart>,
) -> Result<(), mailparse::MailParseError> {
    if part.subparts.is_empty() {
        out.push(BodyPart {
            content_type: part.ctype.mimetype.clone(),
            content: part.get_body()?,
        });
        return Ok(());
    }

    for sub in &part.subparts {
        collect_parts(sub, out)?;
    }
    Ok(())
}
