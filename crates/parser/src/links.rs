use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[A-Za-z0-9\-._~:/?#\[\]@!$&'()*+,;=%]+").unwrap());

/// First absolute http(s) URL in the text, with trailing punctuation removed.
///
/// A closing `)` is kept only while it balances an opening one inside the URL.
pub fn first_url(text: &str) -> Option<String> {
    URL_RE.find(text).map(|m| {
        let mut url = m.as_str();
        loop {
            let trimmed = url.trim_end_matches(&['.', ',', ';', ':', '!', '?', ']', '\''][..]);
            let trimmed = match trimmed.strip_suffix(')') {
                Some(inner) if inner.matches('(').count() < inner.matches(')').count() + 1 => inner,
                _ => trimmed,
            };
            if trimmed.len() == url.len() {
                break;
            }
            url = trimmed;
        }
        url.to_string()
    })
}

/// Finds referral links of the form `<prefix>?ref=<code>`.
#[derive(Debug, Clone)]
pub struct ReferralMatcher {
    re: Regex,
}

impl ReferralMatcher {
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let re = Regex::new(&format!(r"{}\?ref=[a-zA-Z0-9]+", regex::escape(prefix)))?;
        Ok(Self { re })
    }

    pub fn find(&self, page: &str) -> Option<String> {
        self.re.find(page).map(|m| m.as_str().to_string())
    }
}

/// The `ref` query parameter of a referral URL.
pub fn referral_code(referral_url: &str) -> Option<String> {
    let url = Url::parse(referral_url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "ref")
        .map(|(_, value)| value.into_owned())
}
