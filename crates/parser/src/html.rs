use scraper::{Html, Selector};

/// Value of the first `<input name="...">` in the document.
pub fn input_value(html_str: &str, name: &str) -> Option<String> {
    let document = Html::parse_document(html_str);
    let sel_str = format!("input[name='{}']", name);

    selector(&sel_str)
        .and_then(|s| document.select(&s).next())
        .and_then(|el| el.value().attr("value").map(|s| s.to_string()))
}

/// Content of the first `<meta name="...">` in the document.
pub fn meta_content(html_str: &str, name: &str) -> Option<String> {
    let document = Html::parse_document(html_str);
    let sel_str = format!("meta[name='{}']", name);

    selector(&sel_str)
        .and_then(|s| document.select(&s).next())
        .and_then(|el| el.value().attr("content").map(|s| s.to_string()))
}

fn selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNUP_PAGE: &str = r#"
        <html>
        <head>
            <meta name="csrf-token" content="tok456">
            <meta name="description" content="Join the waitlist">
        </head>
        <body>
            <form action="https://getlaunchlist.com/s/yeywGr" method="post">
                <input type="hidden" name="captcha_settings" value="cfg123" />
                <input type="email" name="email" />
                <input type="submit" name="submit" value="Join Waitlist" />
            </form>
        </body>
        </html>
    "#;

    #[test]
    fn test_input_value() {
        assert_eq!(
            input_value(SIGNUP_PAGE, "captcha_settings").as_deref(),
            Some("cfg123")
        );
        assert_eq!(input_value(SIGNUP_PAGE, "submit").as_deref(), Some("Join Waitlist"));
    }

    #[test]
    fn test_input_without_value_attribute() {
        assert_eq!(input_value(SIGNUP_PAGE, "email"), None);
    }

    #[test]
    fn test_missing_input() {
        assert_eq!(input_value("<html><body></body></html>", "captcha_settings"), None);
    }

    #[test]
    fn test_meta_content() {
        assert_eq!(meta_content(SIGNUP_PAGE, "csrf-token").as_deref(), Some("tok456"));
        assert_eq!(meta_content(SIGNUP_PAGE, "robots"), None);
    }
}
