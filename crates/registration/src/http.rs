use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use enroller_core::config::{HttpConfig, ProviderConfig};
use enroller_core::{EnrollError, Result};

use crate::core::SignupForm;

/// HTTP side of the waitlist protocol.
#[async_trait]
pub trait WaitlistApi: Send + Sync {
    /// GET the signup page, optionally carrying a referral code.
    async fn fetch_signup_page(&self, ref_code: Option<&str>) -> Result<String>;

    /// POST the signup form; returns the response page.
    async fn submit_signup(&self, form: &SignupForm, ref_code: Option<&str>) -> Result<String>;

    /// Ask for the confirmation email again. Returns the acknowledgement flag.
    async fn resend_confirmation(&self, email: &str, csrf_token: &str) -> Result<bool>;

    /// GET an arbitrary page (the verification link).
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

/// reqwest-backed client, one per account so cookies and proxy stay private.
pub struct HttpWaitlistClient {
    client: reqwest::Client,
    provider: ProviderConfig,
}

impl HttpWaitlistClient {
    pub fn new(provider: ProviderConfig, http: &HttpConfig, proxy: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let mut builder = reqwest::Client::builder()
            .user_agent(http.user_agent.clone())
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(http.request_timeout_seconds));

        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| EnrollError::Configuration(format!("invalid proxy {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(EnrollError::transport)?;

        Ok(Self { client, provider })
    }

    async fn read_page(method: Method, response: reqwest::Response) -> Result<String> {
        let response = log_response(&method, response)
            .error_for_status()
            .map_err(|e| EnrollError::Transport(format!("{} {}", method, e)))?;
        response.text().await.map_err(EnrollError::transport)
    }
}

#[async_trait]
impl WaitlistApi for HttpWaitlistClient {
    async fn fetch_signup_page(&self, ref_code: Option<&str>) -> Result<String> {
        let mut request = self.client.get(&self.provider.signup_page_url);
        if let Some(code) = ref_code {
            request = request.query(&[("ref", code)]);
        }

        let response = request.send().await.map_err(EnrollError::transport)?;
        Self::read_page(Method::GET, response).await
    }

    async fn submit_signup(&self, form: &SignupForm, ref_code: Option<&str>) -> Result<String> {
        let mut request = self
            .client
            .post(&self.provider.signup_endpoint)
            .header(ORIGIN, self.provider.site_origin.as_str())
            .header(REFERER, format!("{}/", self.provider.site_origin))
            .form(&form.fields());
        if let Some(code) = ref_code {
            request = request.query(&[("ref", code)]);
        }

        let response = request.send().await.map_err(EnrollError::transport)?;
        Self::read_page(Method::POST, response).await
    }

    async fn resend_confirmation(&self, email: &str, csrf_token: &str) -> Result<bool> {
        let url = format!("{}/{}", self.provider.resend_endpoint.trim_end_matches('/'), email);

        let response = self
            .client
            .post(&url)
            .header(ORIGIN, self.provider.resend_origin.as_str())
            .header(REFERER, format!("{}/{}", self.provider.signup_endpoint, email))
            .json(&json!({
                "email": email,
                "csrf_token": csrf_token,
            }))
            .send()
            .await
            .map_err(EnrollError::transport)?;

        let body = Self::read_page(Method::POST, response).await?;
        let ack: Value = serde_json::from_str(&body)
            .map_err(|e| EnrollError::Protocol(format!("resend response is not JSON: {}", e)))?;

        Ok(ack.get("ok").map(is_truthy).unwrap_or(false))
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await.map_err(EnrollError::transport)?;
        Self::read_page(Method::GET, response).await
    }
}

fn log_response(method: &Method, response: reqwest::Response) -> reqwest::Response {
    debug!(method = %method, url = %response.url(), status = %response.status(), "HTTP response");
    response
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
