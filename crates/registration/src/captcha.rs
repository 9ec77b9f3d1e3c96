use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use enroller_core::config::CaptchaConfig;
use enroller_core::{EnrollError, Result};

pub type TaskId = u64;

/// Remote reCAPTCHA solving service.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Submit a solve request; returns immediately with the provider's task id.
    async fn create_task(&self, page_url: &str, site_key: &str) -> Result<TaskId>;

    /// Poll the provider until the task is solved and return the response token.
    async fn await_result(&self, task_id: TaskId) -> Result<String>;
}

static SITE_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:data-sitekey="([^"]+)"|sitekey:\s*["']([^"']+)["'])"#).unwrap()
});

/// Extract reCAPTCHA site key from HTML
pub fn extract_recaptcha_key(html: &str) -> Option<String> {
    let captures = SITE_KEY_RE.captures(html)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().to_string())
}

/// CapMonster Cloud client (anti-captcha compatible JSON API).
pub struct CapMonsterSolver {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    poll_interval: Duration,
    max_wait: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest<'a> {
    client_key: &'a str,
    task: RecaptchaTask<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecaptchaTask<'a> {
    #[serde(rename = "type")]
    task_type: &'static str,
    #[serde(rename = "websiteURL")]
    website_url: &'a str,
    website_key: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultRequest<'a> {
    client_key: &'a str,
    task_id: TaskId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    error_id: i64,
    error_code: Option<String>,
    error_description: Option<String>,
    task_id: Option<TaskId>,
    status: Option<String>,
    solution: Option<Solution>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Solution {
    g_recaptcha_response: String,
}

impl ApiResponse {
    fn check(self) -> Result<Self> {
        if self.error_id != 0 {
            return Err(EnrollError::Protocol(format!(
                "captcha provider error {}: {}",
                self.error_code.as_deref().unwrap_or("unknown"),
                self.error_description.as_deref().unwrap_or("")
            )));
        }
        Ok(self)
    }
}

impl CapMonsterSolver {
    pub fn new(config: &CaptchaConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(EnrollError::Configuration(
                "captcha api key is not set (CAPMONSTER_API_KEY)".to_string(),
            ));
        }
        if config.poll_interval_seconds == 0 {
            return Err(EnrollError::Configuration(
                "captcha.poll_interval_seconds must be non-zero".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(EnrollError::transport)?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_seconds),
            max_wait: Duration::from_secs(config.max_wait_seconds),
        })
    }

    async fn call<T: Serialize + ?Sized>(&self, method: &str, body: &T) -> Result<ApiResponse> {
        let response = self
            .client
            .post(format!("{}/{}", self.api_url, method))
            .json(body)
            .send()
            .await
            .map_err(EnrollError::transport)?
            .error_for_status()
            .map_err(EnrollError::transport)?;

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| EnrollError::Protocol(format!("captcha provider {} response: {}", method, e)))?;

        parsed.check()
    }
}

#[async_trait]
impl CaptchaSolver for CapMonsterSolver {
    async fn create_task(&self, page_url: &str, site_key: &str) -> Result<TaskId> {
        let request = CreateTaskRequest {
            client_key: &self.api_key,
            task: RecaptchaTask {
                task_type: "NoCaptchaTaskProxyless",
                website_url: page_url,
                website_key: site_key,
            },
        };

        let response = self.call("createTask", &request).await?;
        response
            .task_id
            .ok_or_else(|| EnrollError::protocol("captcha provider returned no task id"))
    }

    async fn await_result(&self, task_id: TaskId) -> Result<String> {
        let request = TaskResultRequest {
            client_key: &self.api_key,
            task_id,
        };
        let mut waited = Duration::ZERO;

        loop {
            tokio::time::sleep(self.poll_interval).await;
            waited += self.poll_interval;

            let response = self.call("getTaskResult", &request).await?;
            match response.status.as_deref() {
                Some("ready") => {
                    let solution = response
                        .solution
                        .ok_or_else(|| EnrollError::protocol("captcha ready without a solution"))?;
                    info!(task_id, "captcha solved after {}s", waited.as_secs());
                    return Ok(solution.g_recaptcha_response);
                }
                status => debug!(task_id, ?status, "captcha not ready"),
            }

            if waited >= self.max_wait {
                return Err(EnrollError::Protocol(format!(
                    "captcha task {} not solved within {}s",
                    task_id,
                    self.max_wait.as_secs()
                )));
            }
        }
    }
}
