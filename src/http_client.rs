use crate::error::{AdxError, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Basic-auth credentials for the help center API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Authenticates as `{username}/token`
    Token { username: String, token: String },
    Password { username: String, password: String },
}

impl Credentials {
    /// Basic-auth user and secret
    pub fn basic(&self) -> (String, &str) {
        match self {
            Credentials::Token { username, token } => (format!("{}/token", username), token),
            Credentials::Password { username, password } => (username.clone(), password),
        }
    }
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Prefix for relative request paths
    pub base_url: String,
    pub credentials: Option<Credentials>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds (for exponential backoff cap)
    pub max_retry_delay_ms: u64,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            credentials: None,
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
            user_agent: format!("adxutil/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// JSON and multipart client with retries
pub struct AsyncHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl AsyncHttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(AdxError::from)?;

        Ok(Self { client, config })
    }

    /// Absolute URLs (e.g. `next_page` links) are used as they are
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self.send_with_retry(&url, || self.client.get(&url)).await?;
        decode(&url, response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .send_with_retry(&url, || self.client.post(&url).json(body))
            .await?;
        decode(&url, response).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .send_with_retry(&url, || self.client.put(&url).json(body))
            .await?;
        decode(&url, response).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        self.send_with_retry(&url, || self.client.delete(&url))
            .await?;
        Ok(())
    }

    /// Multipart POST of one file under the `file` field
    pub async fn upload_file<T: DeserializeOwned>(&self, path: &str, file: &Path) -> Result<T> {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| AdxError::from_io(e, file))?;
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "attachment".to_string());

        let url = self.url(path);
        let response = self
            .send_with_retry(&url, || {
                let part = Part::bytes(bytes.clone()).file_name(file_name.clone());
                self.client.post(&url).multipart(Form::new().part("file", part))
            })
            .await?;
        decode(&url, response).await
    }

    /// Follow `next_page` links, collecting the `key` array of every page
    pub async fn get_paginated<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(self.url(path));

        while let Some(url) = next.take() {
            let mut page: serde_json::Value = self.get_json(&url).await?;
            let batch = page
                .get_mut(key)
                .map(serde_json::Value::take)
                .ok_or_else(|| AdxError::UnexpectedResponse {
                    url: url.clone(),
                    details: format!("missing `{}` array", key),
                })?;
            let batch: Vec<T> =
                serde_json::from_value(batch).map_err(|e| AdxError::UnexpectedResponse {
                    url: url.clone(),
                    details: e.to_string(),
                })?;
            items.extend(batch);

            next = page
                .get("next_page")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
        }

        Ok(items)
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            match self.make_request(url, build()).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    if is_retryable_status(status) && attempt < self.config.retry_attempts {
                        warn!("{} answered {}, retrying", url, status);
                        self.wait_before_retry(attempt).await;
                        attempt += 1;
                        continue;
                    }

                    let body = response.text().await.unwrap_or_default();
                    return Err(AdxError::HttpStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                        message: if body.is_empty() {
                            status.canonical_reason().unwrap_or("Unknown").to_string()
                        } else {
                            body
                        },
                    });
                }
                Err(error) => {
                    if attempt < self.config.retry_attempts && self.is_retryable_error(&error) {
                        warn!("{} failed ({}), retrying", url, error);
                        self.wait_before_retry(attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Make a single HTTP request with timeout
    async fn make_request(&self, url: &str, request: RequestBuilder) -> Result<Response> {
        let request = match &self.config.credentials {
            Some(credentials) => {
                let (user, secret) = credentials.basic();
                request.basic_auth(user, Some(secret))
            }
            None => request,
        };
        debug!("HTTP {}", url);

        timeout(
            Duration::from_secs(self.config.timeout_seconds),
            request.send(),
        )
        .await
        .map_err(|_| AdxError::Timeout {
            url: url.to_string(),
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(AdxError::from)
    }

    /// Exponential backoff, capped
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .config
            .retry_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.config.max_retry_delay_ms))
    }

    async fn wait_before_retry(&self, attempt: u32) {
        sleep(self.retry_delay(attempt)).await;
    }

    fn is_retryable_error(&self, error: &AdxError) -> bool {
        match error {
            AdxError::Http(reqwest_error) => {
                reqwest_error.is_timeout() || reqwest_error.is_connect() || reqwest_error.is_request()
            }
            AdxError::Timeout { .. } => true,
            _ => false,
        }
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

/// Server errors and rate limiting are retried; other client errors are not
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T> {
    let body = response.text().await.map_err(AdxError::from)?;
    // DELETE-like endpoints answer 204 with no body
    let body = if body.trim().is_empty() { "null" } else { &body };
    serde_json::from_str(body).map_err(|e| AdxError::UnexpectedResponse {
        url: url.to_string(),
        details: e.to_string(),
    })
}
