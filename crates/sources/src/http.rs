//! Shared upstream HTTP client.
//!
//! Each call carries its own timeout. Transport failures and 5xx responses are
//! retried with a linear backoff (`attempt × backoff`). GET bodies can be kept
//! in a short-lived page cache so that detail and episode lookups against the
//! same page hit the upstream once.

use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use zeustv_core::cache::TtlCache;

use crate::SourceError;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub retries: u32,
    pub backoff_ms: u64,
    pub page_cache_secs: u64,
    pub user_agent: String,
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            retries: 2,
            backoff_ms: 500,
            page_cache_secs: 30 * 60,
            user_agent: BROWSER_USER_AGENT.to_string(),
            accept_invalid_certs: false,
        }
    }
}

/// A single upstream request description.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    method: Method,
    url: String,
    headers: Vec<(&'static str, String)>,
    form: Option<Vec<(String, String)>>,
    timeout: Option<Duration>,
    retries: Option<u32>,
    cached: bool,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            form: None,
            timeout: None,
            retries: None,
            cached: false,
        }
    }

    pub fn post_form<K, V>(url: impl Into<String>, form: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            method: Method::POST,
            form: Some(
                form.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            ..Self::get(url)
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Serve the body from the page cache when possible (GET only).
    pub fn cached(mut self) -> Self {
        self.cached = self.method == Method::GET;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn cache_key(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    config: HttpConfig,
    pages: TtlCache<String>,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| SourceError::UpstreamUnavailable(format!("build client: {e}")))?;
        Ok(Self {
            client,
            config,
            pages: TtlCache::new(),
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn purge_expired(&self) -> usize {
        self.pages.purge_expired()
    }

    /// Fetch a body as text, retrying per the configured policy.
    pub async fn text(&self, req: FetchRequest) -> Result<String, SourceError> {
        if req.cached {
            if let Some(body) = self.pages.get(&req.cache_key()) {
                debug!(url = %req.url, "page cache hit");
                return Ok(body);
            }
        }

        let retries = req.retries.unwrap_or(self.config.retries);
        let backoff = Duration::from_millis(self.config.backoff_ms);
        let mut attempt = 0;
        loop {
            match self.send_once(&req).await {
                Ok(body) => {
                    if req.cached {
                        self.pages.set(
                            req.cache_key(),
                            body.clone(),
                            Duration::from_secs(self.config.page_cache_secs),
                        );
                    }
                    return Ok(body);
                }
                Err(err) if err.is_retryable() && attempt < retries => {
                    attempt += 1;
                    debug!(url = %req.url, attempt, error = %err, "retrying upstream request");
                    tokio::time::sleep(backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Single GET without retries. Returns the URL the upstream finally served
    /// after redirects.
    pub async fn probe(&self, url: &str, timeout: Duration) -> Result<String, SourceError> {
        debug!(url = %url, "probing upstream");
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| SourceError::UpstreamUnavailable(format!("{url}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.url().to_string())
    }

    pub async fn json<T: DeserializeOwned>(&self, req: FetchRequest) -> Result<T, SourceError> {
        let url = req.url.clone();
        let body = self.text(req).await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Decode(format!("{url}: {e}")))
    }

    async fn send_once(&self, req: &FetchRequest) -> Result<String, SourceError> {
        debug!(method = %req.method, url = %req.url, "upstream request");

        let timeout = req
            .timeout
            .unwrap_or(Duration::from_secs(self.config.timeout_secs));
        let mut builder = self
            .client
            .request(req.method.clone(), &req.url)
            .timeout(timeout);
        for (name, value) in &req.headers {
            builder = builder.header(*name, value);
        }
        if let Some(form) = &req.form {
            builder = builder.form(form);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| SourceError::UpstreamUnavailable(format!("{}: {e}", req.url)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: req.url.clone(),
            });
        }

        resp.text()
            .await
            .map_err(|e| SourceError::UpstreamUnavailable(format!("{}: {e}", req.url)))
    }
}
