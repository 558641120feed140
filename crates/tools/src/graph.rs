//! HTTP client for the graph storage service.
//!
//! Every tool that touches storage goes through [`GraphClient::send`], which
//! owns header decoration and the mapping of non-2xx answers to
//! [`Error::Remote`].

use std::time::{Duration, Instant};

use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;

use gw_domain::config::GraphConfig;
use gw_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Created once and shared; the underlying `reqwest::Client` keeps a
/// connection pool.
#[derive(Debug, Clone)]
pub struct GraphClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    description_path: String,
}

impl GraphClient {
    pub fn new(cfg: &GraphConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key: cfg.resolve_api_key(),
            description_path: cfg.api_description_path.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── request helpers ──────────────────────────────────────────────

    fn decorate(&self, rb: RequestBuilder, caller: Option<&str>) -> RequestBuilder {
        let mut rb = rb.header("X-Client-Type", "graphweaver");
        if let Some(ref key) = self.api_key {
            rb = rb.bearer_auth(key);
        }
        if let Some(caller) = caller {
            rb = rb.header("X-Caller-Id", caller);
        }
        rb
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Issue one request and decode the JSON answer.
    ///
    /// An empty 2xx body decodes to `null`; a non-JSON 2xx body is returned
    /// as a string.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        caller: Option<&str>,
    ) -> Result<Value> {
        let url = self.url(path);
        let mut rb = self.http.request(method.clone(), &url);
        if !query.is_empty() {
            rb = rb.query(query);
        }
        if let Some(body) = body {
            rb = rb.json(body);
        }

        let start = Instant::now();
        let resp = self.decorate(rb, caller).send().await.map_err(from_reqwest)?;
        tracing::debug!(
            method = %method,
            path = %path,
            status = resp.status().as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "graph storage call"
        );

        decode(resp).await
    }

    pub async fn get(&self, path: &str, caller: Option<&str>) -> Result<Value> {
        self.send(Method::GET, path, &[], None, caller).await
    }

    pub async fn put(&self, path: &str, body: &Value, caller: Option<&str>) -> Result<Value> {
        self.send(Method::PUT, path, &[], Some(body), caller).await
    }

    /// Fetch the machine-readable API description.
    pub async fn fetch_description(&self) -> Result<Value> {
        self.get(&self.description_path, None).await
    }
}

async fn decode(resp: Response) -> Result<Value> {
    let status = resp.status();
    let text = resp.text().await.map_err(from_reqwest)?;

    if !status.is_success() {
        return Err(Error::Remote {
            status: status.as_u16(),
            message: remote_message(&text).unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
        });
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// Pull a human-readable message out of an error body.
fn remote_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    let pick = |v: &Value| v.as_str().map(str::to_owned).filter(|s| !s.is_empty());
    pick(&v["error"])
        .or_else(|| pick(&v["error"]["message"]))
        .or_else(|| pick(&v["message"]))
        .or_else(|| pick(&v["detail"]))
}

pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
