//! HTTP implementation of `RemoteService` (reqwest).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteError;
use crate::request::{HttpMethod, RemoteRequest};
use crate::service::RemoteService;

/// Talks to the commerce API over HTTP.
///
/// One attempt per call; a failed send surfaces as `RemoteError` and the
/// caller decides whether to queue it.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut remote = Self::new(base_url);
        remote.token = Some(token.into());
        remote
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn send(&self, request: RemoteRequest) -> Result<Value, RemoteError> {
        let url = self.url(&request.endpoint);
        let mut req = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Put => self.client.put(&url),
            HttpMethod::Patch => self.client.patch(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };

        if let Some(body) = &request.body {
            req = req.json(body);
        }
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        if let Some(key) = &request.idempotency_key {
            req = req.header("Idempotency-Key", key);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_connect() {
                RemoteError::Offline
            } else {
                RemoteError::Network(e.to_string())
            }
        })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(
                method = %request.method,
                endpoint = %request.endpoint,
                status = status.as_u16(),
                "remote call rejected"
            );
            return Err(RemoteError::Api(status.as_u16(), text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| RemoteError::Parse(e.to_string()))
    }
}
