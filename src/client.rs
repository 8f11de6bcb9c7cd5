use std::fmt;

use async_trait::async_trait;

use crate::{KeepAliveError, RefreshRequest, RefreshResponse, Result};

/// Sends one resolved request and reads the whole response.
///
/// The refresh loop owns deadlines and retries; implementations only perform
/// a single exchange. Dropping the returned future must cancel the request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RefreshRequest) -> Result<RefreshResponse>;
}

#[derive(Clone, Default)]
/// `reqwest`-backed transport. Follows redirects with reqwest's default policy.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured client, e.g. one with a proxy or custom TLS roots.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RefreshRequest) -> Result<RefreshResponse> {
        let mut builder = self.http.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(KeepAliveError::Transport)?;

        let status = response.status();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await.map_err(KeepAliveError::Transport)?;

        Ok(RefreshResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_owned),
            url,
            headers,
            body,
        })
    }
}
