/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum KeepAliveError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// The per-attempt deadline expired before the response body was read.
    #[error("request timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },
    /// Non-success HTTP status code with the (truncated) response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// The session cookie could not be resolved from its source.
    #[error("credential error: {0}")]
    Credential(String),
    /// Invalid configuration, only raised while loading settings.
    #[error("config error: {0}")]
    Config(String),
}

impl KeepAliveError {
    /// Returns the HTTP status for [`KeepAliveError::Http`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for 4xx responses, which usually mean the cookie is stale.
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|status| (400..500).contains(&status))
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(err) => err.is_timeout(),
            _ => false,
        }
    }
}
