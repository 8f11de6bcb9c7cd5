/// Configures the per-attempt deadline and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RefreshOptions {
    /// Per-attempt deadline in milliseconds, covering send and body read.
    pub timeout_ms: u64,
    /// Delay before retrying after a transport error or timeout.
    pub retry_delay_ms: u64,
    /// Maximum number of attempts per refresh; `None` retries forever.
    pub max_attempts: Option<usize>,
    /// Whether a 4xx response is retried like any other non-success status.
    pub retry_on_client_error: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retry_delay_ms: 1_000,
            max_attempts: None,
            retry_on_client_error: true,
        }
    }
}
