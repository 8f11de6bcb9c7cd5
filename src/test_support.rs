//! Scripted in-memory transport for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{KeepAliveError, RefreshRequest, RefreshResponse, Result, Transport};

pub(crate) enum Step {
    Respond {
        status: u16,
        body: String,
        delay: Duration,
    },
    TransportError,
    /// Never answers; only a deadline ends it.
    Hang,
}

impl Step {
    pub(crate) fn ok(body: &str) -> Self {
        Self::status(200, body)
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self::Respond {
            status,
            body: body.to_owned(),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn slow(delay: Duration) -> Self {
        Self::Respond {
            status: 200,
            body: "ok".to_owned(),
            delay,
        }
    }

    pub(crate) fn transport_error() -> Self {
        Self::TransportError
    }
}

/// Plays back [`Step`]s in order, answering `200 ok` once the script runs out.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    steps: Arc<Mutex<VecDeque<Step>>>,
    requests: Arc<Mutex<Vec<RefreshRequest>>>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    pub(crate) max_in_flight: Arc<AtomicUsize>,
    /// Incremented whenever a `send` future finishes or is dropped.
    pub(crate) released: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<RefreshRequest> {
        self.requests
            .lock()
            .expect("request log mutex must not be poisoned")
            .clone()
    }
}

struct Release {
    in_flight: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl Drop for Release {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn transport_error() -> KeepAliveError {
    let err = reqwest::Client::new()
        .post("not a url")
        .build()
        .expect_err("relative URL must not build");
    KeepAliveError::Transport(err)
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RefreshRequest) -> Result<RefreshResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("request log mutex must not be poisoned")
            .push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _release = Release {
            in_flight: Arc::clone(&self.in_flight),
            released: Arc::clone(&self.released),
        };

        let step = self
            .steps
            .lock()
            .expect("step queue mutex must not be poisoned")
            .pop_front()
            .unwrap_or_else(|| Step::ok("ok"));

        match step {
            Step::Respond {
                status,
                body,
                delay,
            } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(RefreshResponse {
                    status,
                    reason: StatusCode::from_u16(status)
                        .ok()
                        .and_then(|code| code.canonical_reason())
                        .map(str::to_owned),
                    url: request.url.clone(),
                    headers: Vec::new(),
                    body,
                })
            }
            Step::TransportError => Err(transport_error()),
            Step::Hang => std::future::pending().await,
        }
    }
}
