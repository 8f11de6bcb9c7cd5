//! `session-keepalive` keeps a remote editor session alive by POSTing to it
//! with a browser-like header bundle, once at startup and then on a schedule.
//!
//! - [`RefreshTask::run`] sends the request and retries until it succeeds
//! - [`Scheduler::run_until`] drives the task with a single-flight guard
//! - [`KeepAliveConfig::load`] merges CLI, environment and TOML settings

mod client;
mod credential;
mod error;
mod options;
mod task;
mod types;

pub mod config;
pub mod headers;
pub mod retry;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use client::{HttpTransport, Transport};
pub use config::{KeepAliveConfig, Overrides};
pub use credential::CredentialSource;
pub use error::KeepAliveError;
pub use options::RefreshOptions;
pub use retry::{FixedDelayPolicy, RetryPolicy};
pub use scheduler::{Scheduler, Trigger};
pub use task::RefreshTask;
pub use types::{RefreshOutcome, RefreshRequest, RefreshResponse, UrlCheck};

pub type Result<T> = std::result::Result<T, KeepAliveError>;
