//! Where the session cookie comes from.
//!
//! The cookie expires and has to be copied out of a live browser session by
//! an operator. It is resolved again before every attempt so a rotated value
//! is picked up without restarting the process.

use std::fmt;
use std::path::PathBuf;

use crate::{KeepAliveError, Result};

pub const DEFAULT_COOKIE: &str = "cloudstudio-editor-session=";

#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Fixed `Cookie` header value.
    Inline(String),
    /// Name of an environment variable holding the cookie.
    Env(String),
    /// File whose trimmed contents are the cookie.
    File(PathBuf),
}

impl CredentialSource {
    pub fn resolve(&self) -> Result<String> {
        match self {
            Self::Inline(value) => Ok(value.clone()),
            Self::Env(name) => {
                let value = std::env::var(name).map_err(|_| {
                    KeepAliveError::Credential(format!("environment variable {name} is not set"))
                })?;
                non_empty(value.trim(), || format!("environment variable {name} is empty"))
            }
            Self::File(path) => {
                let content = std::fs::read_to_string(path).map_err(|err| {
                    KeepAliveError::Credential(format!(
                        "cannot read cookie file {}: {err}",
                        path.display()
                    ))
                })?;
                non_empty(content.trim(), || {
                    format!("cookie file {} is empty", path.display())
                })
            }
        }
    }
}

fn non_empty(value: &str, message: impl FnOnce() -> String) -> Result<String> {
    if value.is_empty() {
        Err(KeepAliveError::Credential(message()))
    } else {
        Ok(value.to_owned())
    }
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self::Inline(DEFAULT_COOKIE.to_owned())
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.debug_tuple("Inline").field(&"<redacted>").finish(),
            Self::Env(name) => f.debug_tuple("Env").field(name).finish(),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}
