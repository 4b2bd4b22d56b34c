//! Credential resolution
//!
//! Authentication and session setup are out of scope for this plugin; the
//! only identity carried on the wire is an optional bearer token, resolved
//! from the connection config or the `AWS_BEARER_TOKEN` environment
//! variable. Signature V4 signing is intentionally not implemented.

use crate::config::ConnectionConfig;

/// Bearer token holder
#[derive(Clone, Default)]
pub struct Credentials {
    token: Option<String>,
}

impl Credentials {
    /// Resolve credentials (config > environment)
    pub fn resolve(config: &ConnectionConfig) -> Self {
        Self {
            token: config.effective_token(),
        }
    }

    /// The bearer token, if one is configured
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

// Security: never print the token itself
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
