//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

use crate::error::LlmError;

/// Default connect timeout for every outbound call.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default end-to-end request timeout for completion calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an HTTP client with the standard medrag configuration.
///
/// Config: 10s connect timeout, `timeout` request timeout, rustls TLS,
/// `medrag/{version}` user-agent, redirect limit 10.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .user_agent(concat!("medrag/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(LlmError::Http)
}

/// Client with the default 30s request timeout.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn default_client() -> Result<reqwest::Client, LlmError> {
    build_client(REQUEST_TIMEOUT)
}
