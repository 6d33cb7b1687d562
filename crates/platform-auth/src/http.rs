//! Outbound HTTP client construction
//!
//! Every network call of a profile goes through a client built here so the
//! profile's TLS-no-verify choice and the request deadline apply uniformly.

use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

/// Build the HTTP client for one platform.
///
/// With `tls_no_verify` set, certificate and hostname verification are
/// disabled. Only meant for development platforms with self-signed certs.
pub fn build_client(tls_no_verify: bool, timeout: Duration) -> Result<reqwest::Client> {
    if tls_no_verify {
        warn!("TLS certificate verification disabled for this platform");
    }
    reqwest::Client::builder()
        .danger_accept_invalid_certs(tls_no_verify)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Http(format!("building HTTP client: {e}")))
}

/// Map a transport-level failure. Connection and timeout failures mean the
/// platform (or its identity provider) could not be reached at all.
pub(crate) fn transport_error(context: &str, e: reqwest::Error) -> Error {
    if e.is_connect() || e.is_timeout() {
        Error::PlatformUnreachable(format!("{context}: {e}"))
    } else {
        Error::Http(format!("{context}: {e}"))
    }
}
