// ── Runtime connection configuration ──
//
// Describes *how* to reach a site server. Carries credential data and
// transport tuning but never touches disk; the CLI builds one from its
// profile and flags and hands it to `SiteServer::connect`.

use std::time::Duration;

use cmas_api::{Credentials, TlsMode, TransportConfig};

/// Configuration for connecting to one site server.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Host name, `host:port`, or full Admin Service URL.
    pub server: String,
    pub credentials: Credentials,
    pub tls: TlsMode,
    pub timeout: Duration,
    /// Overrides the site code reported by `SMS_Site`.
    pub site_code: Option<String>,
}

impl ConnectionConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            credentials: Credentials::default(),
            tls: TlsMode::default(),
            timeout: Duration::from_secs(30),
            site_code: None,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
            credentials: self.credentials.clone(),
        }
    }
}
