// Shared transport configuration for building reqwest::Client instances.
//
// TLS policy, timeout, and the Authorization default header all live here
// so the Admin Service client only deals with URLs and response shapes.

use std::path::PathBuf;
use std::time::Duration;

use base64::Engine as _;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

const USER_AGENT: &str = concat!("cmas/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (site servers with self-signed certs).
    DangerAcceptInvalid,
}

/// How requests authenticate against the site server.
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    /// No Authorization header. Relies on whatever fronts the Admin Service
    /// (reverse proxy, gateway) to authenticate the caller.
    #[default]
    Integrated,
    /// HTTP Basic with an explicit account.
    Basic {
        username: String,
        password: SecretString,
    },
    /// Bearer token (Admin Service published through a cloud management gateway).
    Bearer { token: SecretString },
}

impl Credentials {
    /// Build the sensitive `Authorization` header value, if any.
    pub fn authorization_header(&self) -> Result<Option<HeaderValue>, Error> {
        let raw = match self {
            Self::Integrated => return Ok(None),
            Self::Basic { username, password } => {
                let pair = format!("{username}:{}", password.expose_secret());
                format!(
                    "Basic {}",
                    base64::engine::general_purpose::STANDARD.encode(pair)
                )
            }
            Self::Bearer { token } => format!("Bearer {}", token.expose_secret()),
        };

        let mut value =
            HeaderValue::from_str(&raw).map_err(|e| Error::InvalidCredentials(e.to_string()))?;
        value.set_sensitive(true);
        Ok(Some(value))
    }

    /// Short label for logs and status output. Never includes secret material.
    pub fn describe(&self) -> String {
        match self {
            Self::Integrated => "integrated".into(),
            Self::Basic { username, .. } => format!("basic ({username})"),
            Self::Bearer { .. } => "bearer token".into(),
        }
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    pub credentials: Credentials,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            credentials: Credentials::Integrated,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// The `Authorization` header, when the credentials produce one, is
    /// injected as a default header on every request.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        if let Some(value) = self.credentials.authorization_header()? {
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}
