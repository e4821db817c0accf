// ── Site server connection context ──
//
// `SiteServer` replaces ambient connection state: it owns the HTTP client
// and the site code, and every workflow is a method on it. Independent
// instances can coexist in one process.

use cmas_api::{AdminClient, Method};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::error::CoreError;

/// A validated connection to one Configuration Manager site server.
#[derive(Debug, Clone)]
pub struct SiteServer {
    client: AdminClient,
    server: String,
    site_code: String,
}

impl SiteServer {
    /// Build the transport and validate it with one `SMS_Site` query.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, CoreError> {
        Self::connect_with_cancellation(config, CancellationToken::new()).await
    }

    /// Like [`connect`](Self::connect), with every request racing `cancel`.
    pub async fn connect_with_cancellation(
        config: ConnectionConfig,
        cancel: CancellationToken,
    ) -> Result<Self, CoreError> {
        debug!(
            server = %config.server,
            auth = %config.credentials.describe(),
            timeout_secs = config.timeout.as_secs(),
            "connecting to site server"
        );

        let client =
            AdminClient::new(&config.server, &config.transport())?.with_cancellation(cancel);

        let sites = client.list_sites().await.map_err(|e| match CoreError::from(e) {
            CoreError::Api { message, .. } => CoreError::ConnectionFailed {
                server: config.server.clone(),
                reason: message,
            },
            CoreError::ConnectionFailed { reason, .. } => CoreError::ConnectionFailed {
                server: config.server.clone(),
                reason,
            },
            other => other,
        })?;

        let site_code = match config.site_code {
            Some(code) => code,
            None => sites
                .into_iter()
                .next()
                .map(|site| site.site_code)
                .ok_or_else(|| CoreError::ConnectionFailed {
                    server: config.server.clone(),
                    reason: "Admin Service returned no sites".into(),
                })?,
        };

        info!(server = %config.server, site_code = %site_code, "connected");
        Ok(Self {
            client,
            server: config.server,
            site_code,
        })
    }

    /// Wrap an already-built client without a validation round trip.
    pub fn from_client(client: AdminClient, site_code: impl Into<String>) -> Self {
        let server = client
            .base_url()
            .host_str()
            .unwrap_or_default()
            .to_owned();
        Self {
            client,
            server,
            site_code: site_code.into(),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn site_code(&self) -> &str {
        &self.site_code
    }

    pub fn client(&self) -> &AdminClient {
        &self.client
    }

    /// Untyped request against any Admin Service path.
    ///
    /// `filter` is sent verbatim as `$filter`. Used by `cmas api`.
    pub async fn raw_request(
        &self,
        method: &str,
        path: &str,
        filter: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Value, CoreError> {
        let verb = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| CoreError::validation(format!("'{method}' is not an HTTP method")))?;
        let query: Vec<(&str, String)> = filter
            .map(|f| ("$filter", f.to_owned()))
            .into_iter()
            .collect();
        Ok(self.client().invoke(verb, path, &query, body).await?)
    }
}
