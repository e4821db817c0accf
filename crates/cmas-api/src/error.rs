use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Top-level error type for the `cmas-api` crate.
///
/// Covers transport, Admin Service responses, and the local checks made
/// while building script invocations. `cmas-core` maps these into
/// user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Credentials rejected (HTTP 401/403).
    #[error("Authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Site server address could not be turned into an Admin Service URL.
    #[error("Invalid site server address: {0}")]
    InvalidServer(String),

    /// Credentials that cannot be encoded as an `Authorization` header.
    #[error("Credentials cannot be sent as an HTTP header: {0}")]
    InvalidCredentials(String),

    /// TLS handshake, certificate, or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Request abandoned because the cancellation token fired.
    #[error("Request cancelled")]
    Cancelled,

    // ── Admin Service ───────────────────────────────────────────────
    /// HTTP 404, or a keyed entity fetch that returned no rows.
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// The object being created already exists.
    #[error("Conflict (HTTP {status}): {message}")]
    Conflict { status: u16, message: String },

    /// Structured error from the Admin Service.
    #[error("Admin Service error (HTTP {status}): {message}")]
    AdminService {
        status: u16,
        code: Option<String>,
        message: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Name pattern could not be compiled.
    #[error("Invalid name pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // ── Script invocation ───────────────────────────────────────────
    /// The script's embedded parameter schema is not decodable.
    #[error("Invalid script parameter schema: {0}")]
    ParameterSchema(String),

    /// A required, visible parameter was not supplied.
    #[error("Missing required script parameter '{name}'")]
    MissingScriptParameter { name: String },

    /// A supplied parameter is not declared by the script.
    #[error("Script does not declare a parameter named '{name}'")]
    UnknownScriptParameter { name: String },
}

/// Admin Service error envelope: `{ "error": { "code": ..., "message": ... } }`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ServiceError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ServiceError {
    /// WMI surfaces duplicate objects as `WBEM_E_ALREADY_EXISTS` (0x80041019)
    /// wrapped in a generic 500, so the code and message are both checked.
    fn indicates_duplicate(&self) -> bool {
        let code = self.code.as_deref().unwrap_or_default().to_ascii_lowercase();
        let message = self
            .message
            .as_deref()
            .unwrap_or_default()
            .to_ascii_lowercase();
        code.contains("alreadyexists")
            || code.contains("80041019")
            || message.contains("already exists")
            || message.contains("duplicate")
    }
}

impl Error {
    /// Classify a non-success response from its status and body.
    pub(crate) fn from_response(status: StatusCode, path: &str, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .map(|envelope| envelope.error);

        let message = parsed
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    status.canonical_reason().unwrap_or("unknown error").to_owned()
                } else {
                    trimmed.chars().take(512).collect()
                }
            });

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Authentication {
                status: status.as_u16(),
                message,
            },
            StatusCode::NOT_FOUND => Self::NotFound {
                path: path.to_owned(),
            },
            StatusCode::CONFLICT => Self::Conflict {
                status: status.as_u16(),
                message,
            },
            _ if parsed.as_ref().is_some_and(ServiceError::indicates_duplicate) => {
                Self::Conflict {
                    status: status.as_u16(),
                    message,
                }
            }
            _ => Self::AdminService {
                status: status.as_u16(),
                code: parsed.and_then(|e| e.code),
                message,
            },
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Transport(e) => e.status() == Some(StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Returns `true` if the service reported an already-existing object.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// The HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. }
            | Self::Conflict { status, .. }
            | Self::AdminService { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
