// ── Core error types ──
//
// User-facing errors from cmas-core. Consumers never see raw HTTP bodies
// or JSON decode failures; the `From<cmas_api::Error>` impl translates
// transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to site server {server}: {reason}")]
    ConnectionFailed { server: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request to the site server timed out")]
    Timeout,

    #[error("Operation cancelled")]
    Cancelled,

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("No {entity_type} found matching '{identifier}'")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    #[error("{identifier} matches {count} {entity_type}s; use an ID or a more specific name")]
    Ambiguous {
        entity_type: &'static str,
        identifier: String,
        count: usize,
    },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Already exists: {message}")]
    Conflict { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Script '{name}' is not approved (approval state {state})")]
    ScriptNotApproved { name: String, state: u32 },

    /// The service did not return a lazy property even on a keyed fetch.
    #[error("Script '{script}' was returned without its {property} property")]
    LazyPropertyMissing {
        script: String,
        property: &'static str,
    },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Admin Service error: {message}")]
    Api {
        message: String,
        code: Option<String>,
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn not_found(entity_type: &'static str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            identifier: identifier.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<cmas_api::Error> for CoreError {
    fn from(err: cmas_api::Error) -> Self {
        match err {
            cmas_api::Error::Authentication { status, message } => CoreError::AuthenticationFailed {
                message: format!("{message} (HTTP {status})"),
            },
            cmas_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        server: e
                            .url()
                            .and_then(|u| u.host_str().map(str::to_owned))
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            cmas_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            cmas_api::Error::InvalidServer(server) => CoreError::Config {
                message: format!("Invalid site server address: {server}"),
            },
            cmas_api::Error::InvalidCredentials(reason) => CoreError::Config {
                message: format!("Credentials cannot be sent as an HTTP header: {reason}"),
            },
            cmas_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                server: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            cmas_api::Error::Cancelled => CoreError::Cancelled,
            cmas_api::Error::NotFound { path } => CoreError::NotFound {
                entity_type: "resource",
                identifier: path,
            },
            cmas_api::Error::Conflict { message, .. } => CoreError::Conflict { message },
            cmas_api::Error::AdminService {
                status,
                code,
                message,
            } => CoreError::Api {
                message,
                code,
                status: Some(status),
            },
            cmas_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            e @ (cmas_api::Error::InvalidPattern { .. }
            | cmas_api::Error::ParameterSchema(_)
            | cmas_api::Error::MissingScriptParameter { .. }
            | cmas_api::Error::UnknownScriptParameter { .. }) => CoreError::ValidationFailed {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_conflict_becomes_core_conflict() {
        let err: CoreError = cmas_api::Error::Conflict {
            status: 500,
            message: "The object already exists.".into(),
        }
        .into();
        assert!(err.is_conflict());
    }

    #[test]
    fn missing_parameter_is_validation_failure() {
        let err: CoreError = cmas_api::Error::MissingScriptParameter {
            name: "ComputerName".into(),
        }
        .into();
        match err {
            CoreError::ValidationFailed { message } => assert!(message.contains("ComputerName")),
            other => panic!("expected ValidationFailed, got {other:?}"),
        }
    }

    #[test]
    fn unencodable_credentials_are_a_config_error() {
        let err: CoreError =
            cmas_api::Error::InvalidCredentials("invalid HTTP header value".into()).into();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn ambiguous_message_names_the_count() {
        let err = CoreError::Ambiguous {
            entity_type: "collection",
            identifier: "Pilot".into(),
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "Pilot matches 2 collections; use an ID or a more specific name"
        );
    }
}
