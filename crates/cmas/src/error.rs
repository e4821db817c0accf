//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable process exit code.

use miette::Diagnostic;
use thiserror::Error;

use cmas_config::ConfigError;
use cmas_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to site server {server}")]
    #[diagnostic(
        code(cmas::connection_failed),
        help(
            "{reason}\n\
             Check the server name and that the SMS Provider role is reachable over HTTPS.\n\
             Self-signed certificate? Try: cmas connect --insecure"
        )
    )]
    ConnectionFailed { server: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(cmas::auth_failed),
        help(
            "{message}\n\
             Verify the account has an administrative role in Configuration Manager.\n\
             Run: cmas config set-secret --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(cmas::no_credentials),
        help(
            "Configure credentials with: cmas config init\n\
             Or set CMAS_USERNAME/CMAS_PASSWORD or CMAS_TOKEN."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("No {resource_type} found matching '{identifier}'")]
    #[diagnostic(
        code(cmas::not_found),
        help("Run: cmas {list_command} to see what exists")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("'{identifier}' matches {count} {resource_type}s")]
    #[diagnostic(
        code(cmas::ambiguous),
        help("Use the ID instead of the name, or a more specific name.")
    )]
    Ambiguous {
        resource_type: String,
        identifier: String,
        count: usize,
    },

    #[error("Already exists: {message}")]
    #[diagnostic(code(cmas::conflict))]
    Conflict { message: String },

    // ── Scripts ──────────────────────────────────────────────────────
    #[error("Script '{name}' is not approved (approval state {state})")]
    #[diagnostic(
        code(cmas::script_not_approved),
        help("Approve the script in the console under Software Library > Scripts first.")
    )]
    ScriptNotApproved { name: String, state: u32 },

    #[error("Script '{script}' came back without {property}")]
    #[diagnostic(
        code(cmas::lazy_property),
        help(
            "The Admin Service only returns this property on a keyed fetch.\n\
             Check the script in the console; re-approving it regenerates its metadata."
        )
    )]
    LazyProperty { script: String, property: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error(
        "Admin Service error{}{}: {message}",
        .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default(),
        .code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default()
    )]
    #[diagnostic(code(cmas::api_error))]
    ApiError {
        code: Option<String>,
        status: Option<u16>,
        message: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(cmas::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(cmas::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: cmas config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No site server configured")]
    #[diagnostic(
        code(cmas::no_config),
        help(
            "Create a profile with: cmas config init\n\
             Or pass --server / set CMAS_SERVER.\n\
             Config file: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(cmas::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(cmas::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout / cancellation ───────────────────────────────────────
    #[error("Request to the site server timed out")]
    #[diagnostic(
        code(cmas::timeout),
        help("Increase the timeout with --timeout or check site server load.")
    )]
    Timeout,

    #[error("Cancelled")]
    #[diagnostic(code(cmas::cancelled))]
    Cancelled,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(cmas::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    #[diagnostic(code(cmas::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(cmas::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout | Self::Cancelled => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::Ambiguous { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Config(ConfigError::NoCredentials { .. }) => exit_code::AUTH,
            _ => exit_code::GENERAL,
        }
    }

    /// Name the profile in auth failures, which core errors cannot know.
    pub fn with_profile(self, profile: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: profile.into(),
                message,
            },
            other => other,
        }
    }
}

/// The `cmas` command that lists a given entity type.
fn list_command(entity_type: &str) -> String {
    match entity_type {
        "collection" => "collections list".into(),
        "device" => "devices list".into(),
        "script" => "scripts list".into(),
        "membership rule" => "rules list <COLLECTION>".into(),
        "variable" => "device-vars list / collection-vars list".into(),
        _ => "api GET <PATH>".into(),
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { server, reason } => {
                CliError::ConnectionFailed { server, reason }
            }

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "default".into(),
                message,
            },

            CoreError::Timeout => CliError::Timeout,
            CoreError::Cancelled => CliError::Cancelled,

            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                resource_type: entity_type.into(),
                identifier,
                list_command: list_command(entity_type),
            },

            CoreError::Ambiguous {
                entity_type,
                identifier,
                count,
            } => CliError::Ambiguous {
                resource_type: entity_type.into(),
                identifier,
                count,
            },

            CoreError::Conflict { message } => CliError::Conflict { message },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::ScriptNotApproved { name, state } => {
                CliError::ScriptNotApproved { name, state }
            }

            CoreError::LazyPropertyMissing { script, property } => CliError::LazyProperty {
                script,
                property: property.into(),
            },

            CoreError::Api {
                message,
                code,
                status,
            } => CliError::ApiError {
                code,
                status,
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "server".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        let not_found: CliError = CoreError::NotFound {
            entity_type: "collection",
            identifier: "Pilot".into(),
        }
        .into();
        assert_eq!(not_found.exit_code(), exit_code::NOT_FOUND);

        let conflict: CliError = CoreError::Conflict {
            message: "variable 'OSDRole' already exists".into(),
        }
        .into();
        assert_eq!(conflict.exit_code(), exit_code::CONFLICT);

        assert_eq!(CliError::from(CoreError::Cancelled).exit_code(), exit_code::TIMEOUT);
        assert_eq!(
            CliError::from(CoreError::AuthenticationFailed {
                message: "Unauthorized (HTTP 401)".into()
            })
            .exit_code(),
            exit_code::AUTH
        );
        assert_eq!(
            CliError::from(ConfigError::NoCredentials {
                profile: "lab".into()
            })
            .exit_code(),
            exit_code::AUTH
        );
    }

    #[test]
    fn not_found_suggests_list_command() {
        let err: CliError = CoreError::NotFound {
            entity_type: "script",
            identifier: "Get-Uptime".into(),
        }
        .into();
        match err {
            CliError::NotFound { list_command, .. } => assert_eq!(list_command, "scripts list"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
