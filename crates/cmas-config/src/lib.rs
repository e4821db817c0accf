//! Shared configuration for the cmas CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `cmas_core::ConnectionConfig`. The CLI layers its
//! global flags on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cmas_core::{ConnectionConfig, Credentials, TlsMode};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keyring service name; entries are `<profile>/password` and `<profile>/token`.
pub const KEYRING_SERVICE: &str = "cmas";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named site server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named site server profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Site server host name or Admin Service URL.
    pub server: String,

    /// Site code override (otherwise taken from `SMS_Site`).
    pub site_code: Option<String>,

    /// Auth mode: "integrated", "basic", or "bearer".
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,

    /// Account for basic auth (`DOMAIN\user` or UPN).
    pub username: Option<String>,

    /// Password for basic auth (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Bearer token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the bearer token.
    pub token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

fn default_auth_mode() -> String {
    "integrated".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "cmas", "cmas").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("cmas");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, layered over defaults and under `CMAS_` env.
///
/// Nested keys use a double underscore: `CMAS_DEFAULTS__OUTPUT=json`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CMAS_").split("__").only(&[
            "default_profile",
            "defaults.output",
            "defaults.color",
            "defaults.insecure",
            "defaults.timeout",
        ]));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Which secret a keyring entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Password,
    Token,
}

impl SecretKind {
    fn entry_name(self, profile_name: &str) -> String {
        match self {
            Self::Password => format!("{profile_name}/password"),
            Self::Token => format!("{profile_name}/token"),
        }
    }
}

/// Store a secret in the system keyring for later resolution.
pub fn store_secret(profile_name: &str, kind: SecretKind, secret: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &kind.entry_name(profile_name))?;
    entry.set_password(secret)?;
    Ok(())
}

fn keyring_secret(profile_name: &str, kind: SecretKind) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &kind.entry_name(profile_name))
        .ok()
        .and_then(|entry| entry.get_password().ok())
}

/// First available secret: named env var, then keyring, then plaintext.
fn first_secret(
    from_env: Option<String>,
    from_keyring: impl FnOnce() -> Option<String>,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    from_env
        .or_else(from_keyring)
        .or_else(|| plaintext.map(str::to_owned))
        .map(SecretString::from)
}

fn resolve_secret(
    profile_name: &str,
    kind: SecretKind,
    env_name: Option<&str>,
    plaintext: Option<&str>,
) -> Result<SecretString, ConfigError> {
    first_secret(
        env_name.and_then(|name| std::env::var(name).ok()),
        || keyring_secret(profile_name, kind),
        plaintext,
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve `Credentials` from a profile's `auth_mode` field.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Credentials, ConfigError> {
    match profile.auth_mode.as_str() {
        "integrated" => Ok(Credentials::Integrated),
        "basic" => {
            let username = profile
                .username
                .clone()
                .filter(|u| !u.is_empty())
                .ok_or_else(|| ConfigError::NoCredentials {
                    profile: profile_name.into(),
                })?;
            let password = resolve_secret(
                profile_name,
                SecretKind::Password,
                profile.password_env.as_deref(),
                profile.password.as_deref(),
            )?;
            Ok(Credentials::Basic { username, password })
        }
        "bearer" => {
            let token = resolve_secret(
                profile_name,
                SecretKind::Token,
                profile.token_env.as_deref(),
                profile.token.as_deref(),
            )?;
            Ok(Credentials::Bearer { token })
        }
        other => Err(ConfigError::Validation {
            field: "auth_mode".into(),
            reason: format!("expected 'integrated', 'basic', or 'bearer', got '{other}'"),
        }),
    }
}

/// TLS policy for a profile: insecure wins over a custom CA.
pub fn profile_tls(profile: &Profile, default_insecure: bool) -> TlsMode {
    if profile.insecure.unwrap_or(default_insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    }
}

/// Build a `ConnectionConfig` from a profile, with no CLI flag overrides.
///
/// `defaults` fills the TLS and timeout settings the profile leaves unset.
pub fn profile_to_connection_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ConnectionConfig, ConfigError> {
    if profile.server.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "server".into(),
            reason: format!("profile '{profile_name}' has no server"),
        });
    }

    Ok(ConnectionConfig {
        server: profile.server.clone(),
        credentials: resolve_credentials(profile, profile_name)?,
        tls: profile_tls(profile, defaults.insecure),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        site_code: profile.site_code.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn profile(server: &str) -> Profile {
        Profile {
            server: server.into(),
            auth_mode: default_auth_mode(),
            ..Profile::default()
        }
    }

    #[test]
    fn round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        let mut lab = profile("cm01.lab.local");
        lab.site_code = Some("LAB".into());
        lab.insecure = Some(true);
        cfg.profiles.insert("lab".into(), lab);
        cfg.default_profile = Some("lab".into());
        save_config_to(&path, &cfg).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.default_profile.as_deref(), Some("lab"));
        let lab = &loaded.profiles["lab"];
        assert_eq!(lab.server, "cm01.lab.local");
        assert_eq!(lab.site_code.as_deref(), Some("LAB"));
        assert_eq!(lab.auth_mode, "integrated");
        assert_eq!(loaded.defaults.output, "table");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(loaded.profiles.is_empty());
        assert_eq!(loaded.defaults.timeout, 30);
    }

    #[test]
    fn secret_chain_order() {
        let pick = |env: Option<&str>, ring: Option<&str>, plain: Option<&str>| {
            first_secret(env.map(str::to_owned), || ring.map(str::to_owned), plain)
                .map(|s| s.expose_secret().to_owned())
        };
        assert_eq!(pick(Some("env"), Some("ring"), Some("plain")).as_deref(), Some("env"));
        assert_eq!(pick(None, Some("ring"), Some("plain")).as_deref(), Some("ring"));
        assert_eq!(pick(None, None, Some("plain")).as_deref(), Some("plain"));
        assert_eq!(pick(None, None, None), None);
    }

    #[test]
    fn integrated_needs_no_secret() {
        let cfg =
            profile_to_connection_config(&profile("cm01"), "default", &Defaults::default())
                .unwrap();
        assert!(matches!(cfg.credentials, Credentials::Integrated));
        assert!(matches!(cfg.tls, TlsMode::System));
        assert_eq!(cfg.timeout, Duration::from_secs(30));
    }

    #[test]
    fn basic_without_username_fails() {
        let mut p = profile("cm01");
        p.auth_mode = "basic".into();
        assert!(matches!(
            resolve_credentials(&p, "default"),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn unknown_auth_mode_is_rejected() {
        let mut p = profile("cm01");
        p.auth_mode = "kerberos".into();
        assert!(matches!(
            resolve_credentials(&p, "default"),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn empty_server_is_rejected() {
        assert!(matches!(
            profile_to_connection_config(&profile(" "), "default", &Defaults::default()),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn defaults_fill_unset_profile_fields() {
        let defaults = Defaults {
            insecure: true,
            timeout: 120,
            ..Defaults::default()
        };
        let cfg = profile_to_connection_config(&profile("cm01"), "default", &defaults).unwrap();
        assert!(matches!(cfg.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(cfg.timeout, Duration::from_secs(120));

        let mut pinned = profile("cm01");
        pinned.insecure = Some(false);
        pinned.timeout = Some(10);
        let cfg = profile_to_connection_config(&pinned, "default", &defaults).unwrap();
        assert!(matches!(cfg.tls, TlsMode::System));
        assert_eq!(cfg.timeout, Duration::from_secs(10));
    }

    #[test]
    fn insecure_beats_custom_ca() {
        let mut p = profile("cm01");
        p.ca_cert = Some("/etc/pki/corp.pem".into());
        assert!(matches!(profile_tls(&p, false), TlsMode::CustomCa(_)));
        p.insecure = Some(true);
        assert!(matches!(profile_tls(&p, false), TlsMode::DangerAcceptInvalid));
    }
}
