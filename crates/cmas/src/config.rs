//! CLI configuration: thin wrapper around `cmas_config`.
//!
//! Adds the resolution that respects `GlobalOpts` flag overrides
//! (--server, --username, --token, ...) on top of the active profile.

use std::time::Duration;

use clap::ArgMatches;
use clap::ValueEnum;
use clap::parser::ValueSource;
use secrecy::SecretString;

use cmas_core::{ConnectionConfig, Credentials, TlsMode};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

pub use cmas_config::{
    Config, Profile, SecretKind, config_path, load_config_from, load_config_or_default,
    save_config, store_secret,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Fill `--output` / `--color` from the config file when the user left
/// them at their built-in defaults.
pub fn apply_defaults(global: &mut GlobalOpts, matches: &ArgMatches, config: &Config) {
    let untouched = |id: &str| matches!(matches.value_source(id), Some(ValueSource::DefaultValue));

    if untouched("output") {
        if let Ok(format) = OutputFormat::from_str(&config.defaults.output, true) {
            global.output = format;
        }
    }
    if untouched("color") {
        if let Ok(mode) = ColorMode::from_str(&config.defaults.color, true) {
            global.color = mode;
        }
    }
}

/// Build a `ConnectionConfig` from the config file, profile, and CLI flags.
///
/// Flags win over the profile. Without a profile, `--server` is required
/// and credentials come from flags alone (integrated when none are given).
/// A profile used without any connection flag resolves exactly as
/// `cmas_config::profile_to_connection_config` does.
pub fn resolve_connection(
    global: &GlobalOpts,
    config: &Config,
) -> Result<ConnectionConfig, CliError> {
    let profile_name = active_profile_name(global, config);
    let profile = config.profiles.get(&profile_name);

    if profile.is_none() && global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(config),
        });
    }

    if let Some(profile) = profile.filter(|_| !has_connection_flags(global)) {
        return Ok(cmas_config::profile_to_connection_config(
            profile,
            &profile_name,
            &config.defaults,
        )?);
    }

    let server = global
        .server
        .clone()
        .or_else(|| profile.map(|p| p.server.clone()))
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;

    let credentials = match (flag_credentials(global)?, profile) {
        (Some(credentials), _) => credentials,
        (None, Some(profile)) => cmas_config::resolve_credentials(profile, &profile_name)?,
        (None, None) => Credentials::Integrated,
    };

    let insecure = global.insecure || config.defaults.insecure;
    let tls = match profile {
        Some(profile) => cmas_config::profile_tls(profile, insecure),
        None if insecure => TlsMode::DangerAcceptInvalid,
        None => TlsMode::System,
    };

    let timeout = global
        .timeout
        .or_else(|| profile.and_then(|p| p.timeout))
        .unwrap_or(config.defaults.timeout);

    Ok(ConnectionConfig {
        server,
        credentials,
        tls,
        timeout: Duration::from_secs(timeout),
        site_code: global
            .site_code
            .clone()
            .or_else(|| profile.and_then(|p| p.site_code.clone())),
    })
}

fn has_connection_flags(global: &GlobalOpts) -> bool {
    global.server.is_some()
        || global.token.is_some()
        || global.username.is_some()
        || global.site_code.is_some()
        || global.timeout.is_some()
        || global.insecure
}

/// Credentials given directly on the command line or via `CMAS_*` env vars.
fn flag_credentials(global: &GlobalOpts) -> Result<Option<Credentials>, CliError> {
    if let Some(token) = &global.token {
        return Ok(Some(Credentials::Bearer {
            token: SecretString::from(token.clone()),
        }));
    }
    let Some(username) = &global.username else {
        return Ok(None);
    };

    let password = match &global.password {
        Some(password) => password.clone(),
        None => rpassword::prompt_password(format!("Password for {username}: "))?,
    };
    Ok(Some(Credentials::Basic {
        username: username.clone(),
        password: SecretString::from(password),
    }))
}

pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["cmas"];
        argv.extend_from_slice(args);
        argv.push("connect");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with(name: &str, profile: Profile) -> Config {
        let mut config = Config::default();
        config.profiles.insert(name.into(), profile);
        config.default_profile = Some(name.into());
        config
    }

    fn lab() -> Profile {
        Profile {
            server: "cm01.lab.local".into(),
            auth_mode: "integrated".into(),
            site_code: Some("LAB".into()),
            timeout: Some(90),
            ..Profile::default()
        }
    }

    #[test]
    fn flags_override_profile() {
        let config = config_with("lab", lab());
        let resolved = resolve_connection(
            &global(&["--server", "cm02.lab.local", "--site-code", "PS2", "--timeout", "5"]),
            &config,
        )
        .unwrap();
        assert_eq!(resolved.server, "cm02.lab.local");
        assert_eq!(resolved.site_code.as_deref(), Some("PS2"));
        assert_eq!(resolved.timeout, Duration::from_secs(5));
    }

    #[test]
    fn profile_values_apply_without_flags() {
        let config = config_with("lab", lab());
        let resolved = resolve_connection(&global(&[]), &config).unwrap();
        assert_eq!(resolved.server, "cm01.lab.local");
        assert_eq!(resolved.site_code.as_deref(), Some("LAB"));
        assert_eq!(resolved.timeout, Duration::from_secs(90));
        assert!(matches!(resolved.credentials, Credentials::Integrated));
    }

    #[test]
    fn profile_without_server_is_a_validation_error() {
        let mut profile = lab();
        profile.server = String::new();
        let config = config_with("lab", profile);
        assert!(matches!(
            resolve_connection(&global(&[]), &config),
            Err(CliError::Validation { .. })
        ));
        let resolved = resolve_connection(&global(&["--server", "cm02"]), &config).unwrap();
        assert_eq!(resolved.server, "cm02");
    }

    #[test]
    fn config_defaults_reach_profile_only_connections() {
        let mut config = config_with("lab", lab());
        config.defaults.insecure = true;
        let resolved = resolve_connection(&global(&[]), &config).unwrap();
        assert!(matches!(resolved.tls, TlsMode::DangerAcceptInvalid));
    }

    #[test]
    fn token_flag_means_bearer() {
        let config = config_with("lab", lab());
        let resolved = resolve_connection(&global(&["--token", "abc"]), &config).unwrap();
        assert!(matches!(resolved.credentials, Credentials::Bearer { .. }));
    }

    #[test]
    fn server_flag_alone_is_enough() {
        let resolved = resolve_connection(
            &global(&["--server", "cm01", "--insecure"]),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(resolved.server, "cm01");
        assert!(matches!(resolved.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(resolved.timeout, Duration::from_secs(30));
    }

    #[test]
    fn nothing_configured_is_no_config() {
        assert!(matches!(
            resolve_connection(&global(&[]), &Config::default()),
            Err(CliError::NoConfig { .. })
        ));
    }

    #[test]
    fn unknown_named_profile() {
        let config = config_with("lab", lab());
        match resolve_connection(&global(&["--profile", "prod"]), &config) {
            Err(CliError::ProfileNotFound { name, available }) => {
                assert_eq!(name, "prod");
                assert_eq!(available, "lab");
            }
            other => panic!("expected ProfileNotFound, got {other:?}"),
        }
    }
}
