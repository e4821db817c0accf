//! Config subcommand handlers.

use std::path::Path;

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile, SecretKind};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "server = \"{}\"", p.server);
        if let Some(ref code) = p.site_code {
            let _ = writeln!(out, "site_code = \"{code}\"");
        }
        let _ = writeln!(out, "auth_mode = \"{}\"", p.auth_mode);
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_secret(label: &str) -> Result<String, CliError> {
    let secret = rpassword::prompt_password(label).map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: "secret".into(),
            reason: "value cannot be empty".into(),
        });
    }
    Ok(secret)
}

/// Offer to store a secret in the system keyring or return it for plaintext config.
///
/// Returns `Some(secret)` if the user chose plaintext, `None` if stored in keyring.
fn prompt_keyring_storage(
    profile_name: &str,
    kind: SecretKind,
    secret: String,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store it?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        config::store_secret(profile_name, kind, &secret)?;
        eprintln!("   ✓ stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret))
    }
}

fn profile_not_found(cfg: &Config, name: String) -> CliError {
    CliError::ProfileNotFound {
        name,
        available: config::available_profiles(cfg),
    }
}

fn summarize(cfg: &Config) -> String {
    let default = cfg.default_profile.as_deref().unwrap_or("default");
    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| {
            let p = &cfg.profiles[name];
            let marker = if name == default { " *" } else { "" };
            format!("{name}{marker}\t{}\t{}", p.server, p.auth_mode)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("cmas configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let server: String = Input::new()
                .with_prompt("Site server (SMS Provider) host name")
                .interact_text()
                .map_err(prompt_err)?;

            let auth_choices = &[
                "Integrated (no credentials sent; gateway or proxy authenticates)",
                "Username/Password (basic)",
                "Bearer token (cloud management gateway)",
            ];
            let auth_selection = Select::new()
                .with_prompt("Authentication method")
                .items(auth_choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            let mut profile = Profile {
                server,
                ..Profile::default()
            };
            match auth_selection {
                0 => profile.auth_mode = "integrated".into(),
                1 => {
                    let username: String = Input::new()
                        .with_prompt("Username (DOMAIN\\user)")
                        .interact_text()
                        .map_err(prompt_err)?;
                    let password = prompt_secret("Password: ")?;
                    profile.auth_mode = "basic".into();
                    profile.username = Some(username);
                    profile.password =
                        prompt_keyring_storage(&profile_name, SecretKind::Password, password)?;
                }
                _ => {
                    let token = prompt_secret("Token: ")?;
                    profile.auth_mode = "bearer".into();
                    profile.token =
                        prompt_keyring_storage(&profile_name, SecretKind::Token, token)?;
                }
            }

            let site_code: String = Input::new()
                .with_prompt("Site code (empty = ask the server)")
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;
            if !site_code.trim().is_empty() {
                profile.site_code = Some(site_code.trim().to_uppercase());
            }

            let mut cfg = config::load_config_or_default();
            cfg.profiles.insert(profile_name.clone(), profile);
            cfg.default_profile = Some(profile_name.clone());
            config::save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Test it: cmas connect");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let mut cfg = config::load_config_or_default();
            for profile in cfg.profiles.values_mut() {
                if profile.password.is_some() {
                    profile.password = Some("****".into());
                }
                if profile.token.is_some() {
                    profile.token = Some("****".into());
                }
            }
            let out = output::render_single(global.output, &cfg, format_config_redacted, |_| {
                "config".into()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg
                .profiles
                .entry(profile_name.clone())
                .or_insert_with(|| Profile {
                    auth_mode: "integrated".into(),
                    ..Profile::default()
                });
            set_profile_key(profile, &key, value)?;

            config::save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: cmas config init");
            } else {
                output::print_output(&summarize(&cfg), global.quiet);
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(&cfg, name));
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        // ── SetSecret ───────────────────────────────────────────────
        ConfigCommand::SetSecret { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            let prof = cfg
                .profiles
                .get(&profile_name)
                .ok_or_else(|| profile_not_found(&cfg, profile_name.clone()))?;

            let (kind, label) = match prof.auth_mode.as_str() {
                "bearer" => (SecretKind::Token, "Token: "),
                "basic" => (SecretKind::Password, "Password: "),
                other => {
                    return Err(CliError::Validation {
                        field: "auth_mode".into(),
                        reason: format!("profile '{profile_name}' uses '{other}' auth, which has no secret"),
                    });
                }
            };
            config::store_secret(&profile_name, kind, &prompt_secret(label)?)?;
            eprintln!("✓ Secret stored in system keyring for profile '{profile_name}'");
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        // ── Check [file] ────────────────────────────────────────────
        ConfigCommand::Check { file } => {
            let path = file.unwrap_or_else(config::config_path);
            let cfg = check_file(&path)?;
            if cfg.profiles.is_empty() {
                eprintln!("{}: valid, no profiles", path.display());
            } else {
                output::print_output(&summarize(&cfg), global.quiet);
            }
            Ok(())
        }
    }
}

/// Load a config file strictly: unlike normal startup, parse errors surface.
fn check_file(path: &Path) -> Result<Config, CliError> {
    if !path.exists() {
        return Err(CliError::NoConfig {
            path: path.display().to_string(),
        });
    }
    let cfg = config::load_config_from(path)?;
    for (name, profile) in &cfg.profiles {
        if !matches!(profile.auth_mode.as_str(), "integrated" | "basic" | "bearer") {
            return Err(CliError::Validation {
                field: format!("profiles.{name}.auth_mode"),
                reason: format!("'{}' is not integrated, basic or bearer", profile.auth_mode),
            });
        }
    }
    Ok(cfg)
}

fn set_profile_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    let parse_err = |field: &str, reason: &str| CliError::Validation {
        field: field.into(),
        reason: reason.into(),
    };
    match key {
        "server" => profile.server = value,
        "site_code" | "site-code" => profile.site_code = Some(value.to_uppercase()),
        "auth_mode" | "auth-mode" => {
            if !matches!(value.as_str(), "integrated" | "basic" | "bearer") {
                return Err(parse_err(
                    "auth_mode",
                    "must be 'integrated', 'basic', or 'bearer'",
                ));
            }
            profile.auth_mode = value;
        }
        "username" => profile.username = Some(value),
        "password_env" | "password-env" => profile.password_env = Some(value),
        "token_env" | "token-env" => profile.token_env = Some(value),
        "insecure" => {
            profile.insecure = Some(
                value
                    .parse()
                    .map_err(|_| parse_err("insecure", "must be 'true' or 'false'"))?,
            );
        }
        "timeout" => {
            profile.timeout = Some(
                value
                    .parse()
                    .map_err(|_| parse_err("timeout", "must be a number (seconds)"))?,
            );
        }
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: server, site_code, auth_mode, \
                     username, password_env, token_env, insecure, timeout, ca_cert"
                ),
            });
        }
    }
    Ok(())
}
