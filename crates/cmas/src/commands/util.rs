//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::Path;

use cmas_core::{BatchOutcome, NamePattern};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal there is nobody to ask, so `--yes` becomes mandatory.
pub fn confirm(message: &str, global: &GlobalOpts) -> Result<bool, CliError> {
    if global.yes {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Parse an optional `--name` argument into a pattern.
pub fn pattern(raw: Option<&str>) -> Result<Option<NamePattern>, CliError> {
    raw.map(NamePattern::parse)
        .transpose()
        .map_err(|e| CliError::Validation {
            field: "name".into(),
            reason: e.to_string(),
        })
}

/// Read a JSON argument: inline text, or `@path` to read it from a file.
pub fn read_json_arg(raw: &str) -> Result<serde_json::Value, CliError> {
    let contents = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))?,
        None => raw.to_owned(),
    };
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: "body".into(),
        reason: format!("invalid JSON: {e}"),
    })
}

/// Print a batch outcome: applied items to stdout, skips to stderr.
pub fn print_outcome(outcome: &BatchOutcome, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(
        global.output,
        outcome,
        |o| {
            let color = output::should_color(global.color);
            o.applied
                .iter()
                .map(|item| format!("{} {item}", output::status_label("added", true, color)))
                .chain(o.skipped.iter().map(|s| {
                    format!(
                        "{} {} ({})",
                        output::status_label("skipped", false, color),
                        s.item,
                        s.reason
                    )
                }))
                .collect::<Vec<_>>()
                .join("\n")
        },
        |o| o.applied.join("\n"),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// One-line confirmation on stderr for mutations with nothing to print.
pub fn done(message: &str, global: &GlobalOpts) {
    if !global.quiet {
        let color = output::should_color(global.color);
        eprintln!("{} {message}", output::status_label("✓", true, color));
    }
}
