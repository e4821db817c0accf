//! Device and collection variable handlers (`device-vars`, `collection-vars`).

use cmas_core::{SiteServer, Variable, VariableScope};
use tabled::Tabled;

use crate::cli::{GlobalOpts, VariablesArgs, VariablesCommand};
use crate::error::CliError;
use crate::output;

use super::{VariableTarget, util};

#[derive(Tabled)]
struct VariableRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Masked")]
    masked: bool,
}

impl From<&Variable> for VariableRow {
    fn from(v: &Variable) -> Self {
        Self {
            name: v.name.clone(),
            value: display_value(v),
            masked: v.is_masked,
        }
    }
}

/// Masked values never come back from the service.
fn display_value(v: &Variable) -> String {
    match (&v.value, v.is_masked) {
        (_, true) => "********".into(),
        (Some(value), false) => value.clone(),
        (None, false) => String::new(),
    }
}

fn detail(v: &Variable) -> String {
    output::detail_lines(&[
        ("Name", Some(v.name.clone())),
        ("Value", Some(display_value(v))),
        ("Masked", Some(v.is_masked.to_string())),
    ])
}

async fn scope(
    site: &SiteServer,
    target: VariableTarget,
    name_or_id: &str,
) -> Result<VariableScope, CliError> {
    Ok(match target {
        VariableTarget::Device => site.device_scope(name_or_id).await?,
        VariableTarget::Collection => site.collection_scope(name_or_id).await?,
    })
}

pub async fn handle(
    site: &SiteServer,
    target: VariableTarget,
    args: VariablesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        VariablesCommand::List {
            target: name_or_id,
            name,
        } => {
            let pattern = util::pattern(name.as_deref())?;
            let scope = scope(site, target, &name_or_id).await?;
            let vars = site.get_variables(&scope, pattern.as_ref()).await?;
            let out = output::render_list(
                global.output,
                &vars,
                |v| VariableRow::from(v),
                |v| v.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        VariablesCommand::Add {
            target: name_or_id,
            name,
            value,
            masked,
        } => {
            let scope = scope(site, target, &name_or_id).await?;
            let created = site.new_variable(&scope, &name, &value, masked).await?;
            let out = output::render_single(global.output, &created, detail, |v| v.name.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        VariablesCommand::Set {
            target: name_or_id,
            name,
            value,
            masked,
        } => {
            let scope = scope(site, target, &name_or_id).await?;
            let updated = site.set_variable(&scope, &name, &value, masked).await?;
            let out = output::render_single(global.output, &updated, detail, |v| v.name.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        VariablesCommand::Remove {
            target: name_or_id,
            name,
        } => {
            let pattern = util::pattern(name.as_deref())?;
            let scope = scope(site, target, &name_or_id).await?;
            let what = pattern.as_ref().map_or_else(
                || "ALL variables".to_owned(),
                |p| format!("variables matching '{p}'"),
            );
            if !util::confirm(&format!("Remove {what} from {scope}?"), global)? {
                return Ok(());
            }

            let removed = site.remove_variables(&scope, pattern.as_ref()).await?;
            let out = output::render_list(
                global.output,
                &removed,
                |v| VariableRow::from(v),
                |v| v.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            util::done(&format!("Removed {} variable(s)", removed.len()), global);
            Ok(())
        }
    }
}
