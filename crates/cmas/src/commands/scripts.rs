//! Script command handlers: list, inspect, run, and fetch results.

use std::collections::BTreeMap;

use cmas_core::{
    ExecutionReport, InvokeScript, ScriptOutput, ScriptParameterDef, ScriptQuery, ScriptRef,
    ScriptResult, SiteServer, SmsScript, StatusQuery, script_parameters,
};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{GlobalOpts, OutputFormat, ScriptsArgs, ScriptsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct ScriptRow {
    #[tabled(rename = "GUID")]
    guid: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Approval")]
    approval: String,
    #[tabled(rename = "Author")]
    author: String,
}

impl From<&SmsScript> for ScriptRow {
    fn from(s: &SmsScript) -> Self {
        Self {
            guid: s.script_guid.clone(),
            name: s.script_name.clone(),
            version: s.script_version.clone().unwrap_or_default(),
            approval: approval_label(s.approval_state).into(),
            author: s.author.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct ParameterRow {
    #[tabled(rename = "Parameter")]
    name: String,
    #[tabled(rename = "Type")]
    param_type: String,
    #[tabled(rename = "Required")]
    required: bool,
    #[tabled(rename = "Hidden")]
    hidden: bool,
    #[tabled(rename = "Default")]
    default: String,
}

impl From<&ScriptParameterDef> for ParameterRow {
    fn from(p: &ScriptParameterDef) -> Self {
        Self {
            name: p.name.clone(),
            param_type: p.param_type.clone(),
            required: p.is_required,
            hidden: p.is_hidden,
            default: p.default_value.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "Operation")]
    operation_id: u64,
    #[tabled(rename = "Script")]
    script: String,
    #[tabled(rename = "Collection")]
    collection: String,
    #[tabled(rename = "Total")]
    total: u32,
    #[tabled(rename = "Completed")]
    completed: u32,
    #[tabled(rename = "Failed")]
    failed: u32,
    #[tabled(rename = "Offline")]
    offline: u32,
}

impl From<&ExecutionReport> for TaskRow {
    fn from(r: &ExecutionReport) -> Self {
        let t = &r.task;
        Self {
            operation_id: t.client_operation_id,
            script: t.script_name.clone().unwrap_or_default(),
            collection: t
                .collection_name
                .clone()
                .or_else(|| t.collection_id.clone())
                .unwrap_or_default(),
            total: t.total_clients,
            completed: t.completed_clients,
            failed: t.failed_clients,
            offline: t.offline_clients,
        }
    }
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Operation")]
    operation_id: u64,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Exit code")]
    exit_code: String,
    #[tabled(rename = "Output")]
    output: String,
}

impl From<&ScriptResult> for ResultRow {
    fn from(r: &ScriptResult) -> Self {
        let s = &r.status;
        Self {
            operation_id: s.client_operation_id,
            device: s
                .device_name
                .clone()
                .or_else(|| s.resource_id.map(|id| id.to_string()))
                .unwrap_or_default(),
            state: match s.script_execution_state {
                Some(0) => "Succeeded".into(),
                Some(1) => "Failed".into(),
                Some(other) => other.to_string(),
                None => String::new(),
            },
            exit_code: s.script_exit_code.map(|c| c.to_string()).unwrap_or_default(),
            output: match &r.output {
                Some(ScriptOutput::Json(value)) => value.to_string(),
                Some(ScriptOutput::Text(text)) => text.trim().to_owned(),
                None => String::new(),
            },
        }
    }
}

fn approval_label(state: u32) -> &'static str {
    match state {
        0 => "Waiting",
        1 => "Declined",
        3 => "Approved",
        _ => "Unknown",
    }
}

/// A script with its decoded parameters, for `scripts get`.
#[derive(Serialize)]
struct ScriptDetail {
    #[serde(flatten)]
    script: SmsScript,
    parameters: Vec<ScriptParameterDef>,
}

fn detail(d: &ScriptDetail) -> String {
    let s = &d.script;
    let mut out = output::detail_lines(&[
        ("GUID", Some(s.script_guid.clone())),
        ("Name", Some(s.script_name.clone())),
        ("Version", s.script_version.clone()),
        (
            "Approval",
            Some(format!("{} ({})", approval_label(s.approval_state), s.approval_state)),
        ),
        ("Author", s.author.clone()),
        ("Approver", s.approver.clone()),
        ("Updated", s.last_update_time.clone()),
        ("Hash", s.script_hash.clone()),
    ]);
    if !d.parameters.is_empty() {
        let rows: Vec<ParameterRow> = d.parameters.iter().map(ParameterRow::from).collect();
        out.push_str("\n\n");
        out.push_str(
            &tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string(),
        );
    }
    out
}

fn status_tables(reports: &[ExecutionReport]) -> Result<String, CliError> {
    let mut out = output::render_list(
        OutputFormat::Table,
        reports,
        |r| TaskRow::from(r),
        |r| r.task.client_operation_id.to_string(),
    )?;
    let results: Vec<&ScriptResult> = reports.iter().flat_map(|r| &r.results).collect();
    if !results.is_empty() {
        out.push_str("\n\n");
        out.push_str(&output::render_list(
            OutputFormat::Table,
            &results,
            |r| ResultRow::from(*r),
            |r| r.status.client_operation_id.to_string(),
        )?);
    }
    Ok(out)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    site: &SiteServer,
    args: ScriptsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ScriptsCommand::List { name } => {
            let query = ScriptQuery {
                name: util::pattern(name.as_deref())?,
                guid: None,
            };
            let rows = site.get_scripts(&query).await?;
            let out = output::render_list(
                global.output,
                &rows,
                |s| ScriptRow::from(s),
                |s| s.script_guid.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ScriptsCommand::Get { script, guid } => {
            let script_ref = if guid {
                ScriptRef::Guid(script)
            } else {
                ScriptRef::Name(script)
            };
            let script = site.resolve_script(&script_ref).await?;
            let parameters = script_parameters(&script)?;
            let detail_view = ScriptDetail { script, parameters };
            let out = output::render_single(global.output, &detail_view, detail, |d| {
                d.script.script_guid.clone()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ScriptsCommand::Run {
            name,
            guid,
            collection,
            devices,
            params,
        } => {
            let script = match (guid, name) {
                (Some(guid), _) => ScriptRef::Guid(guid),
                (None, Some(name)) => ScriptRef::Name(name),
                (None, None) => {
                    return Err(CliError::Validation {
                        field: "script".into(),
                        reason: "pass --name or --guid".into(),
                    });
                }
            };

            let mut resource_ids = Vec::with_capacity(devices.len());
            for device in &devices {
                resource_ids.push(site.resolve_device(device).await?.resource_id);
            }

            let invocation = site
                .invoke_script(&InvokeScript {
                    script,
                    collection,
                    resource_ids,
                    parameters: params.into_iter().collect::<BTreeMap<_, _>>(),
                })
                .await?;

            let out = output::render_single(
                global.output,
                &invocation,
                |i| {
                    output::detail_lines(&[
                        ("Operation ID", Some(i.operation_id.to_string())),
                        ("Script", Some(format!("{} ({})", i.script_name, i.script_guid))),
                        ("Collection", Some(i.collection_id.clone())),
                        (
                            "Devices",
                            (!i.resource_ids.is_empty()).then(|| {
                                i.resource_ids
                                    .iter()
                                    .map(ToString::to_string)
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            }),
                        ),
                    ])
                },
                |i| i.operation_id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            if !global.quiet && matches!(global.output, OutputFormat::Table) {
                eprintln!(
                    "\nTrack it with: cmas scripts status --operation-id {}",
                    invocation.operation_id
                );
            }
            Ok(())
        }

        ScriptsCommand::Status {
            operation_id,
            collection_id,
            script_name,
        } => {
            let reports = site
                .script_execution_status(&StatusQuery {
                    operation_id,
                    collection_id,
                    script_name,
                })
                .await?;
            let out = match global.output {
                OutputFormat::Table => status_tables(&reports)?,
                format => output::render_list(
                    format,
                    &reports,
                    |r| TaskRow::from(r),
                    |r| r.task.client_operation_id.to_string(),
                )?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
