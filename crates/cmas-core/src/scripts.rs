// ── Script runs ──
//
// Running a script is one client operation whose payload repeats the
// script's identity and a digest of the parameter block. Everything that
// can fail locally (lookup, approval, lazy properties, parameter checks)
// is done before the operation is posted.

use std::collections::BTreeMap;

use cmas_api::models::{
    CLIENT_OPERATION_RUN_SCRIPT, ClientOperationRequest, ScriptExecutionStatus,
    ScriptExecutionTask, SmsScript,
};
use cmas_api::script_xml::{self, ScriptIdentity, ScriptParameterDef, ScriptParameterSchema};
use cmas_api::{Filter, NamePattern};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::exactly_one;
use crate::site::SiteServer;

/// Collection that contains every system, used when only devices are targeted.
pub const ALL_SYSTEMS_COLLECTION: &str = "SMS00001";

/// Filters for [`SiteServer::get_scripts`]. Empty matches everything.
#[derive(Debug, Clone, Default)]
pub struct ScriptQuery {
    pub name: Option<NamePattern>,
    pub guid: Option<String>,
}

/// How the caller identifies a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRef {
    Name(String),
    Guid(String),
}

impl ScriptRef {
    fn as_str(&self) -> &str {
        match self {
            Self::Name(s) | Self::Guid(s) => s,
        }
    }
}

/// Input for [`SiteServer::invoke_script`].
#[derive(Debug, Clone)]
pub struct InvokeScript {
    pub script: ScriptRef,
    /// Collection name or ID to target.
    pub collection: Option<String>,
    pub resource_ids: Vec<u32>,
    pub parameters: BTreeMap<String, String>,
}

/// What the service accepted: the operation to poll and the echoed target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptInvocation {
    pub operation_id: u64,
    pub script_guid: String,
    pub script_name: String,
    pub collection_id: String,
    pub resource_ids: Vec<u32>,
}

/// Filters for [`SiteServer::script_execution_status`].
#[derive(Debug, Clone, Default)]
pub struct StatusQuery {
    pub operation_id: Option<u64>,
    pub collection_id: Option<String>,
    pub script_name: Option<String>,
}

/// Script output, decoded as JSON when it parses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScriptOutput {
    Json(Value),
    Text(String),
}

impl ScriptOutput {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(
            serde_json::from_str(trimmed)
                .map_or_else(|_| Self::Text(raw.to_owned()), Self::Json),
        )
    }
}

/// One device's result for a task.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptResult {
    #[serde(flatten)]
    pub status: ScriptExecutionStatus,
    pub output: Option<ScriptOutput>,
}

/// A task with the per-device results known so far.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    #[serde(flatten)]
    pub task: ScriptExecutionTask,
    pub results: Vec<ScriptResult>,
}

impl SiteServer {
    pub async fn get_scripts(&self, query: &ScriptQuery) -> Result<Vec<SmsScript>, CoreError> {
        let mut parts = Vec::new();
        if let Some(guid) = &query.guid {
            parts.push(Filter::eq("ScriptGuid", guid.clone()));
        }
        if let Some(filter) = query
            .name
            .as_ref()
            .and_then(|n| n.server_filter("ScriptName"))
        {
            parts.push(filter);
        }

        let mut rows = self
            .client()
            .list_scripts(Filter::all(parts).as_ref())
            .await?;
        if let Some(pattern) = &query.name {
            rows.retain(|s| pattern.matches(&s.script_name));
        }
        Ok(rows)
    }

    /// Resolve by name or GUID, then re-fetch by key for lazy properties.
    pub async fn resolve_script(&self, script: &ScriptRef) -> Result<SmsScript, CoreError> {
        let query = match script {
            ScriptRef::Name(name) => ScriptQuery {
                name: Some(NamePattern::Exact(name.clone())),
                guid: None,
            },
            ScriptRef::Guid(guid) => ScriptQuery {
                name: None,
                guid: Some(guid.clone()),
            },
        };
        let listed = exactly_one(self.get_scripts(&query).await?, "script", script.as_str())?;

        Ok(self.client().get_script(&listed.script_guid).await?)
    }

    pub async fn invoke_script(&self, request: &InvokeScript) -> Result<ScriptInvocation, CoreError> {
        if request.collection.is_none() && request.resource_ids.is_empty() {
            return Err(CoreError::validation(
                "a script run needs a target collection or at least one device",
            ));
        }

        let script = self.resolve_script(&request.script).await?;
        if !script.is_approved() {
            return Err(CoreError::ScriptNotApproved {
                name: script.script_name,
                state: script.approval_state,
            });
        }

        let hash = lazy(&script, script.script_hash.as_deref(), "ScriptHash")?;
        let version = lazy(&script, script.script_version.as_deref(), "ScriptVersion")?;
        let schema = parameter_schema(&script, &request.parameters)?;

        let parameter_xml = match &schema {
            Some(schema) => {
                schema.validate(&request.parameters)?;
                Some(schema.build_parameter_xml(&request.parameters))
            }
            None => None,
        };

        let collection_id = match &request.collection {
            Some(collection) => self.resolve_collection(collection).await?.collection_id,
            None => ALL_SYSTEMS_COLLECTION.to_owned(),
        };

        let identity = ScriptIdentity {
            guid: &script.script_guid,
            version,
            script_type: script.script_type,
            hash,
        };
        let param = script_xml::encode_envelope(&identity, parameter_xml.as_deref());
        debug!(
            script = %script.script_name,
            parameters = request.parameters.len(),
            "built script envelope"
        );

        let result = self
            .client()
            .initiate_client_operation(&ClientOperationRequest {
                operation_type: CLIENT_OPERATION_RUN_SCRIPT,
                target_collection_id: collection_id.clone(),
                target_resource_ids: request.resource_ids.clone(),
                randomization_window: None,
                param,
            })
            .await?;

        let operation_id = match (result.operation_id, result.return_value) {
            (Some(id), None | Some(0)) => id,
            (_, code) => {
                return Err(CoreError::Api {
                    message: format!(
                        "client operation was not created (return value {})",
                        code.map_or_else(|| "missing".to_owned(), |c| c.to_string())
                    ),
                    code: None,
                    status: None,
                });
            }
        };

        info!(
            operation_id,
            script = %script.script_name,
            collection_id = %collection_id,
            devices = request.resource_ids.len(),
            "started script run"
        );
        Ok(ScriptInvocation {
            operation_id,
            script_guid: script.script_guid,
            script_name: script.script_name,
            collection_id,
            resource_ids: request.resource_ids.clone(),
        })
    }

    /// One snapshot of matching tasks and, where any client finished, their
    /// per-device results.
    pub async fn script_execution_status(
        &self,
        query: &StatusQuery,
    ) -> Result<Vec<ExecutionReport>, CoreError> {
        let mut parts = Vec::new();
        if let Some(id) = query.operation_id {
            parts.push(Filter::eq_num("ClientOperationId", operation_id_literal(id)?));
        }
        if let Some(collection) = &query.collection_id {
            parts.push(Filter::eq("CollectionId", collection.clone()));
        }
        if let Some(name) = &query.script_name {
            parts.push(Filter::eq("ScriptName", name.clone()));
        }

        let tasks = self
            .client()
            .list_execution_tasks(Filter::all(parts).as_ref())
            .await?;

        let mut reports = Vec::with_capacity(tasks.len());
        for task in tasks {
            let results = if task.completed_clients > 0 {
                let filter = Filter::eq_num(
                    "ClientOperationId",
                    operation_id_literal(task.client_operation_id)?,
                );
                self.client()
                    .list_execution_statuses(Some(&filter))
                    .await?
                    .into_iter()
                    .map(|status| ScriptResult {
                        output: status.script_output.as_deref().and_then(ScriptOutput::parse),
                        status,
                    })
                    .collect()
            } else {
                Vec::new()
            };
            reports.push(ExecutionReport { task, results });
        }
        Ok(reports)
    }
}

/// Parameters a fetched script declares, in declaration order.
///
/// Scripts without a `ParamsDefinition` declare none.
pub fn script_parameters(script: &SmsScript) -> Result<Vec<ScriptParameterDef>, CoreError> {
    match script.params_definition.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(encoded) => Ok(ScriptParameterSchema::decode(encoded)?.parameters),
        None => Ok(Vec::new()),
    }
}

fn lazy<'a>(
    script: &SmsScript,
    value: Option<&'a str>,
    property: &'static str,
) -> Result<&'a str, CoreError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoreError::LazyPropertyMissing {
            script: script.script_name.clone(),
            property,
        })
}

/// The decoded schema, or `None` for a script that takes no parameters.
fn parameter_schema(
    script: &SmsScript,
    supplied: &BTreeMap<String, String>,
) -> Result<Option<ScriptParameterSchema>, CoreError> {
    match script.params_definition.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(encoded) => {
            let schema = ScriptParameterSchema::decode(encoded)?;
            Ok((!schema.is_empty() || !supplied.is_empty()).then_some(schema))
        }
        None if script.parameterless_script == Some(true) => match supplied.keys().next() {
            Some(name) => Err(cmas_api::Error::UnknownScriptParameter { name: name.clone() }.into()),
            None => Ok(None),
        },
        None if script.parameterless_script == Some(false) || !supplied.is_empty() => {
            Err(CoreError::LazyPropertyMissing {
                script: script.script_name.clone(),
                property: "ParamsDefinition",
            })
        }
        None => Ok(None),
    }
}

fn operation_id_literal(id: u64) -> Result<i64, CoreError> {
    i64::try_from(id).map_err(|_| CoreError::validation(format!("operation ID {id} is out of range")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn output_prefers_json() {
        assert_eq!(
            ScriptOutput::parse(r#"{"Uptime":"3.04:11:52"}"#),
            Some(ScriptOutput::Json(json!({ "Uptime": "3.04:11:52" })))
        );
        assert_eq!(
            ScriptOutput::parse("Restarted spooler"),
            Some(ScriptOutput::Text("Restarted spooler".into()))
        );
        assert_eq!(ScriptOutput::parse("  \r\n"), None);
    }

    fn script(definition: Option<&str>, parameterless: Option<bool>) -> SmsScript {
        serde_json::from_value(json!({
            "ScriptGuid": "G",
            "ScriptName": "Get-Uptime",
            "ApprovalState": 3,
            "ParamsDefinition": definition,
            "ParameterlessScript": parameterless,
        }))
        .unwrap()
    }

    #[test]
    fn parameterless_script_rejects_arguments() {
        let mut supplied = BTreeMap::new();
        assert!(parameter_schema(&script(None, Some(true)), &supplied)
            .unwrap()
            .is_none());

        supplied.insert("Name".to_owned(), "x".to_owned());
        assert!(matches!(
            parameter_schema(&script(None, Some(true)), &supplied),
            Err(CoreError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn declared_parameters_in_order() {
        // <ScriptParameters><ScriptParameter Name="ComputerName" Type="System.String"
        // IsRequired="true" IsHidden="false"/></ScriptParameters>
        let encoded = "PFNjcmlwdFBhcmFtZXRlcnM+PFNjcmlwdFBhcmFtZXRlciBOYW1lPSJDb21wdXRlck5hbWUiIFR5cGU9IlN5c3RlbS5TdHJpbmciIElzUmVxdWlyZWQ9InRydWUiIElzSGlkZGVuPSJmYWxzZSIvPjwvU2NyaXB0UGFyYW1ldGVycz4=";
        let params = script_parameters(&script(Some(encoded), Some(false))).unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "ComputerName");
        assert!(params[0].is_required);

        assert!(script_parameters(&script(None, Some(true))).unwrap().is_empty());
    }

    #[test]
    fn missing_schema_on_parameterized_script_is_lazy_property() {
        assert!(matches!(
            parameter_schema(&script(None, Some(false)), &BTreeMap::new()),
            Err(CoreError::LazyPropertyMissing {
                property: "ParamsDefinition",
                ..
            })
        ));
    }
}
