// cmas-core: Multi-step workflows between cmas-api and the CLI.
//
// Everything hangs off `SiteServer`, the explicit connection context.
// Lookups resolve names to IDs, mutations then call the entity path or
// WMI method. Nothing is cached and nothing is rolled back.

pub mod collections;
pub mod config;
pub mod devices;
pub mod error;
pub mod rules;
pub mod scripts;
pub mod site;
pub mod variables;

// ── Primary re-exports ──────────────────────────────────────────────
pub use collections::{CollectionQuery, NewCollection};
pub use config::ConnectionConfig;
pub use devices::DeviceQuery;
pub use error::CoreError;
pub use rules::{BatchOutcome, RulePartition, Skipped, partition_rules};
pub use scripts::{
    ExecutionReport, InvokeScript, ScriptInvocation, ScriptOutput, ScriptQuery, ScriptRef,
    ScriptResult, StatusQuery, script_parameters,
};
pub use site::SiteServer;
pub use variables::VariableScope;

// Model types consumers need without depending on cmas-api directly.
pub use cmas_api::models::{
    CollectionMember, CollectionRule, CollectionType, RefreshType, RuleKind, ScriptExecutionStatus,
    ScriptExecutionTask, SmsCollection, SmsDevice, SmsScript, Variable,
};
pub use cmas_api::script_xml::ScriptParameterDef;
pub use cmas_api::{Credentials, NamePattern, TlsMode};

/// Exactly one row, else `NotFound` / `Ambiguous`.
pub(crate) fn exactly_one<T>(
    mut rows: Vec<T>,
    entity_type: &'static str,
    identifier: &str,
) -> Result<T, CoreError> {
    match rows.len() {
        0 => Err(CoreError::not_found(entity_type, identifier)),
        1 => rows.pop().ok_or_else(|| CoreError::not_found(entity_type, identifier)),
        count => Err(CoreError::Ambiguous {
            entity_type,
            identifier: identifier.to_owned(),
            count,
        }),
    }
}
