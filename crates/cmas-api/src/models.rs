// Admin Service response and request types
//
// WMI classes surfaced through the Admin Service's OData endpoint. Property
// names follow the vendor's casing. Lazy properties and anything that varies
// by site version are optional; unmodelled properties land in `extra` so
// read-modify-write cycles send them back untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

// ── Envelope ─────────────────────────────────────────────────────────

/// OData collection envelope: `{ "@odata.context": "...", "value": [...] }`.
#[derive(Debug, Deserialize)]
pub struct ODataCollection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

// ── Site ─────────────────────────────────────────────────────────────

/// `SMS_Site`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmsSite {
    pub site_code: String,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub reporting_site_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Collections ──────────────────────────────────────────────────────

/// `SMS_Collection.CollectionType`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(from = "u32", into = "u32")]
pub enum CollectionType {
    #[default]
    Other,
    User,
    Device,
}

impl From<u32> for CollectionType {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::User,
            2 => Self::Device,
            _ => Self::Other,
        }
    }
}

impl From<CollectionType> for u32 {
    fn from(value: CollectionType) -> Self {
        match value {
            CollectionType::Other => 0,
            CollectionType::User => 1,
            CollectionType::Device => 2,
        }
    }
}

/// `SMS_Collection.RefreshType`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(from = "u32", into = "u32")]
pub enum RefreshType {
    #[default]
    Manual,
    Periodic,
    Continuous,
    Both,
}

impl From<u32> for RefreshType {
    fn from(value: u32) -> Self {
        match value {
            2 => Self::Periodic,
            4 => Self::Continuous,
            6 => Self::Both,
            _ => Self::Manual,
        }
    }
}

impl From<RefreshType> for u32 {
    fn from(value: RefreshType) -> Self {
        match value {
            RefreshType::Manual => 1,
            RefreshType::Periodic => 2,
            RefreshType::Continuous => 4,
            RefreshType::Both => 6,
        }
    }
}

/// `SMS_Collection`
///
/// `CollectionRules` is lazy: list queries omit it, a keyed fetch returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmsCollection {
    #[serde(rename = "CollectionID")]
    pub collection_id: String,
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub collection_type: CollectionType,
    #[serde(default)]
    pub refresh_type: RefreshType,
    #[serde(default, rename = "LimitToCollectionID")]
    pub limit_to_collection_id: Option<String>,
    #[serde(default)]
    pub limit_to_collection_name: Option<String>,
    #[serde(default)]
    pub member_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_rules: Option<Vec<CollectionRule>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body for creating an `SMS_Collection`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewCollectionBody {
    pub name: String,
    pub collection_type: CollectionType,
    #[serde(rename = "LimitToCollectionID")]
    pub limit_to_collection_id: String,
    pub refresh_type: RefreshType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// `SMS_FullCollectionMembership`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CollectionMember {
    #[serde(rename = "CollectionID")]
    pub collection_id: String,
    #[serde(rename = "ResourceID")]
    pub resource_id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub site_code: Option<String>,
    #[serde(default)]
    pub is_client: Option<bool>,
    #[serde(default)]
    pub is_direct: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Membership rules ─────────────────────────────────────────────────

/// The four membership rule kinds, keyed by their OData type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum RuleKind {
    Direct,
    Query,
    Include,
    Exclude,
}

impl RuleKind {
    pub const ALL: [RuleKind; 4] = [Self::Direct, Self::Query, Self::Include, Self::Exclude];

    pub fn odata_type(self) -> &'static str {
        match self {
            Self::Direct => "#AdminService.SMS_CollectionRuleDirect",
            Self::Query => "#AdminService.SMS_CollectionRuleQuery",
            Self::Include => "#AdminService.SMS_CollectionRuleIncludeCollection",
            Self::Exclude => "#AdminService.SMS_CollectionRuleExcludeCollection",
        }
    }

    pub fn from_odata_type(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.odata_type() == tag)
    }
}

/// One entry of `SMS_Collection.CollectionRules`.
///
/// Kept flat (not an enum) because the service returns every variant in
/// one array and unknown subclasses must survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CollectionRule {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(default, rename = "ResourceID", skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_expression: Option<String>,
    #[serde(default, rename = "QueryID", skip_serializing_if = "Option::is_none")]
    pub query_id: Option<u32>,
    #[serde(default, rename = "IncludeCollectionID", skip_serializing_if = "Option::is_none")]
    pub include_collection_id: Option<String>,
    #[serde(default, rename = "ExcludeCollectionID", skip_serializing_if = "Option::is_none")]
    pub exclude_collection_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionRule {
    pub fn kind(&self) -> Option<RuleKind> {
        RuleKind::from_odata_type(&self.odata_type)
    }

    pub fn direct(resource_id: u32, rule_name: impl Into<String>) -> Self {
        Self {
            odata_type: RuleKind::Direct.odata_type().into(),
            rule_name: Some(rule_name.into()),
            resource_id: Some(resource_id),
            resource_class_name: Some("SMS_R_System".into()),
            ..Self::default()
        }
    }

    pub fn query(rule_name: impl Into<String>, query_expression: impl Into<String>) -> Self {
        Self {
            odata_type: RuleKind::Query.odata_type().into(),
            rule_name: Some(rule_name.into()),
            query_expression: Some(query_expression.into()),
            ..Self::default()
        }
    }

    pub fn include(collection_id: impl Into<String>, rule_name: impl Into<String>) -> Self {
        Self {
            odata_type: RuleKind::Include.odata_type().into(),
            rule_name: Some(rule_name.into()),
            include_collection_id: Some(collection_id.into()),
            ..Self::default()
        }
    }

    pub fn exclude(collection_id: impl Into<String>, rule_name: impl Into<String>) -> Self {
        Self {
            odata_type: RuleKind::Exclude.odata_type().into(),
            rule_name: Some(rule_name.into()),
            exclude_collection_id: Some(collection_id.into()),
            ..Self::default()
        }
    }

    /// The identifying value for display: resource ID, query, or referenced collection.
    pub fn target(&self) -> String {
        match self.kind() {
            Some(RuleKind::Direct) => self.resource_id.map(|id| id.to_string()),
            Some(RuleKind::Query) => self.query_expression.clone(),
            Some(RuleKind::Include) => self.include_collection_id.clone(),
            Some(RuleKind::Exclude) => self.exclude_collection_id.clone(),
            None => None,
        }
        .unwrap_or_default()
    }
}

// ── Devices ──────────────────────────────────────────────────────────

/// `SMS_R_System`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmsDevice {
    #[serde(rename = "ResourceID")]
    pub resource_id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub client: Option<u32>,
    #[serde(default)]
    pub active: Option<u32>,
    #[serde(default)]
    pub operating_system_name_and_version: Option<String>,
    #[serde(default, rename = "ResourceDomainORWorkgroup")]
    pub domain: Option<String>,
    #[serde(default, rename = "LastLogonUserName")]
    pub last_logon_user: Option<String>,
    #[serde(default, rename = "IPAddresses")]
    pub ip_addresses: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Variables ────────────────────────────────────────────────────────

/// `SMS_MachineVariable` / `SMS_CollectionVariable`.
///
/// Masked variables come back with a `null` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub is_masked: bool,
}

/// `SMS_MachineSettings`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MachineSettings {
    #[serde(rename = "ResourceID")]
    pub resource_id: u32,
    #[serde(default)]
    pub source_site: Option<String>,
    #[serde(default, rename = "LocaleID")]
    pub locale_id: Option<u32>,
    #[serde(default)]
    pub machine_variables: Vec<Variable>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `SMS_CollectionSettings`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CollectionSettings {
    #[serde(rename = "CollectionID")]
    pub collection_id: String,
    #[serde(default, rename = "LocaleID")]
    pub locale_id: Option<u32>,
    #[serde(default)]
    pub collection_variables: Vec<Variable>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Scripts ──────────────────────────────────────────────────────────

/// `SMS_Scripts.ApprovalState` value for an approved script.
pub const SCRIPT_APPROVED: u32 = 3;

/// `SMS_Scripts`
///
/// `ScriptHash`, `ScriptVersion` and `ParamsDefinition` are lazy and may be
/// missing from filtered queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmsScript {
    pub script_guid: String,
    pub script_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub script_version: Option<String>,
    #[serde(default)]
    pub script_type: u32,
    #[serde(default)]
    pub script_hash: Option<String>,
    #[serde(default)]
    pub approval_state: u32,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub approver: Option<String>,
    #[serde(default)]
    pub params_definition: Option<String>,
    #[serde(default)]
    pub parameterless_script: Option<bool>,
    #[serde(default)]
    pub last_update_time: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SmsScript {
    pub fn is_approved(&self) -> bool {
        self.approval_state == SCRIPT_APPROVED
    }
}

/// Body for `SMS_ClientOperation.InitiateClientOperationEx`.
#[derive(Debug, Clone, Serialize)]
pub struct ClientOperationRequest {
    #[serde(rename = "Type")]
    pub operation_type: u32,
    #[serde(rename = "TargetCollectionID")]
    pub target_collection_id: String,
    #[serde(rename = "TargetResourceIDs")]
    pub target_resource_ids: Vec<u32>,
    #[serde(rename = "RandomizationWindow")]
    pub randomization_window: Option<u32>,
    #[serde(rename = "Param")]
    pub param: String,
}

/// Client operation type for running a script.
pub const CLIENT_OPERATION_RUN_SCRIPT: u32 = 135;

/// Result of `InitiateClientOperationEx`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientOperationResult {
    #[serde(default, rename = "OperationID")]
    pub operation_id: Option<u64>,
    #[serde(default, rename = "ReturnValue")]
    pub return_value: Option<i64>,
}

/// `SMS_ScriptsExecutionTask`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptExecutionTask {
    pub client_operation_id: u64,
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub script_guid: Option<String>,
    #[serde(default)]
    pub script_name: Option<String>,
    #[serde(default)]
    pub status: Option<u32>,
    #[serde(default)]
    pub total_clients: u32,
    #[serde(default)]
    pub completed_clients: u32,
    #[serde(default)]
    pub failed_clients: u32,
    #[serde(default)]
    pub offline_clients: u32,
    #[serde(default)]
    pub not_applicable_clients: u32,
    #[serde(default)]
    pub unknown_clients: u32,
    #[serde(default)]
    pub last_update_time: Option<String>,
}

/// `SMS_ScriptsExecutionStatus`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptExecutionStatus {
    pub client_operation_id: u64,
    #[serde(default)]
    pub resource_id: Option<u32>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub script_execution_state: Option<u32>,
    #[serde(default)]
    pub script_exit_code: Option<i64>,
    #[serde(default)]
    pub script_output: Option<String>,
    #[serde(default)]
    pub last_update_time: Option<String>,
}

/// Accept a JSON string or number (WMI uint32 vs string across site versions).
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn collection_rules_keep_their_discriminator() {
        let collection: SmsCollection = serde_json::from_value(json!({
            "CollectionID": "PS100012",
            "Name": "Pilot",
            "CollectionType": 2,
            "RefreshType": 6,
            "LimitToCollectionID": "SMS00001",
            "CollectionRules": [
                {
                    "@odata.type": "#AdminService.SMS_CollectionRuleDirect",
                    "RuleName": "PC01",
                    "ResourceClassName": "SMS_R_System",
                    "ResourceID": 16777220
                },
                {
                    "@odata.type": "#AdminService.SMS_CollectionRuleIncludeCollection",
                    "RuleName": "Lab",
                    "IncludeCollectionID": "PS100003"
                }
            ]
        }))
        .unwrap();

        assert_eq!(collection.collection_type, CollectionType::Device);
        assert_eq!(collection.refresh_type, RefreshType::Both);
        let rules = collection.collection_rules.unwrap();
        assert_eq!(rules[0].kind(), Some(RuleKind::Direct));
        assert_eq!(rules[0].target(), "16777220");
        assert_eq!(rules[1].kind(), Some(RuleKind::Include));
        assert_eq!(rules[1].target(), "PS100003");
    }

    #[test]
    fn direct_rule_serializes_vendor_shape() {
        let rule = CollectionRule::direct(16_777_220, "PC01");
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            json!({
                "@odata.type": "#AdminService.SMS_CollectionRuleDirect",
                "RuleName": "PC01",
                "ResourceID": 16777220,
                "ResourceClassName": "SMS_R_System"
            })
        );
    }

    #[test]
    fn rule_kind_parses_case_insensitively() {
        assert_eq!("direct".parse::<RuleKind>().unwrap(), RuleKind::Direct);
        assert_eq!("EXCLUDE".parse::<RuleKind>().unwrap(), RuleKind::Exclude);
    }

    #[test]
    fn script_version_accepts_numbers() {
        let script: SmsScript = serde_json::from_value(json!({
            "ScriptGuid": "A1B2",
            "ScriptName": "Get-Uptime",
            "ScriptVersion": 3,
            "ApprovalState": 3
        }))
        .unwrap();
        assert_eq!(script.script_version.as_deref(), Some("3"));
        assert!(script.is_approved());
        assert!(script.script_hash.is_none());
    }
}
