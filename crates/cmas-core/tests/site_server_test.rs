#![allow(clippy::unwrap_used)]
// Workflow tests for `SiteServer` against a wiremock Admin Service.

use std::collections::BTreeMap;

use base64::Engine as _;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cmas_api::AdminClient;
use cmas_core::{
    CollectionType, ConnectionConfig, CoreError, InvokeScript, NamePattern, NewCollection,
    RefreshType, RuleKind, ScriptOutput, ScriptRef, SiteServer, StatusQuery, VariableScope,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, SiteServer) {
    let server = MockServer::start().await;
    let client = AdminClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, SiteServer::from_client(client, "PS1"))
}

fn wmi_path(suffix: &str) -> String {
    format!("/AdminService/wmi/{suffix}")
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

async fn mount_collection_lookup(server: &MockServer, key: &str, rows: Value) {
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_Collection")))
        .and(query_param(
            "$filter",
            format!("CollectionID eq '{key}' or Name eq '{key}'"),
        ))
        .respond_with(ok(json!({ "value": rows })))
        .mount(server)
        .await;
}

fn collection(id: &str, name: &str) -> Value {
    json!({ "CollectionID": id, "Name": name, "CollectionType": 2 })
}

// ── Connection ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_reads_site_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_Site")))
        .respond_with(ok(json!({ "value": [{ "SiteCode": "PS1" }, { "SiteCode": "CS1" }] })))
        .expect(1)
        .mount(&server)
        .await;

    let site = SiteServer::connect(ConnectionConfig::new(server.uri()))
        .await
        .unwrap();
    assert_eq!(site.site_code(), "PS1");
    assert_eq!(site.server(), server.uri());
}

#[tokio::test]
async fn test_connect_site_code_override() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_Site")))
        .respond_with(ok(json!({ "value": [{ "SiteCode": "PS1" }] })))
        .mount(&server)
        .await;

    let mut config = ConnectionConfig::new(server.uri());
    config.site_code = Some("XY1".into());
    let site = SiteServer::connect(config).await.unwrap();
    assert_eq!(site.site_code(), "XY1");
}

#[tokio::test]
async fn test_connect_without_sites_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_Site")))
        .respond_with(ok(json!({ "value": [] })))
        .mount(&server)
        .await;

    let result = SiteServer::connect(ConnectionConfig::new(server.uri())).await;
    assert!(
        matches!(result, Err(CoreError::ConnectionFailed { .. })),
        "expected ConnectionFailed, got: {result:?}"
    );
}

#[tokio::test]
async fn test_independent_connections() {
    let (first_server, first) = setup().await;
    let (second_server, second) = setup().await;
    mount_collection_lookup(&first_server, "Pilot", json!([collection("PS100012", "Pilot")])).await;
    mount_collection_lookup(&second_server, "Pilot", json!([collection("XY100001", "Pilot")])).await;

    let a = first.resolve_collection("Pilot").await.unwrap();
    let b = second.resolve_collection("Pilot").await.unwrap();
    assert_eq!(a.collection_id, "PS100012");
    assert_eq!(b.collection_id, "XY100001");
}

// ── Collections ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_wildcard_lookup_filters_client_side() {
    let (server, site) = setup().await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_Collection")))
        .and(query_param("$filter", "startswith(Name,'TEST-')"))
        .respond_with(ok(json!({ "value": [
            collection("PS100001", "TEST-01"),
            collection("PS100002", "TEST-Lab"),
            collection("PS100003", "TEST_other"),
        ] })))
        .mount(&server)
        .await;

    let rows = site
        .get_collections(&cmas_core::CollectionQuery {
            name: Some(NamePattern::parse("TEST-*").unwrap()),
            ..Default::default()
        })
        .await
        .unwrap();
    let names: Vec<&str> = rows.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["TEST-01", "TEST-Lab"]);
}

#[tokio::test]
async fn test_ambiguous_name() {
    let (server, site) = setup().await;
    mount_collection_lookup(
        &server,
        "Pilot",
        json!([collection("PS100012", "Pilot"), collection("PS100013", "Pilot")]),
    )
    .await;

    let result = site.resolve_collection("Pilot").await;
    assert!(
        matches!(result, Err(CoreError::Ambiguous { count: 2, .. })),
        "expected Ambiguous, got: {result:?}"
    );
}

#[tokio::test]
async fn test_new_collection() {
    let (server, site) = setup().await;
    mount_collection_lookup(
        &server,
        "All Systems",
        json!([collection("SMS00001", "All Systems")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_Collection")))
        .and(query_param("$filter", "Name eq 'Pilot'"))
        .respond_with(ok(json!({ "value": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(wmi_path("SMS_Collection")))
        .and(body_json(json!({
            "Name": "Pilot",
            "CollectionType": 2,
            "LimitToCollectionID": "SMS00001",
            "RefreshType": 2,
            "Comment": "pilot ring"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "CollectionID": "PS100012",
            "Name": "Pilot",
            "CollectionType": 2,
            "LimitToCollectionID": "SMS00001"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = site
        .new_collection(&NewCollection {
            name: "Pilot".into(),
            limiting_collection: "All Systems".into(),
            kind: CollectionType::Device,
            refresh_type: RefreshType::Periodic,
            comment: Some("pilot ring".into()),
        })
        .await
        .unwrap();
    assert_eq!(created.collection_id, "PS100012");
}

#[tokio::test]
async fn test_new_collection_refuses_existing_name() {
    let (server, site) = setup().await;
    mount_collection_lookup(
        &server,
        "SMS00001",
        json!([collection("SMS00001", "All Systems")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_Collection")))
        .and(query_param("$filter", "Name eq 'Pilot'"))
        .respond_with(ok(json!({ "value": [collection("PS100012", "Pilot")] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(wmi_path("SMS_Collection")))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let result = site
        .new_collection(&NewCollection {
            name: "Pilot".into(),
            limiting_collection: "SMS00001".into(),
            kind: CollectionType::Device,
            refresh_type: RefreshType::Manual,
            comment: None,
        })
        .await;
    assert!(
        matches!(result, Err(CoreError::Conflict { .. })),
        "expected Conflict, got: {result:?}"
    );
}

// ── Membership rules ────────────────────────────────────────────────

async fn mount_rules(server: &MockServer) {
    mount_collection_lookup(server, "Pilot", json!([collection("PS100012", "Pilot")])).await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_Collection('PS100012')")))
        .respond_with(ok(json!({
            "CollectionID": "PS100012",
            "Name": "Pilot",
            "CollectionRules": [
                {
                    "@odata.type": "#AdminService.SMS_CollectionRuleDirect",
                    "RuleName": "PC01",
                    "ResourceClassName": "SMS_R_System",
                    "ResourceID": 16777220
                },
                {
                    "@odata.type": "#AdminService.SMS_CollectionRuleQuery",
                    "RuleName": "Laptops",
                    "QueryExpression": "select * from SMS_R_System",
                    "QueryID": 1
                },
                {
                    "@odata.type": "#AdminService.SMS_CollectionRuleIncludeCollection",
                    "RuleName": "Lab",
                    "IncludeCollectionID": "PS100003"
                }
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_rules_filtered_by_kind() {
    let (server, site) = setup().await;
    mount_rules(&server).await;

    let rules = site
        .get_membership_rules("Pilot", Some(RuleKind::Query), None)
        .await
        .unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].rule_name.as_deref(), Some("Laptops"));
}

#[tokio::test]
async fn test_add_direct_rules_skips_existing_and_duplicates() {
    let (server, site) = setup().await;
    mount_rules(&server).await;

    for (id, name) in [(16_777_220_u32, "PC01"), (16_777_221, "PC02"), (16_777_222, "PC03")] {
        Mock::given(method("GET"))
            .and(path(wmi_path(&format!("SMS_R_System({id})"))))
            .respond_with(ok(json!({ "ResourceID": id, "Name": name })))
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path(wmi_path(
            "SMS_Collection('PS100012')/AdminService.AddMembershipRule",
        )))
        .and(body_partial_json(json!({ "collectionRule": { "ResourceID": 16777221 } })))
        .respond_with(ok(json!({ "ReturnValue": 0 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(wmi_path(
            "SMS_Collection('PS100012')/AdminService.AddMembershipRule",
        )))
        .and(body_partial_json(json!({ "collectionRule": { "ResourceID": 16777222 } })))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "code": "500", "message": "The rule already exists." }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = site
        .add_direct_rules(
            "Pilot",
            &["16777220".into(), "16777221".into(), "16777222".into()],
        )
        .await
        .unwrap();
    assert_eq!(outcome.applied, ["PC02"]);
    let skipped: Vec<&str> = outcome.skipped.iter().map(|s| s.item.as_str()).collect();
    assert_eq!(skipped, ["PC01", "PC03"]);
}

#[tokio::test]
async fn test_add_direct_rules_resolves_every_device_first() {
    let (server, site) = setup().await;
    mount_rules(&server).await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_R_System(16777221)")))
        .respond_with(ok(json!({ "ResourceID": 16777221, "Name": "PC02" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(wmi_path(
            "SMS_Collection('PS100012')/AdminService.AddMembershipRule",
        )))
        .respond_with(ok(json!({ "ReturnValue": 0 })))
        .expect(0)
        .mount(&server)
        .await;

    let result = site
        .add_direct_rules("Pilot", &["16777221".into(), "16777299".into()])
        .await;
    assert!(
        matches!(result, Err(ref e) if e.is_not_found()),
        "expected NotFound, got: {result:?}"
    );
}

#[tokio::test]
async fn test_add_query_rule_skips_existing_name() {
    let (server, site) = setup().await;
    mount_rules(&server).await;
    Mock::given(method("POST"))
        .and(path(wmi_path(
            "SMS_Collection('PS100012')/AdminService.AddMembershipRule",
        )))
        .respond_with(ok(json!({ "ReturnValue": 0 })))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = site
        .add_query_rule("Pilot", "laptops", "select * from SMS_R_System")
        .await
        .unwrap();
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].item, "laptops");
}

#[tokio::test]
async fn test_include_and_exclude_post_resolved_ids() {
    let (server, site) = setup().await;
    mount_rules(&server).await;
    mount_collection_lookup(&server, "Servers", json!([collection("PS100004", "Servers")])).await;
    Mock::given(method("POST"))
        .and(path(wmi_path(
            "SMS_Collection('PS100012')/AdminService.AddMembershipRule",
        )))
        .and(body_partial_json(json!({ "collectionRule": {
            "@odata.type": "#AdminService.SMS_CollectionRuleIncludeCollection",
            "IncludeCollectionID": "PS100004"
        } })))
        .respond_with(ok(json!({ "ReturnValue": 0 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(wmi_path(
            "SMS_Collection('PS100012')/AdminService.AddMembershipRule",
        )))
        .and(body_partial_json(json!({ "collectionRule": {
            "@odata.type": "#AdminService.SMS_CollectionRuleExcludeCollection",
            "ExcludeCollectionID": "PS100004"
        } })))
        .respond_with(ok(json!({ "ReturnValue": 0 })))
        .expect(1)
        .mount(&server)
        .await;

    let included = site.add_include_rule("Pilot", "Servers").await.unwrap();
    assert_eq!(included.collection_id, "PS100012");
    assert_eq!(included.applied, ["Servers"]);

    let excluded = site.add_exclude_rule("Pilot", "Servers").await.unwrap();
    assert_eq!(excluded.applied, ["Servers"]);
}

#[tokio::test]
async fn test_include_existing_reference_is_skipped() {
    let (server, site) = setup().await;
    mount_rules(&server).await;
    mount_collection_lookup(&server, "Lab", json!([collection("PS100003", "Lab")])).await;
    Mock::given(method("POST"))
        .and(path(wmi_path(
            "SMS_Collection('PS100012')/AdminService.AddMembershipRule",
        )))
        .respond_with(ok(json!({ "ReturnValue": 0 })))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = site.add_include_rule("Pilot", "Lab").await.unwrap();
    assert!(outcome.applied.is_empty());
    let skipped: Vec<&str> = outcome.skipped.iter().map(|s| s.item.as_str()).collect();
    assert_eq!(skipped, ["Lab"]);
}

#[tokio::test]
async fn test_collection_cannot_reference_itself() {
    let (server, site) = setup().await;
    mount_rules(&server).await;
    mount_collection_lookup(&server, "PS100012", json!([collection("PS100012", "Pilot")])).await;
    Mock::given(method("POST"))
        .and(path(wmi_path(
            "SMS_Collection('PS100012')/AdminService.AddMembershipRule",
        )))
        .respond_with(ok(json!({ "ReturnValue": 0 })))
        .expect(0)
        .mount(&server)
        .await;

    let result = site.add_exclude_rule("Pilot", "PS100012").await;
    assert!(
        matches!(result, Err(CoreError::ValidationFailed { .. })),
        "expected ValidationFailed, got: {result:?}"
    );
}

#[tokio::test]
async fn test_remove_rules_without_match_is_not_found() {
    let (server, site) = setup().await;
    mount_rules(&server).await;

    let pattern = NamePattern::parse("Desktops*").unwrap();
    let result = site
        .remove_membership_rules("Pilot", None, Some(&pattern))
        .await;
    assert!(
        matches!(result, Err(ref e) if e.is_not_found()),
        "expected NotFound, got: {result:?}"
    );
}

// ── Variables ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_new_variable_creates_settings() {
    let (server, site) = setup().await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_MachineSettings(16777220)")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(wmi_path("SMS_MachineSettings")))
        .and(body_json(json!({
            "ResourceID": 16777220,
            "SourceSite": "PS1",
            "LocaleID": 1033,
            "MachineVariables": [{ "Name": "Role", "Value": "Kiosk", "IsMasked": false }]
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    site.new_variable(&VariableScope::Device(16_777_220), "Role", "Kiosk", false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_new_variable_refuses_existing_name() {
    let (server, site) = setup().await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_CollectionSettings('PS100012')")))
        .respond_with(ok(json!({
            "CollectionID": "PS100012",
            "LocaleID": 1033,
            "CollectionVariables": [{ "Name": "OSDRole", "Value": "Kiosk", "IsMasked": false }]
        })))
        .mount(&server)
        .await;

    let scope = VariableScope::Collection("PS100012".into());
    let result = site.new_variable(&scope, "osdrole", "x", false).await;
    assert!(
        matches!(result, Err(ref e) if e.is_conflict()),
        "expected Conflict, got: {result:?}"
    );
}

#[tokio::test]
async fn test_remove_all_variables_keeps_empty_settings() {
    let (server, site) = setup().await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_CollectionSettings('PS100012')")))
        .respond_with(ok(json!({
            "CollectionID": "PS100012",
            "LocaleID": 1033,
            "CollectionVariables": [
                { "Name": "A", "Value": "1", "IsMasked": false },
                { "Name": "B", "Value": null, "IsMasked": true }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(wmi_path("SMS_CollectionSettings('PS100012')")))
        .and(body_json(json!({
            "CollectionID": "PS100012",
            "LocaleID": 1033,
            "CollectionVariables": []
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let scope = VariableScope::Collection("PS100012".into());
    let removed = site.remove_variables(&scope, None).await.unwrap();
    assert_eq!(removed.len(), 2);
}

async fn mount_collection_settings(server: &MockServer, variables: Value) {
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_CollectionSettings('PS100012')")))
        .respond_with(ok(json!({
            "CollectionID": "PS100012",
            "LocaleID": 1033,
            "CollectionVariables": variables
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_set_variable_rewrites_whole_array() {
    let (server, site) = setup().await;
    mount_collection_settings(
        &server,
        json!([
            { "Name": "OSDRole", "Value": "Kiosk", "IsMasked": false },
            { "Name": "JoinPassword", "Value": null, "IsMasked": true }
        ]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path(wmi_path("SMS_CollectionSettings('PS100012')")))
        .and(body_json(json!({
            "CollectionID": "PS100012",
            "LocaleID": 1033,
            "CollectionVariables": [
                { "Name": "OSDRole", "Value": "Desktop", "IsMasked": false },
                { "Name": "JoinPassword", "Value": null, "IsMasked": true }
            ]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let scope = VariableScope::Collection("PS100012".into());
    let updated = site
        .set_variable(&scope, "osdrole", "Desktop", None)
        .await
        .unwrap();
    assert_eq!(updated.name, "OSDRole");
    assert_eq!(updated.value.as_deref(), Some("Desktop"));
    assert!(!updated.is_masked);
}

#[tokio::test]
async fn test_set_missing_variable_is_not_found() {
    let (server, site) = setup().await;
    mount_collection_settings(
        &server,
        json!([{ "Name": "OSDRole", "Value": "Kiosk", "IsMasked": false }]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path(wmi_path("SMS_CollectionSettings('PS100012')")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let scope = VariableScope::Collection("PS100012".into());
    let result = site.set_variable(&scope, "Missing", "x", None).await;
    assert!(
        matches!(result, Err(ref e) if e.is_not_found()),
        "expected NotFound, got: {result:?}"
    );
}

#[tokio::test]
async fn test_remove_variables_by_pattern_keeps_the_rest() {
    let (server, site) = setup().await;
    mount_collection_settings(
        &server,
        json!([
            { "Name": "AppRole", "Value": "Web", "IsMasked": false },
            { "Name": "Keep", "Value": "1", "IsMasked": false },
            { "Name": "AppTier", "Value": "2", "IsMasked": false }
        ]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path(wmi_path("SMS_CollectionSettings('PS100012')")))
        .and(body_json(json!({
            "CollectionID": "PS100012",
            "LocaleID": 1033,
            "CollectionVariables": [{ "Name": "Keep", "Value": "1", "IsMasked": false }]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let scope = VariableScope::Collection("PS100012".into());
    let pattern = NamePattern::parse("App*").unwrap();
    let removed = site.remove_variables(&scope, Some(&pattern)).await.unwrap();
    let names: Vec<&str> = removed.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["AppRole", "AppTier"]);
}

// ── Scripts ─────────────────────────────────────────────────────────

const SCRIPT_GUID: &str = "6F1E2D3C-0000-4A5B-9C8D-112233445566";
// <ScriptParameters><ScriptParameter Name="ComputerName" Type="System.String" IsRequired="true" IsHidden="false"/></ScriptParameters>
const SCHEMA_B64: &str = "PFNjcmlwdFBhcmFtZXRlcnM+PFNjcmlwdFBhcmFtZXRlciBOYW1lPSJDb21wdXRlck5hbWUiIFR5cGU9IlN5c3RlbS5TdHJpbmciIElzUmVxdWlyZWQ9InRydWUiIElzSGlkZGVuPSJmYWxzZSIvPjwvU2NyaXB0UGFyYW1ldGVycz4=";

async fn mount_script(server: &MockServer, approval_state: u32) {
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_Scripts")))
        .and(query_param("$filter", "ScriptName eq 'Get-Uptime'"))
        .respond_with(ok(json!({ "value": [{
            "ScriptGuid": SCRIPT_GUID,
            "ScriptName": "Get-Uptime",
            "ApprovalState": approval_state
        }] })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(wmi_path(&format!("SMS_Scripts('{SCRIPT_GUID}')"))))
        .respond_with(ok(json!({
            "ScriptGuid": SCRIPT_GUID,
            "ScriptName": "Get-Uptime",
            "ScriptVersion": "2",
            "ScriptType": 0,
            "ScriptHash": "ABC123",
            "ApprovalState": approval_state,
            "ParamsDefinition": SCHEMA_B64,
            "ParameterlessScript": false
        })))
        .mount(server)
        .await;
}

async fn mount_client_operation(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(wmi_path(
            "SMS_ClientOperation/AdminService.InitiateClientOperationEx",
        )))
        .respond_with(ok(json!({ "OperationID": 16777302, "ReturnValue": 0 })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn run(parameters: &[(&str, &str)]) -> InvokeScript {
    InvokeScript {
        script: ScriptRef::Name("Get-Uptime".into()),
        collection: None,
        resource_ids: vec![16_777_220],
        parameters: parameters
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[tokio::test]
async fn test_invoke_script_missing_parameter_fails_before_post() {
    let (server, site) = setup().await;
    mount_script(&server, 3).await;
    mount_client_operation(&server, 0).await;

    let result = site.invoke_script(&run(&[])).await;
    assert!(
        matches!(result, Err(CoreError::ValidationFailed { ref message }) if message.contains("ComputerName")),
        "expected ValidationFailed, got: {result:?}"
    );
}

#[tokio::test]
async fn test_invoke_script_unapproved() {
    let (server, site) = setup().await;
    mount_script(&server, 1).await;
    mount_client_operation(&server, 0).await;

    let result = site
        .invoke_script(&run(&[("ComputerName", "PC01")]))
        .await;
    assert!(
        matches!(result, Err(CoreError::ScriptNotApproved { state: 1, .. })),
        "expected ScriptNotApproved, got: {result:?}"
    );
}

#[tokio::test]
async fn test_invoke_script_without_hash_is_lazy_property() {
    let (server, site) = setup().await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_Scripts")))
        .and(query_param("$filter", "ScriptName eq 'Get-Uptime'"))
        .respond_with(ok(json!({ "value": [{
            "ScriptGuid": SCRIPT_GUID,
            "ScriptName": "Get-Uptime",
            "ApprovalState": 3
        }] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(wmi_path(&format!("SMS_Scripts('{SCRIPT_GUID}')"))))
        .respond_with(ok(json!({
            "ScriptGuid": SCRIPT_GUID,
            "ScriptName": "Get-Uptime",
            "ScriptVersion": "2",
            "ScriptType": 0,
            "ApprovalState": 3,
            "ParameterlessScript": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_client_operation(&server, 0).await;

    let result = site.invoke_script(&run(&[])).await;
    assert!(
        matches!(
            result,
            Err(CoreError::LazyPropertyMissing {
                property: "ScriptHash",
                ..
            })
        ),
        "expected LazyPropertyMissing, got: {result:?}"
    );
}

#[tokio::test]
async fn test_invoke_script_needs_a_target() {
    let (_server, site) = setup().await;
    let mut request = run(&[]);
    request.resource_ids.clear();

    let result = site.invoke_script(&request).await;
    assert!(
        matches!(result, Err(CoreError::ValidationFailed { .. })),
        "expected ValidationFailed, got: {result:?}"
    );
}

#[tokio::test]
async fn test_invoke_script_posts_envelope() {
    let (server, site) = setup().await;
    mount_script(&server, 3).await;
    mount_client_operation(&server, 1).await;

    let invocation = site
        .invoke_script(&run(&[("ComputerName", "PC01")]))
        .await
        .unwrap();
    assert_eq!(invocation.operation_id, 16_777_302);
    assert_eq!(invocation.collection_id, "SMS00001");
    assert_eq!(invocation.script_guid, SCRIPT_GUID);

    let requests = server.received_requests().await.unwrap();
    let post = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    let body: Value = serde_json::from_slice(&post.body).unwrap();
    assert_eq!(body["Type"], 135);
    assert_eq!(body["TargetCollectionID"], "SMS00001");
    assert_eq!(body["TargetResourceIDs"], json!([16777220]));

    let envelope = base64::engine::general_purpose::STANDARD
        .decode(body["Param"].as_str().unwrap())
        .unwrap();
    let envelope = String::from_utf8(envelope).unwrap();
    assert!(envelope.starts_with(&format!("<ScriptContent ScriptGuid='{SCRIPT_GUID}'>")));
    assert!(envelope.contains("ParameterValue=\"PC01\""));
    assert!(envelope.contains(
        "<ParameterGroupHash ParameterHashAlg='SHA256'>62DEF3591B90DB4F318FD98C8E57E193366E6F00A0C896DE0E7C73F990489BF1</ParameterGroupHash>"
    ));
}

#[tokio::test]
async fn test_execution_status_parses_output() {
    let (server, site) = setup().await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_ScriptsExecutionTask")))
        .and(query_param("$filter", "ClientOperationId eq 16777302"))
        .respond_with(ok(json!({ "value": [{
            "ClientOperationId": 16777302,
            "ScriptName": "Get-Uptime",
            "TotalClients": 2,
            "CompletedClients": 2
        }] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_ScriptsExecutionStatus")))
        .and(query_param("$filter", "ClientOperationId eq 16777302"))
        .respond_with(ok(json!({ "value": [
            { "ClientOperationId": 16777302, "DeviceName": "PC01", "ScriptExitCode": 0,
              "ScriptOutput": "{\"Days\":3}" },
            { "ClientOperationId": 16777302, "DeviceName": "PC02", "ScriptExitCode": 0,
              "ScriptOutput": "up 3 days" }
        ] })))
        .mount(&server)
        .await;

    let reports = site
        .script_execution_status(&StatusQuery {
            operation_id: Some(16_777_302),
            ..StatusQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);
    let outputs: Vec<Option<ScriptOutput>> =
        reports[0].results.iter().map(|r| r.output.clone()).collect();
    assert_eq!(
        outputs,
        [
            Some(ScriptOutput::Json(json!({ "Days": 3 }))),
            Some(ScriptOutput::Text("up 3 days".into())),
        ]
    );
}

// ── Raw requests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_raw_request_passes_filter_through() {
    let (server, site) = setup().await;
    Mock::given(method("GET"))
        .and(path(wmi_path("SMS_R_System")))
        .and(query_param("$filter", "Name eq 'PC01'"))
        .respond_with(ok(json!({ "value": [{ "ResourceID": 16777220, "Name": "PC01" }] })))
        .mount(&server)
        .await;

    let value = site
        .raw_request("get", "/wmi/SMS_R_System", Some("Name eq 'PC01'"), None)
        .await
        .unwrap();
    assert_eq!(value["value"][0]["ResourceID"], json!(16_777_220));
}

#[tokio::test]
async fn test_raw_request_rejects_bad_verb() {
    let (_server, site) = setup().await;
    let err = site
        .raw_request("GE T", "wmi/SMS_Site", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));
}
