use devlake_provider::testing::{assert_error_contains, ProviderTester, TestError};
use devlake_provider::types::UNKNOWN_VALUE;
use devlake_provider::{DevlakeProvider, ProviderError, ProviderService};
use serde_json::json;

fn tester() -> ProviderTester<DevlakeProvider> {
    ProviderTester::new(DevlakeProvider::new("test"))
}

#[test]
fn metadata_lists_every_type() {
    let metadata = DevlakeProvider::new("test").metadata();
    assert_eq!(
        metadata.resources,
        vec![
            "devlake_apikey",
            "devlake_bitbucketserver_connection",
            "devlake_bitbucketserver_connection_scope",
            "devlake_bitbucketserver_connection_scopeconfig",
            "devlake_github_connection",
            "devlake_github_connection_scope",
            "devlake_github_connection_scopeconfig",
        ]
    );
    assert_eq!(metadata.data_sources, vec!["devlake_apikeys"]);
}

#[test]
fn provider_token_is_sensitive() {
    let schema = tester().schema();
    let token = &schema.provider.block.attributes["token"];
    assert!(token.flags.sensitive);
    assert!(token.flags.optional);
}

#[tokio::test]
async fn configure_rejects_unknown_values() {
    let diagnostics = tester()
        .configure_diagnostics(json!({"host": UNKNOWN_VALUE, "token": UNKNOWN_VALUE}))
        .await
        .unwrap();

    assert_eq!(diagnostics.len(), 2);
    assert_error_contains(&diagnostics, "Unknown devlake api host");
    assert_error_contains(&diagnostics, "Unknown devlake api token");
    assert_eq!(diagnostics[0].attribute.as_deref(), Some("host"));
}

#[tokio::test]
async fn configure_rejects_empty_values() {
    let diagnostics = tester()
        .configure_diagnostics(json!({"host": "", "token": ""}))
        .await
        .unwrap();

    assert_error_contains(&diagnostics, "Missing devlake api host");
    assert_error_contains(&diagnostics, "Missing devlake api token");
}

#[tokio::test]
async fn configure_rejects_unparseable_host() {
    let err = tester()
        .configure(json!({"host": "not a url", "token": "t"}))
        .await
        .unwrap_err();

    assert_eq!(err.summaries(), vec!["Unable to create devlake api client".to_string()]);
}

#[tokio::test]
async fn configure_rejects_wrongly_typed_values() {
    let err = tester()
        .configure(json!({"host": 8080, "token": "t"}))
        .await
        .unwrap_err();
    assert!(matches!(err, TestError::Diagnostics(_)));
}

#[tokio::test]
async fn resources_need_a_configured_provider() {
    let tester = tester();
    let err = tester.destroy("devlake_github_connection", json!({"id": "1"})).await.unwrap_err();
    assert!(matches!(err, ProviderError::Configuration(_)));
}

#[tokio::test]
async fn unknown_types_are_rejected() {
    let tester = tester();
    tester
        .configure(json!({"host": "http://devlake:8080", "token": "t"}))
        .await
        .unwrap();

    let err = tester.plan("devlake_gitlab_connection", None, json!({})).await.unwrap_err();
    assert!(matches!(err, ProviderError::UnknownResource(_)));

    let err = tester.read_data_source("devlake_projects", json!({})).await.unwrap_err();
    assert!(matches!(err, TestError::Provider(ProviderError::UnknownResource(_))));
}

#[tokio::test]
async fn missing_required_attributes_fail_validation() {
    let err = tester()
        .validate_resource_config("devlake_apikey", json!({"name": "ci"}))
        .await
        .unwrap_err();

    let summaries = err.summaries().join("\n");
    assert!(summaries.contains("allowed_path"), "{}", summaries);
    assert!(summaries.contains("expired_at"), "{}", summaries);
}
