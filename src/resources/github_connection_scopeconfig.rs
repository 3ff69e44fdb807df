//! `devlake_github_connection_scopeconfig`: collection and transformation
//! settings applied to GitHub scopes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::ref_diff::{self, RefDiffState};
use super::{
    absent_if_not_found, decode_state, encode_state, parse_composite_id, parse_id, rfc850_now,
    Resource,
};
use crate::client::models::{nullable, GithubConnectionScopeConfig};
use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, Usage};

pub const TYPE_NAME: &str = "devlake_github_connection_scopeconfig";

const DEFAULT_ENTITIES: [&str; 4] = ["CODE", "CODEREVIEW", "CROSS", "CICD"];
const DEFAULT_ISSUE_COMPONENT: &str = "component(.*)";
const DEFAULT_ISSUE_PRIORITY: &str = "(highest|high|medium|low|p0|p1|p2|p3)";
const DEFAULT_ISSUE_SEVERITY: &str = "severity(.*)";
const DEFAULT_ISSUE_TYPE_BUG: &str = "(bug|broken)";
const DEFAULT_ISSUE_TYPE_INCIDENT: &str = "(incident|failure)";
const DEFAULT_ISSUE_TYPE_REQUIREMENT: &str = "(feat|feature|proposal|requirement)";
const DEFAULT_PR_BODY_CLOSE_PATTERN: &str = r"(?mi)(fix|close|resolve|fixes|closes|resolves|fixed|closed|resolved)[\s]*.*(((and )?(#|https:\/\/github.com\/%s\/issues\/)\d+[ ]*)+)";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ScopeConfigState {
    id: Option<String>,
    last_updated: Option<String>,
    #[serde(deserialize_with = "nullable")]
    connection_id: String,
    created_at: Option<String>,
    deployment_pattern: Option<String>,
    entities: Option<Vec<String>>,
    env_name_pattern: Option<String>,
    issue_component: Option<String>,
    issue_priority: Option<String>,
    issue_severity: Option<String>,
    issue_type_bug: Option<String>,
    issue_type_incident: Option<String>,
    issue_type_requirement: Option<String>,
    #[serde(deserialize_with = "nullable")]
    name: String,
    pr_body_close_pattern: Option<String>,
    pr_component: Option<String>,
    pr_type: Option<String>,
    production_pattern: Option<String>,
    ref_diff: Option<RefDiffState>,
    updated_at: Option<String>,
}

impl ScopeConfigState {
    fn to_wire(&self, created_at: String, updated_at: String) -> Result<GithubConnectionScopeConfig, ProviderError> {
        Ok(GithubConnectionScopeConfig {
            connection_id: parse_id("connection_id", &self.connection_id)?,
            created_at,
            id: 0,
            deployment_pattern: self.deployment_pattern.clone().unwrap_or_default(),
            entities: self.entities.clone().unwrap_or_default(),
            env_name_pattern: self.env_name_pattern.clone().unwrap_or_default(),
            issue_component: self.issue_component.clone().unwrap_or_default(),
            issue_priority: self.issue_priority.clone().unwrap_or_default(),
            issue_severity: self.issue_severity.clone().unwrap_or_default(),
            issue_type_bug: self.issue_type_bug.clone().unwrap_or_default(),
            issue_type_incident: self.issue_type_incident.clone().unwrap_or_default(),
            issue_type_requirement: self.issue_type_requirement.clone().unwrap_or_default(),
            name: self.name.clone(),
            pr_body_close_pattern: self.pr_body_close_pattern.clone().unwrap_or_default(),
            pr_component: self.pr_component.clone().unwrap_or_default(),
            pr_type: self.pr_type.clone().unwrap_or_default(),
            production_pattern: self.production_pattern.clone().unwrap_or_default(),
            ref_diff: Some(RefDiffState::to_wire(self.ref_diff.as_ref())),
            updated_at,
        })
    }

    fn refresh(&mut self, config: GithubConnectionScopeConfig) {
        self.id = Some(config.id.to_string());
        self.connection_id = config.connection_id.to_string();
        self.created_at = Some(config.created_at);
        self.deployment_pattern = Some(config.deployment_pattern);
        self.entities = Some(config.entities);
        self.env_name_pattern = Some(config.env_name_pattern);
        self.issue_component = Some(config.issue_component);
        self.issue_priority = Some(config.issue_priority);
        self.issue_severity = Some(config.issue_severity);
        self.issue_type_bug = Some(config.issue_type_bug);
        self.issue_type_incident = Some(config.issue_type_incident);
        self.issue_type_requirement = Some(config.issue_type_requirement);
        self.name = config.name;
        self.pr_body_close_pattern = Some(config.pr_body_close_pattern);
        self.pr_component = Some(config.pr_component);
        self.pr_type = Some(config.pr_type);
        self.production_pattern = Some(config.production_pattern);
        self.ref_diff = RefDiffState::from_wire(config.ref_diff);
        self.updated_at = Some(config.updated_at);
    }
}

fn pattern(default: &str, description: &str) -> Attribute {
    Attribute::string(Usage::OptionalComputed)
        .with_default(json!(default))
        .with_description(description)
}

/// `devlake_github_connection_scopeconfig`.
pub struct GithubConnectionScopeConfigResource;

#[async_trait::async_trait]
impl Resource for GithubConnectionScopeConfigResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .with_description("Manages a scope config of a GitHub connection.")
            .with_attribute(
                "id",
                Attribute::string(Usage::Computed)
                    .use_state_for_unknown()
                    .with_description("Numeric identifier of the scope config."),
            )
            .with_attribute(
                "last_updated",
                Attribute::string(Usage::Computed)
                    .use_state_for_unknown()
                    .with_description("Timestamp of the last update of the scope config by the provider."),
            )
            .with_attribute(
                "connection_id",
                Attribute::string(Usage::Required)
                    .requires_replace()
                    .with_description("The connection this scope config belongs to."),
            )
            .with_attribute(
                "created_at",
                Attribute::string(Usage::Computed)
                    .use_state_for_unknown()
                    .with_description("When the scope config was created in DevLake."),
            )
            .with_attribute(
                "deployment_pattern",
                pattern(
                    "",
                    "Treat a workflow run as a deployment when its name or one of its jobs matches this pattern.",
                ),
            )
            .with_attribute(
                "entities",
                Attribute::string_list(Usage::OptionalComputed)
                    .with_default(json!(DEFAULT_ENTITIES))
                    .with_description("Domain entities to collect, e.g. 'CODE', 'CODEREVIEW', 'CROSS' or 'CICD'."),
            )
            .with_attribute(
                "env_name_pattern",
                pattern("", "Deployments whose environment matches this pattern count as production."),
            )
            .with_attribute(
                "issue_component",
                pattern(DEFAULT_ISSUE_COMPONENT, "Label pattern giving an issue's component."),
            )
            .with_attribute(
                "issue_priority",
                pattern(DEFAULT_ISSUE_PRIORITY, "Label pattern giving an issue's priority."),
            )
            .with_attribute(
                "issue_severity",
                pattern(DEFAULT_ISSUE_SEVERITY, "Label pattern giving an issue's severity."),
            )
            .with_attribute(
                "issue_type_bug",
                pattern(DEFAULT_ISSUE_TYPE_BUG, "Label pattern marking an issue as a bug."),
            )
            .with_attribute(
                "issue_type_incident",
                pattern(DEFAULT_ISSUE_TYPE_INCIDENT, "Label pattern marking an issue as an incident."),
            )
            .with_attribute(
                "issue_type_requirement",
                pattern(DEFAULT_ISSUE_TYPE_REQUIREMENT, "Label pattern marking an issue as a requirement."),
            )
            .with_attribute(
                "name",
                Attribute::string(Usage::Required).with_description("Name of the scope config."),
            )
            .with_attribute(
                "pr_body_close_pattern",
                pattern(
                    DEFAULT_PR_BODY_CLOSE_PATTERN,
                    "Pattern in a pull request body linking the issues it closes.",
                ),
            )
            .with_attribute(
                "pr_component",
                Attribute::string(Usage::OptionalComputed)
                    .with_description("Label pattern giving a pull request's component."),
            )
            .with_attribute(
                "pr_type",
                Attribute::string(Usage::OptionalComputed)
                    .with_description("Label pattern giving a pull request's type."),
            )
            .with_attribute(
                "production_pattern",
                Attribute::string(Usage::OptionalComputed)
                    .use_state_for_unknown()
                    .with_description("Deployments whose name matches this pattern count as production."),
            )
            .with_attribute(
                "updated_at",
                Attribute::string(Usage::Computed)
                    .with_description("When the scope config was last updated in DevLake."),
            )
            .with_block("ref_diff", ref_diff::block())
    }

    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut state: ScopeConfigState = decode_state(planned)?;
        let now = rfc850_now();
        let request = state
            .to_wire(now.clone(), now.clone())
            .map_err(|e| e.context("Could not create devlake github connection scope config"))?;

        let config = client
            .create_github_connection_scope_config(&state.connection_id, &request)
            .await
            .map_err(|e| {
                ProviderError::from(e)
                    .context("Could not create devlake github connection scope config, unexpected error")
            })?;

        info!(id = config.id, connection_id = config.connection_id, "created devlake github scope config");
        state.refresh(config);
        state.last_updated = Some(now);
        encode_state(&state)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: ScopeConfigState = decode_state(state)?;
        let id = state.id.clone().unwrap_or_default();

        let config = absent_if_not_found(
            client
                .read_github_connection_scope_config(&state.connection_id, &id)
                .await,
        )
        .map_err(|e| ProviderError::from(e).context("Unable to read devlake github connection scope config"))?;

        match config {
            Some(config) => {
                state.refresh(config);
                Ok(Some(encode_state(&state)?))
            },
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        client: &Client,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: ScopeConfigState = decode_state(prior)?;
        let mut state: ScopeConfigState = decode_state(planned)?;
        let id = prior.id.clone().unwrap_or_default();
        parse_id("id", &id)?;

        let now = rfc850_now();
        let created_at = state.created_at.clone().or(prior.created_at).unwrap_or_default();
        let request = state
            .to_wire(created_at, now.clone())
            .map_err(|e| e.context("Could not update devlake github connection scope config"))?;

        let config = client
            .update_github_connection_scope_config(&state.connection_id, &id, &request)
            .await
            .map_err(|e| {
                ProviderError::from(e)
                    .context("Could not update devlake github connection scope config, unexpected error")
            })?;

        state.refresh(config);
        state.last_updated = Some(now);
        encode_state(&state)
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let state: ScopeConfigState = decode_state(state)?;
        let id = state.id.unwrap_or_default();
        client
            .delete_github_connection_scope_config(&state.connection_id, &id)
            .await
            .map_err(|e| {
                ProviderError::from(e)
                    .context("Could not delete devlake github connection scope config, unexpected error")
            })?;
        info!(%id, connection_id = %state.connection_id, "deleted devlake github scope config");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        let (connection_id, id) = parse_composite_id(id, "connection_id,scopeconfig_id")?;
        Ok(json!({"connection_id": connection_id, "id": id}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_plan_fills_pattern_defaults() {
        let result = plan(
            &GithubConnectionScopeConfigResource.schema(),
            None,
            &json!({"connection_id": "1", "name": "cfg"}),
        );
        let planned = &result.planned_state;
        assert_eq!(planned["entities"], json!(["CODE", "CODEREVIEW", "CROSS", "CICD"]));
        assert_eq!(planned["issue_type_bug"], "(bug|broken)");
        assert_eq!(planned["deployment_pattern"], "");
        assert_eq!(planned["ref_diff"]["tags_limit"], 10);
        assert!(planned["production_pattern"].is_null());
    }

    #[test]
    fn test_import_requires_composite_id() {
        let state = GithubConnectionScopeConfigResource.import_state("1,7").unwrap();
        assert_eq!(state, json!({"connection_id": "1", "id": "7"}));

        let err = GithubConnectionScopeConfigResource.import_state("7").unwrap_err();
        assert!(err.to_string().contains("connection_id,scopeconfig_id"));
    }

    #[tokio::test]
    async fn test_create_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/plugins/github/connections/1/scope-configs"))
            .and(body_partial_json(json!({
                "connectionId": 1,
                "name": "cfg",
                "entities": ["CODE", "CODEREVIEW", "CROSS", "CICD"],
                "refdiff": {"tagsLimit": 10}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 7,
                "connectionId": 1,
                "name": "cfg",
                "entities": ["CODE", "CODEREVIEW", "CROSS", "CICD"],
                "issueTypeBug": "(bug|broken)",
                "productionPattern": "prod",
                "refdiff": {"tagsLimit": 10, "tagsPattern": "v.*"},
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(Some(&server.uri()), Some("tok")).unwrap();
        let planned = plan(
            &GithubConnectionScopeConfigResource.schema(),
            None,
            &json!({"connection_id": "1", "name": "cfg"}),
        )
        .planned_state;
        let state = GithubConnectionScopeConfigResource
            .create(&client, planned)
            .await
            .unwrap();

        assert_eq!(state["id"], "7");
        assert_eq!(state["connection_id"], "1");
        assert_eq!(state["production_pattern"], "prod");
        assert_eq!(state["ref_diff"], json!({"tags_limit": 10, "tags_pattern": "v.*"}));
    }

    #[tokio::test]
    async fn test_create_rejects_non_numeric_connection() {
        let client = Client::new(Some("http://127.0.0.1:9"), Some("tok")).unwrap();
        let err = GithubConnectionScopeConfigResource
            .create(&client, json!({"connection_id": "abc", "name": "cfg"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }
}
