//! `devlake_github_connection_scope`: a GitHub repository tracked under a connection.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{
    absent_if_not_found, decode_state, encode_state, parse_composite_id, parse_id, rfc3339_now,
    Resource,
};
use crate::client::models::{nullable, GithubConnectionScope};
use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, Usage};

pub const TYPE_NAME: &str = "devlake_github_connection_scope";

const GITHUB_URL: &str = "https://github.com/";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ScopeState {
    #[serde(deserialize_with = "nullable")]
    id: String,
    last_updated: Option<String>,
    #[serde(deserialize_with = "nullable")]
    connection_id: String,
    created_at: Option<String>,
    description: Option<String>,
    #[serde(deserialize_with = "nullable")]
    full_name: String,
    #[serde(deserialize_with = "nullable")]
    scope_config_id: String,
}

impl ScopeState {
    fn to_wire(&self, created_at: String, updated_at: String) -> Result<GithubConnectionScope, ProviderError> {
        let name = match self.full_name.split_once('/') {
            Some((_, repo)) if !repo.is_empty() => repo.to_string(),
            _ => {
                return Err(ProviderError::Validation(format!(
                    "full_name must have the form '<ORG>/<REPOSITORY>', got {:?}",
                    self.full_name
                )))
            },
        };

        Ok(GithubConnectionScope {
            github_id: parse_id("id", &self.id)?,
            clone_url: format!("{}{}.git", GITHUB_URL, self.full_name),
            connection_id: parse_id("connection_id", &self.connection_id)?,
            created_at: created_at.clone(),
            description: self.description.clone().unwrap_or_default(),
            full_name: self.full_name.clone(),
            html_url: format!("{}{}", GITHUB_URL, self.full_name),
            name,
            scope_config_id: parse_id("scope_config_id", &self.scope_config_id)?,
            updated_at: updated_at.clone(),
            created_date: created_at,
            updated_date: updated_at,
        })
    }

    fn refresh(&mut self, scope: GithubConnectionScope) {
        self.id = scope.github_id.to_string();
        self.connection_id = scope.connection_id.to_string();
        self.created_at = Some(scope.created_at);
        self.description = Some(scope.description);
        self.full_name = scope.full_name;
        self.scope_config_id = scope.scope_config_id.to_string();
    }
}

/// `devlake_github_connection_scope`: a repository collected by a connection.
///
/// Imported with `<connection_id>,<repository_id>`.
pub struct GithubConnectionScopeResource;

#[async_trait::async_trait]
impl Resource for GithubConnectionScopeResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .with_description("Manages a GitHub repository tracked by a DevLake connection.")
            .with_attribute(
                "id",
                Attribute::string(Usage::Required)
                    .requires_replace()
                    .with_description("The id of the repository in GitHub."),
            )
            .with_attribute(
                "last_updated",
                Attribute::string(Usage::Computed)
                    .use_state_for_unknown()
                    .with_description("Timestamp of the last update of the scope by the provider."),
            )
            .with_attribute(
                "connection_id",
                Attribute::string(Usage::Required)
                    .requires_replace()
                    .with_description("The connection this scope is part of."),
            )
            .with_attribute(
                "created_at",
                Attribute::string(Usage::Computed)
                    .use_state_for_unknown()
                    .with_description("When the scope was created in DevLake."),
            )
            .with_attribute(
                "description",
                Attribute::string(Usage::OptionalComputed)
                    .with_default(json!(""))
                    .with_description("A description of the scope."),
            )
            .with_attribute(
                "full_name",
                Attribute::string(Usage::Required)
                    .with_description("The GitHub organization and repository as '<ORG>/<REPOSITORY>'."),
            )
            .with_attribute(
                "scope_config_id",
                Attribute::string(Usage::Required)
                    .with_description("The scope config applied to this scope. Needs to be created first."),
            )
    }

    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut state: ScopeState = decode_state(planned)?;
        let now = rfc3339_now();
        let request = state
            .to_wire(now.clone(), now.clone())
            .map_err(|e| e.context("Could not create devlake github connection scope"))?;

        let scope = client
            .create_github_connection_scope(&state.connection_id, &request)
            .await
            .map_err(|e| {
                ProviderError::from(e).context("Could not create devlake github connection scope, unexpected error")
            })?;

        info!(id = scope.github_id, full_name = %scope.full_name, "created devlake github scope");
        state.refresh(scope);
        state.last_updated = Some(now);
        encode_state(&state)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: ScopeState = decode_state(state)?;

        let scope = absent_if_not_found(
            client
                .read_github_connection_scope(&state.connection_id, &state.id)
                .await,
        )
        .map_err(|e| ProviderError::from(e).context("Unable to read devlake github connection scope"))?;

        match scope {
            Some(scope) => {
                state.refresh(scope);
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
        let prior: ScopeState = decode_state(prior)?;
        let mut state: ScopeState = decode_state(planned)?;

        let now = rfc3339_now();
        let created_at = state.created_at.clone().or(prior.created_at).unwrap_or_default();
        let request = state
            .to_wire(created_at, now.clone())
            .map_err(|e| e.context("Could not update devlake github connection scope"))?;

        let scope = client
            .update_github_connection_scope(&state.connection_id, &state.id, &request)
            .await
            .map_err(|e| {
                ProviderError::from(e).context("Could not update devlake github connection scope, unexpected error")
            })?;

        state.refresh(scope);
        state.last_updated = Some(now);
        encode_state(&state)
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let state: ScopeState = decode_state(state)?;
        client
            .delete_github_connection_scope(&state.connection_id, &state.id)
            .await
            .map_err(|e| {
                ProviderError::from(e).context("Could not delete devlake github connection scope, unexpected error")
            })?;
        info!(id = %state.id, connection_id = %state.connection_id, "deleted devlake github scope");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        let (connection_id, id) = parse_composite_id(id, "connection_id,scope_id")?;
        Ok(json!({"connection_id": connection_id, "id": id}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(full_name: &str) -> ScopeState {
        ScopeState {
            id: "42".into(),
            connection_id: "1".into(),
            full_name: full_name.into(),
            scope_config_id: "2".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_wire_derives_urls_from_full_name() {
        let wire = state("apache/incubator-devlake")
            .to_wire("c".into(), "u".into())
            .unwrap();
        assert_eq!(wire.name, "incubator-devlake");
        assert_eq!(wire.clone_url, "https://github.com/apache/incubator-devlake.git");
        assert_eq!(wire.html_url, "https://github.com/apache/incubator-devlake");
        assert_eq!(wire.github_id, 42);
        assert_eq!(wire.created_date, "c");
        assert_eq!(wire.updated_date, "u");
    }

    #[test]
    fn test_wire_rejects_full_name_without_org() {
        for bad in ["devlake", "apache/"] {
            let err = state(bad).to_wire(String::new(), String::new()).unwrap_err();
            assert!(err.to_string().contains("full_name"), "{}", err);
        }
    }

    #[test]
    fn test_wire_rejects_non_numeric_ids() {
        let mut bad = state("org/repo");
        bad.scope_config_id = "cfg".into();
        assert!(bad.to_wire(String::new(), String::new()).is_err());
    }

    #[test]
    fn test_import_state() {
        assert_eq!(
            GithubConnectionScopeResource.import_state("1,42").unwrap(),
            json!({"connection_id": "1", "id": "42"})
        );
        assert!(GithubConnectionScopeResource.import_state("1,42,3").is_err());
    }
}
