//! `devlake_bitbucketserver_connection_scopeconfig`: settings applied to
//! Bitbucket Server scopes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::ref_diff::{self, RefDiffState};
use super::{
    absent_if_not_found, decode_state, encode_state, parse_composite_id, parse_id, rfc850_now,
    Resource,
};
use crate::client::models::{nullable, BitbucketServerConnectionScopeConfig};
use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, Usage};

pub const TYPE_NAME: &str = "devlake_bitbucketserver_connection_scopeconfig";

const DEFAULT_ENTITIES: [&str; 3] = ["CODEREVIEW", "CROSS", "CODE"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ScopeConfigState {
    id: Option<String>,
    last_updated: Option<String>,
    #[serde(deserialize_with = "nullable")]
    connection_id: String,
    created_at: Option<String>,
    entities: Option<Vec<String>>,
    #[serde(deserialize_with = "nullable")]
    name: String,
    pr_component: Option<String>,
    pr_type: Option<String>,
    ref_diff: Option<RefDiffState>,
    updated_at: Option<String>,
}

impl ScopeConfigState {
    fn to_wire(
        &self,
        created_at: String,
        updated_at: String,
    ) -> Result<BitbucketServerConnectionScopeConfig, ProviderError> {
        Ok(BitbucketServerConnectionScopeConfig {
            connection_id: parse_id("connection_id", &self.connection_id)?,
            created_at,
            id: 0,
            entities: self.entities.clone().unwrap_or_default(),
            name: self.name.clone(),
            pr_component: self.pr_component.clone().unwrap_or_default(),
            pr_type: self.pr_type.clone().unwrap_or_default(),
            ref_diff: Some(RefDiffState::to_wire(self.ref_diff.as_ref())),
            updated_at,
        })
    }

    fn refresh(&mut self, config: BitbucketServerConnectionScopeConfig) {
        self.id = Some(config.id.to_string());
        self.connection_id = config.connection_id.to_string();
        self.created_at = Some(config.created_at);
        self.entities = Some(config.entities);
        self.name = config.name;
        self.pr_component = Some(config.pr_component);
        self.pr_type = Some(config.pr_type);
        self.ref_diff = RefDiffState::from_wire(config.ref_diff);
        self.updated_at = Some(config.updated_at);
    }
}

/// `devlake_bitbucketserver_connection_scopeconfig`.
pub struct BitbucketServerConnectionScopeConfigResource;

#[async_trait::async_trait]
impl Resource for BitbucketServerConnectionScopeConfigResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .with_description("Manages a scope config of a Bitbucket Server connection.")
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
                "entities",
                Attribute::string_list(Usage::OptionalComputed)
                    .with_default(json!(DEFAULT_ENTITIES))
                    .with_description("Domain entities to collect, e.g. 'CODEREVIEW', 'CROSS' or 'CODE'."),
            )
            .with_attribute(
                "name",
                Attribute::string(Usage::Required).with_description("Name of the scope config."),
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
            .map_err(|e| e.context("Could not create devlake bitbucket server connection scope config"))?;

        let config = client
            .create_bitbucket_server_connection_scope_config(&state.connection_id, &request)
            .await
            .map_err(|e| {
                ProviderError::from(e).context(
                    "Could not create devlake bitbucket server connection scope config, unexpected error",
                )
            })?;

        info!(id = config.id, connection_id = config.connection_id, "created devlake bitbucket server scope config");
        state.refresh(config);
        state.last_updated = Some(now);
        encode_state(&state)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: ScopeConfigState = decode_state(state)?;
        let id = state.id.clone().unwrap_or_default();

        let config = absent_if_not_found(
            client
                .read_bitbucket_server_connection_scope_config(&state.connection_id, &id)
                .await,
        )
        .map_err(|e| {
            ProviderError::from(e).context("Unable to read devlake bitbucket server connection scope config")
        })?;

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
            .map_err(|e| e.context("Could not update devlake bitbucket server connection scope config"))?;

        let config = client
            .update_bitbucket_server_connection_scope_config(&state.connection_id, &id, &request)
            .await
            .map_err(|e| {
                ProviderError::from(e).context(
                    "Could not update devlake bitbucket server connection scope config, unexpected error",
                )
            })?;

        state.refresh(config);
        state.last_updated = Some(now);
        encode_state(&state)
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let state: ScopeConfigState = decode_state(state)?;
        let id = state.id.unwrap_or_default();
        client
            .delete_bitbucket_server_connection_scope_config(&state.connection_id, &id)
            .await
            .map_err(|e| {
                ProviderError::from(e).context(
                    "Could not delete devlake bitbucket server connection scope config, unexpected error",
                )
            })?;
        info!(%id, connection_id = %state.connection_id, "deleted devlake bitbucket server scope config");
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

    #[test]
    fn test_plan_defaults() {
        let result = plan(
            &BitbucketServerConnectionScopeConfigResource.schema(),
            None,
            &json!({"connection_id": "2", "name": "cfg"}),
        );
        assert_eq!(
            result.planned_state["entities"],
            json!(["CODEREVIEW", "CROSS", "CODE"])
        );
        assert_eq!(
            result.planned_state["ref_diff"],
            json!({"tags_limit": 10, "tags_pattern": ref_diff::DEFAULT_TAGS_PATTERN})
        );
    }

    #[test]
    fn test_refresh_without_ref_diff() {
        let mut state = ScopeConfigState {
            ref_diff: Some(RefDiffState::default()),
            ..Default::default()
        };
        state.refresh(BitbucketServerConnectionScopeConfig {
            id: 3,
            connection_id: 2,
            name: "cfg".into(),
            ..Default::default()
        });
        assert_eq!(state.id.as_deref(), Some("3"));
        assert_eq!(state.connection_id, "2");
        assert_eq!(state.ref_diff, None);
    }

    #[test]
    fn test_import_state() {
        assert_eq!(
            BitbucketServerConnectionScopeConfigResource
                .import_state("2,3")
                .unwrap(),
            json!({"connection_id": "2", "id": "3"})
        );
        let err = BitbucketServerConnectionScopeConfigResource
            .import_state(",3")
            .unwrap_err();
        assert!(err.to_string().contains("Unexpected Import Identifier"));
    }
}
