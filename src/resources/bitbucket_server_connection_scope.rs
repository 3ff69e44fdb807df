//! `devlake_bitbucketserver_connection_scope`: a Bitbucket Server repository
//! tracked under a connection.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{
    absent_if_not_found, decode_state, encode_state, parse_composite_id, parse_id, rfc3339_now,
    Resource,
};
use crate::client::models::{nullable, BitbucketServerConnectionScope};
use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, Usage};

pub const TYPE_NAME: &str = "devlake_bitbucketserver_connection_scope";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ScopeState {
    #[serde(deserialize_with = "nullable")]
    id: String,
    last_updated: Option<String>,
    #[serde(deserialize_with = "nullable")]
    clone_url: String,
    #[serde(deserialize_with = "nullable")]
    connection_id: String,
    created_at: Option<String>,
    #[serde(deserialize_with = "nullable")]
    description: String,
    #[serde(deserialize_with = "nullable")]
    html_url: String,
    #[serde(deserialize_with = "nullable")]
    name: String,
    #[serde(deserialize_with = "nullable")]
    scope_config_id: String,
}

impl ScopeState {
    fn to_wire(
        &self,
        created_at: String,
        updated_at: String,
    ) -> Result<BitbucketServerConnectionScope, ProviderError> {
        Ok(BitbucketServerConnectionScope {
            bitbucket_id: self.id.clone(),
            clone_url: self.clone_url.clone(),
            connection_id: parse_id("connection_id", &self.connection_id)?,
            created_at,
            description: self.description.clone(),
            html_url: self.html_url.clone(),
            name: self.name.clone(),
            scope_config_id: parse_id("scope_config_id", &self.scope_config_id)?,
            updated_at,
        })
    }

    fn refresh(&mut self, scope: BitbucketServerConnectionScope) {
        self.id = scope.bitbucket_id;
        self.clone_url = scope.clone_url;
        self.connection_id = scope.connection_id.to_string();
        self.created_at = Some(scope.created_at);
        self.description = scope.description;
        self.html_url = scope.html_url;
        self.name = scope.name;
        self.scope_config_id = scope.scope_config_id.to_string();
    }
}

/// `devlake_bitbucketserver_connection_scope`.
///
/// Imported with `<connection_id>,<PROJECT/repos/REPOSITORY>`.
pub struct BitbucketServerConnectionScopeResource;

#[async_trait::async_trait]
impl Resource for BitbucketServerConnectionScopeResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .with_description("Manages a Bitbucket Server repository tracked by a DevLake connection.")
            .with_attribute(
                "id",
                Attribute::string(Usage::Required)
                    .requires_replace()
                    .with_description("The project and repository as '<PROJECT>/repos/<REPOSITORY>'."),
            )
            .with_attribute(
                "last_updated",
                Attribute::string(Usage::Computed)
                    .use_state_for_unknown()
                    .with_description("Timestamp of the last update of the scope by the provider."),
            )
            .with_attribute(
                "clone_url",
                Attribute::string(Usage::Required).with_description("The https clone url of the repository."),
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
                Attribute::string(Usage::Required).with_description("A description of the scope."),
            )
            .with_attribute(
                "html_url",
                Attribute::string(Usage::Required).with_description("The browse url of the repository."),
            )
            .with_attribute(
                "name",
                Attribute::string(Usage::Required).with_description("A name for the scope."),
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
            .map_err(|e| e.context("Could not create devlake bitbucket server connection scope"))?;

        let scope = client
            .create_bitbucket_server_connection_scope(&state.connection_id, &request)
            .await
            .map_err(|e| {
                ProviderError::from(e)
                    .context("Could not create devlake bitbucket server connection scope, unexpected error")
            })?;

        info!(id = %scope.bitbucket_id, connection_id = scope.connection_id, "created devlake bitbucket server scope");
        state.refresh(scope);
        state.last_updated = Some(now);
        encode_state(&state)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: ScopeState = decode_state(state)?;

        let scope = absent_if_not_found(
            client
                .read_bitbucket_server_connection_scope(&state.connection_id, &state.id)
                .await,
        )
        .map_err(|e| ProviderError::from(e).context("Unable to read devlake bitbucket server connection scope"))?;

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
            .map_err(|e| e.context("Could not update devlake bitbucket server connection scope"))?;

        let scope = client
            .update_bitbucket_server_connection_scope(&state.connection_id, &state.id, &request)
            .await
            .map_err(|e| {
                ProviderError::from(e)
                    .context("Could not update devlake bitbucket server connection scope, unexpected error")
            })?;

        state.refresh(scope);
        state.last_updated = Some(now);
        encode_state(&state)
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let state: ScopeState = decode_state(state)?;
        client
            .delete_bitbucket_server_connection_scope(&state.connection_id, &state.id)
            .await
            .map_err(|e| {
                ProviderError::from(e)
                    .context("Could not delete devlake bitbucket server connection scope, unexpected error")
            })?;
        info!(id = %state.id, connection_id = %state.connection_id, "deleted devlake bitbucket server scope");
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
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn planned() -> Value {
        json!({
            "id": "PROJ/repos/app",
            "last_updated": null,
            "clone_url": "https://bitbucket.example.com/scm/proj/app.git",
            "connection_id": "2",
            "created_at": null,
            "description": "the app",
            "html_url": "https://bitbucket.example.com/projects/PROJ/repos/app/browse",
            "name": "app",
            "scope_config_id": "3"
        })
    }

    #[tokio::test]
    async fn test_create_puts_scope_list() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/plugins/bitbucket_server/connections/2/scopes"))
            .and(body_partial_json(json!({"data": [{
                "bitbucketId": "PROJ/repos/app",
                "connectionId": 2,
                "scopeConfigId": 3,
                "name": "app"
            }]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "bitbucketId": "PROJ/repos/app",
                "cloneUrl": "https://bitbucket.example.com/scm/proj/app.git",
                "connectionId": 2,
                "createdAt": "2024-01-01T00:00:00Z",
                "description": "the app",
                "HTMLUrl": "https://bitbucket.example.com/projects/PROJ/repos/app/browse",
                "name": "app",
                "scopeConfigId": 3
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(Some(&server.uri()), Some("tok")).unwrap();
        let state = BitbucketServerConnectionScopeResource
            .create(&client, planned())
            .await
            .unwrap();

        assert_eq!(state["id"], "PROJ/repos/app");
        assert_eq!(state["created_at"], "2024-01-01T00:00:00Z");
        assert_eq!(state["scope_config_id"], "3");
        assert!(state["last_updated"].is_string());
    }

    #[test]
    fn test_import_keeps_slashes_in_scope_id() {
        assert_eq!(
            BitbucketServerConnectionScopeResource
                .import_state("2,PROJ/repos/app")
                .unwrap(),
            json!({"connection_id": "2", "id": "PROJ/repos/app"})
        );
    }
}
