//! `devlake_bitbucketserver_connection`: a Bitbucket Server data-source connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{absent_if_not_found, decode_state, encode_state, parse_id, rfc850_now, Resource};
use crate::client::models::{nullable, BitbucketServerConnection};
use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, Usage};

pub const TYPE_NAME: &str = "devlake_bitbucketserver_connection";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ConnectionState {
    id: Option<String>,
    last_updated: Option<String>,
    created_at: Option<String>,
    #[serde(deserialize_with = "nullable")]
    endpoint: String,
    #[serde(deserialize_with = "nullable")]
    name: String,
    #[serde(deserialize_with = "nullable")]
    password: String,
    proxy: Option<String>,
    rate_limit_per_hour: Option<i64>,
    updated_at: Option<String>,
    #[serde(deserialize_with = "nullable")]
    username: String,
}

impl ConnectionState {
    fn to_wire(&self, created_at: String, updated_at: String) -> BitbucketServerConnection {
        BitbucketServerConnection {
            id: 0,
            created_at,
            endpoint: self.endpoint.clone(),
            name: self.name.clone(),
            password: self.password.clone(),
            proxy: self.proxy.clone().unwrap_or_default(),
            rate_limit_per_hour: self.rate_limit_per_hour.unwrap_or_default(),
            updated_at,
            username: self.username.clone(),
        }
    }

    /// The password is kept as configured; the API never returns it in clear.
    fn refresh(&mut self, connection: BitbucketServerConnection) {
        self.id = Some(connection.id.to_string());
        self.created_at = Some(connection.created_at);
        self.endpoint = connection.endpoint;
        self.name = connection.name;
        self.proxy = Some(connection.proxy);
        self.rate_limit_per_hour = Some(connection.rate_limit_per_hour);
        self.updated_at = Some(connection.updated_at);
        self.username = connection.username;
    }
}

/// `devlake_bitbucketserver_connection`, authenticated with username and password.
pub struct BitbucketServerConnectionResource;

#[async_trait::async_trait]
impl Resource for BitbucketServerConnectionResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .with_description("Manages a Bitbucket Server connection in DevLake.")
            .with_attribute(
                "id",
                Attribute::string(Usage::Computed)
                    .use_state_for_unknown()
                    .with_description("Numeric identifier of the connection."),
            )
            .with_attribute(
                "last_updated",
                Attribute::string(Usage::Computed)
                    .with_description("Timestamp of the last update of the connection by the provider."),
            )
            .with_attribute(
                "created_at",
                Attribute::string(Usage::Computed)
                    .use_state_for_unknown()
                    .with_description("When the connection was created in DevLake."),
            )
            .with_attribute(
                "endpoint",
                Attribute::string(Usage::Required)
                    .with_description("The Bitbucket Server REST endpoint, e.g. 'https://bitbucket.example.com/rest/'."),
            )
            .with_attribute(
                "name",
                Attribute::string(Usage::Required).with_description("Name of the connection."),
            )
            .with_attribute(
                "password",
                Attribute::string(Usage::Required)
                    .sensitive()
                    .with_description("Password or access token of the Bitbucket user."),
            )
            .with_attribute(
                "proxy",
                Attribute::string(Usage::OptionalComputed)
                    .with_description("Proxy used to reach Bitbucket Server."),
            )
            .with_attribute(
                "rate_limit_per_hour",
                Attribute::int64(Usage::OptionalComputed)
                    .with_description("Maximum number of requests per hour. 0 lets DevLake decide."),
            )
            .with_attribute(
                "updated_at",
                Attribute::string(Usage::Computed)
                    .with_description("When the connection was last updated in DevLake."),
            )
            .with_attribute(
                "username",
                Attribute::string(Usage::Required).with_description("The Bitbucket user to authenticate as."),
            )
    }

    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut state: ConnectionState = decode_state(planned)?;
        let now = rfc850_now();
        let request = state.to_wire(now.clone(), now.clone());

        let connection = client
            .create_bitbucket_server_connection(&request)
            .await
            .map_err(|e| {
                ProviderError::from(e)
                    .context("Could not create devlake bitbucket server connection, unexpected error")
            })?;

        info!(id = connection.id, name = %connection.name, "created devlake bitbucket server connection");
        state.refresh(connection);
        state.last_updated = Some(now);
        encode_state(&state)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: ConnectionState = decode_state(state)?;
        let id = state.id.clone().unwrap_or_default();

        let connection = absent_if_not_found(client.read_bitbucket_server_connection(&id).await)
            .map_err(|e| ProviderError::from(e).context("Unable to read devlake bitbucket server connection"))?;

        match connection {
            Some(connection) => {
                state.refresh(connection);
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
        let prior: ConnectionState = decode_state(prior)?;
        let mut state: ConnectionState = decode_state(planned)?;
        let id = prior.id.clone().unwrap_or_default();
        parse_id("id", &id)?;

        let now = rfc850_now();
        let created_at = state.created_at.clone().or(prior.created_at).unwrap_or_default();
        let request = state.to_wire(created_at, now.clone());

        let connection = client
            .update_bitbucket_server_connection(&id, &request)
            .await
            .map_err(|e| {
                ProviderError::from(e)
                    .context("Could not update devlake bitbucket server connection, unexpected error")
            })?;

        state.refresh(connection);
        state.last_updated = Some(now);
        encode_state(&state)
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let state: ConnectionState = decode_state(state)?;
        let id = state.id.unwrap_or_default();
        client.delete_bitbucket_server_connection(&id).await.map_err(|e| {
            ProviderError::from(e).context("Could not delete devlake bitbucket server connection, unexpected error")
        })?;
        info!(%id, "deleted devlake bitbucket server connection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_update_patches_by_prior_id_and_keeps_password() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/plugins/bitbucket_server/connections/4"))
            .and(body_partial_json(json!({
                "name": "renamed",
                "password": "hunter2",
                "createdAt": "then"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 4,
                "name": "renamed",
                "endpoint": "https://bitbucket.example.com/rest/",
                "username": "bot",
                "password": "",
                "createdAt": "then",
                "updatedAt": "now"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(Some(&server.uri()), Some("tok")).unwrap();
        let prior = json!({
            "id": "4",
            "created_at": "then",
            "endpoint": "https://bitbucket.example.com/rest/",
            "name": "bb",
            "password": "hunter2",
            "username": "bot"
        });
        let planned = json!({
            "id": "4",
            "created_at": "then",
            "endpoint": "https://bitbucket.example.com/rest/",
            "name": "renamed",
            "password": "hunter2",
            "username": "bot",
            "last_updated": null,
            "updated_at": null
        });

        let state = BitbucketServerConnectionResource
            .update(&client, prior, planned)
            .await
            .unwrap();
        assert_eq!(state["name"], "renamed");
        assert_eq!(state["password"], "hunter2");
        assert_eq!(state["updated_at"], "now");
        assert!(state["last_updated"].is_string());
    }

    #[test]
    fn test_import_passes_id_through() {
        assert_eq!(
            BitbucketServerConnectionResource.import_state("4").unwrap(),
            json!({"id": "4"})
        );
    }
}
