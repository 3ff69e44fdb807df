//! `devlake_apikey`: an API key for the DevLake REST API.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{decode_state, encode_state, rfc850_now, Resource};
use crate::client::models::{nullable, ApiKey, ApiKeyCreate};
use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, Usage};

pub const TYPE_NAME: &str = "devlake_apikey";

const DEFAULT_TYPE: &str = "devlake";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ApiKeyState {
    id: Option<String>,
    last_updated: Option<String>,
    #[serde(deserialize_with = "nullable")]
    allowed_path: String,
    api_key: Option<String>,
    #[serde(deserialize_with = "nullable")]
    expired_at: String,
    #[serde(deserialize_with = "nullable")]
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl ApiKeyState {
    fn refresh(&mut self, key: ApiKey) {
        self.id = Some(key.id.to_string());
        self.allowed_path = key.allowed_path;
        self.expired_at = key.expired_at;
        self.name = key.name;
        self.kind = Some(key.kind);
    }
}

/// `devlake_apikey`. Every configurable attribute forces replacement.
pub struct ApiKeyResource;

#[async_trait::async_trait]
impl Resource for ApiKeyResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .with_description("Manages an API key for the DevLake REST API.")
            .with_attribute(
                "id",
                Attribute::string(Usage::Computed)
                    .use_state_for_unknown()
                    .with_description("Numeric identifier of the api key."),
            )
            .with_attribute(
                "last_updated",
                Attribute::string(Usage::Computed)
                    .with_description("Timestamp of the last update of the api key by the provider."),
            )
            .with_attribute(
                "allowed_path",
                Attribute::string(Usage::Required)
                    .requires_replace()
                    .with_description("Regular expression of API paths the key may access, e.g. '.*'."),
            )
            .with_attribute(
                "api_key",
                Attribute::string(Usage::Computed)
                    .sensitive()
                    .with_description("The generated secret. Only available after creation."),
            )
            .with_attribute(
                "expired_at",
                Attribute::string(Usage::Required)
                    .requires_replace()
                    .with_description("Expiry date in RFC 3339 format, e.g. '2030-01-01T00:00:00Z'."),
            )
            .with_attribute(
                "name",
                Attribute::string(Usage::Required)
                    .requires_replace()
                    .with_description("Name of the api key."),
            )
            .with_attribute(
                "type",
                Attribute::string(Usage::Computed)
                    .with_default(json!(DEFAULT_TYPE))
                    .requires_replace()
                    .with_description("The api key type. Currently only 'devlake' is valid."),
            )
    }

    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut state: ApiKeyState = decode_state(planned)?;

        let request = ApiKeyCreate {
            allowed_path: state.allowed_path.clone(),
            expired_at: state.expired_at.clone(),
            name: state.name.clone(),
            kind: state.kind.clone().unwrap_or_else(|| DEFAULT_TYPE.to_string()),
        };
        let key = client
            .create_api_key(&request)
            .await
            .map_err(|e| ProviderError::from(e).context("Could not create apikey, unexpected error"))?;

        info!(id = key.id, name = %key.name, "created devlake api key");
        state.api_key = Some(key.api_key.clone());
        state.refresh(key);
        state.last_updated = Some(rfc850_now());
        encode_state(&state)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: ApiKeyState = decode_state(state)?;
        let id = state.id.clone().unwrap_or_default();

        let keys = client
            .list_api_keys()
            .await
            .map_err(|e| ProviderError::from(e).context("Unable to read devlake api keys"))?;

        match keys.into_iter().find(|key| key.id.to_string() == id) {
            Some(key) => {
                state.refresh(key);
                Ok(Some(encode_state(&state)?))
            },
            None => {
                warn!(%id, "devlake api key no longer exists");
                Ok(None)
            },
        }
    }

    /// Every configurable attribute forces replacement, so there is nothing to send.
    async fn update(
        &self,
        _client: &Client,
        prior: Value,
        _planned: Value,
    ) -> Result<Value, ProviderError> {
        Ok(prior)
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let state: ApiKeyState = decode_state(state)?;
        let id = state.id.unwrap_or_default();
        client
            .delete_api_key(&id)
            .await
            .map_err(|e| ProviderError::from(e).context("Could not delete apikey, unexpected error"))?;
        info!(%id, "deleted devlake api key");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_plan_fills_type_and_replaces_on_name_change() {
        let schema = ApiKeyResource.schema();
        let created = plan(
            &schema,
            None,
            &json!({"allowed_path": ".*", "expired_at": "2030-01-01T00:00:00Z", "name": "ci"}),
        );
        assert_eq!(created.planned_state["type"], "devlake");
        assert!(created.planned_state["api_key"].is_null());

        let prior = json!({
            "id": "1",
            "last_updated": "Monday, 02-Jan-06 15:04:05 UTC",
            "allowed_path": ".*",
            "api_key": "secret",
            "expired_at": "2030-01-01T00:00:00Z",
            "name": "ci",
            "type": "devlake"
        });
        let renamed = plan(
            &schema,
            Some(&prior),
            &json!({"allowed_path": ".*", "expired_at": "2030-01-01T00:00:00Z", "name": "cd"}),
        );
        assert!(renamed.requires_replace);
    }

    #[tokio::test]
    async fn test_read_keeps_secret_and_drops_missing_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api-keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "apikeys": [{
                    "id": 1,
                    "allowedPath": ".*",
                    "expiredAt": "2030-01-01T00:00:00Z",
                    "name": "ci",
                    "type": "devlake"
                }]
            })))
            .mount(&server)
            .await;
        let client = Client::new(Some(&server.uri()), Some("tok")).unwrap();

        let state = json!({"id": "1", "api_key": "secret", "last_updated": "then", "name": "old"});
        let refreshed = ApiKeyResource.read(&client, state).await.unwrap().unwrap();
        assert_eq!(refreshed["name"], "ci");
        assert_eq!(refreshed["api_key"], "secret");
        assert_eq!(refreshed["last_updated"], "then");

        let gone = ApiKeyResource.read(&client, json!({"id": "2"})).await.unwrap();
        assert!(gone.is_none());
    }
}
