//! `devlake_apikeys`: every API key known to DevLake.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::client::models::ApiKey;
use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema, Usage};

pub const TYPE_NAME: &str = "devlake_apikeys";

#[derive(Debug, Serialize)]
struct ApiKeysState {
    apikeys: Vec<ApiKeyModel>,
}

#[derive(Debug, Serialize)]
struct ApiKeyModel {
    id: i64,
    allowed_path: String,
    api_key: String,
    created_at: String,
    creator: String,
    creator_email: String,
    expired_at: String,
    extra: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    updated_at: String,
    updater: String,
    updater_email: String,
}

impl From<ApiKey> for ApiKeyModel {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            allowed_path: key.allowed_path,
            api_key: key.api_key,
            created_at: key.created_at,
            creator: key.creator,
            creator_email: key.creator_email,
            expired_at: key.expired_at,
            extra: key.extra,
            name: key.name,
            kind: key.kind,
            updated_at: key.updated_at,
            updater: key.updater,
            updater_email: key.updater_email,
        }
    }
}

/// `devlake_apikeys`: every API key DevLake knows.
pub struct ApiKeysDataSource;

#[async_trait::async_trait]
impl DataSource for ApiKeysDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        let key = [
            ("allowed_path", "Regular expression of API paths the key may access."),
            ("api_key", "The key secret, usually masked by the API."),
            ("created_at", "When the key was created."),
            ("creator", "Who created the key."),
            ("creator_email", "Email of the creator."),
            ("expired_at", "When the key expires."),
            ("extra", "Extra information stored with the key."),
            ("name", "Name of the key."),
            ("type", "The key type."),
            ("updated_at", "When the key was last updated."),
            ("updater", "Who last updated the key."),
            ("updater_email", "Email of the last updater."),
        ]
        .into_iter()
        .fold(
            Block::new().with_attribute(
                "id",
                Attribute::int64(Usage::Computed).with_description("Numeric identifier of the key."),
            ),
            |block, (name, description)| {
                block.with_attribute(name, Attribute::string(Usage::Computed).with_description(description))
            },
        );

        Schema::new()
            .with_description("Lists the API keys of the DevLake instance.")
            .with_block("apikeys", NestedBlock::list(key))
    }

    async fn read(&self, client: &Client, _config: Value) -> Result<Value, ProviderError> {
        let keys = client
            .list_api_keys()
            .await
            .map_err(|e| ProviderError::from(e).context("Unable to read devlake api keys"))?;
        debug!(count = keys.len(), "read devlake api keys");

        let state = ApiKeysState {
            apikeys: keys.into_iter().map(ApiKeyModel::from).collect(),
        };
        Ok(serde_json::to_value(state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_schema_lists_every_field() {
        let schema = ApiKeysDataSource.schema();
        let block = &schema.block.blocks["apikeys"].block;
        assert_eq!(block.attributes.len(), 13);
        assert!(block.attributes.values().all(|a| a.flags.is_computed_only()));
    }

    #[tokio::test]
    async fn test_read_maps_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api-keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "apikeys": [{
                    "id": 1,
                    "allowedPath": ".*",
                    "apiKey": "****",
                    "creator": "admin",
                    "creatorEmail": "admin@example.com",
                    "name": "ci",
                    "type": "devlake"
                }]
            })))
            .mount(&server)
            .await;

        let client = Client::new(Some(&server.uri()), Some("tok")).unwrap();
        let state = ApiKeysDataSource.read(&client, json!({})).await.unwrap();

        let key = &state["apikeys"][0];
        assert_eq!(key["id"], 1);
        assert_eq!(key["allowed_path"], ".*");
        assert_eq!(key["creator_email"], "admin@example.com");
        assert_eq!(key["type"], "devlake");
        assert_eq!(key["updater"], "");
    }

    #[tokio::test]
    async fn test_read_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api-keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"apikeys": null})))
            .mount(&server)
            .await;

        let client = Client::new(Some(&server.uri()), Some("tok")).unwrap();
        let state = ApiKeysDataSource.read(&client, json!({})).await.unwrap();
        assert_eq!(state, json!({"apikeys": []}));
    }
}
