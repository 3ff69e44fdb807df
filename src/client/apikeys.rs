//! `/api-keys` endpoints.

use tracing::instrument;

use super::models::{ApiKey, ApiKeyCreate, ApiKeyList, JsonBody};
use super::Client;
use crate::error::ClientError;

impl Client {
    /// Create an API key. The response carries the generated secret.
    #[instrument(skip(self, key), fields(name = %key.name))]
    pub async fn create_api_key(&self, key: &ApiKeyCreate) -> Result<ApiKey, ClientError> {
        self.create(self.url(&["api-keys"])?, key).await
    }

    /// List all API keys.
    #[instrument(skip(self))]
    pub async fn list_api_keys(&self) -> Result<Vec<ApiKey>, ClientError> {
        let list: ApiKeyList = self.read(self.url(&["api-keys"])?).await?;
        Ok(list.apikeys)
    }

    /// Delete an API key by id.
    #[instrument(skip(self))]
    pub async fn delete_api_key(&self, id: &str) -> Result<(), ClientError> {
        let body = self.delete(self.url(&["api-keys", id])?).await?;
        check_envelope(&body)
    }
}

/// Fail if `body` is a `JsonBody` reporting `success: false`. An empty body is success.
pub(crate) fn check_envelope(body: &[u8]) -> Result<(), ClientError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }
    let envelope: JsonBody = serde_json::from_slice(body)?;
    if envelope.success {
        Ok(())
    } else {
        Err(ClientError::Api(envelope.message))
    }
}
