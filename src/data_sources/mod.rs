//! Read-only data sources.

mod apikeys;

use std::sync::Arc;

use serde_json::Value;

use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::Schema;

pub use apikeys::ApiKeysDataSource;

/// A data source backed by the DevLake API.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// The data source type name, e.g. `devlake_apikeys`.
    fn type_name(&self) -> &'static str;

    /// Shape of the data source, all computed.
    fn schema(&self) -> Schema;

    /// Fetch the data. `config` is the practitioner's block, already validated.
    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError>;
}

/// Every data source this provider registers.
pub fn all() -> Vec<Arc<dyn DataSource>> {
    vec![Arc::new(ApiKeysDataSource)]
}
