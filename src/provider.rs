//! The DevLake provider.
//!
//! [`DevlakeProvider`] implements [`ProviderService`] by dispatching each
//! operation to the registered [`Resource`] or [`DataSource`] for the
//! requested type. `configure` builds the shared API client.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::client::Client;
use crate::config::ProviderConfig;
use crate::data_sources::{self, DataSource};
use crate::error::ProviderError;
use crate::plan;
use crate::resources::{self, Resource};
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

/// Infrastructure-as-code provider for Apache DevLake.
pub struct DevlakeProvider {
    version: String,
    client: RwLock<Option<Arc<Client>>>,
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
}

impl DevlakeProvider {
    /// A provider reporting `version`, with every DevLake resource and data
    /// source registered. It has no API client until `configure` succeeds.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            client: RwLock::new(None),
            resources: resources::all().into_iter().map(|r| (r.type_name(), r)).collect(),
            data_sources: data_sources::all()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
        }
    }

    /// The version passed to [`DevlakeProvider::new`].
    pub fn version(&self) -> &str {
        &self.version
    }

    fn resource(&self, resource_type: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&Arc<dyn DataSource>, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }

    async fn client(&self) -> Result<Arc<Client>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "the provider has not been configured; call Configure before managing resources".to_string(),
            )
        })
    }
}

#[async_trait::async_trait]
impl ProviderService for DevlakeProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema {
            provider: ProviderConfig::schema(),
            resources: self
                .resources
                .iter()
                .map(|(name, resource)| (name.to_string(), resource.schema()))
                .collect(),
            data_sources: self
                .data_sources
                .iter()
                .map(|(name, data_source)| (name.to_string(), data_source.schema()))
                .collect(),
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&ProviderConfig::schema(), &config))
    }

    #[instrument(skip(self, config), fields(version = %self.version))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        info!("configuring devlake client");

        let diagnostics = validate(&ProviderConfig::schema(), &config);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let settings = match ProviderConfig::resolve(&config) {
            Ok(settings) => settings,
            Err(diagnostics) => return Ok(diagnostics),
        };

        debug!(devlake_host = %settings.host, "creating devlake client");
        let client = match settings.client() {
            Ok(client) => client,
            Err(e) => {
                return Ok(vec![Diagnostic::error("Unable to create devlake api client").with_detail(
                    format!(
                        "An unexpected error occurred when creating the devlake api client.\n\n\
                         devlake client error: {}",
                        e
                    ),
                )])
            },
        };

        *self.client.write().await = Some(Arc::new(client));
        info!(devlake_host = %settings.host, "configured devlake client");
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.client.write().await.take();
        debug!("released devlake client");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        Ok(validate(&resource.schema(), &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        _proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        Ok(plan::plan(&resource.schema(), prior_state.as_ref(), &config))
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.create(&client, planned_state).await
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let state = resource.read(&client, current_state).await?;
        if state.is_none() {
            info!(resource_type, "remote object is gone, removing from state");
        }
        Ok(state.unwrap_or(Value::Null))
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.update(&client, prior_state, planned_state).await
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.delete(&client, current_state).await
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let partial = resource.import_state(id)?;
        let client = self.client().await?;

        let state = resource.read(&client, partial).await?.ok_or_else(|| {
            ProviderError::NotFound(format!(
                "Cannot import non-existent remote object: {} {:?}",
                resource_type, id
            ))
        })?;

        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        Ok(validate(&data_source.schema(), &config))
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let client = self.client().await?;
        data_source.read(&client, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_schema_registers_everything() {
        let provider = DevlakeProvider::new("0.1.0");
        let schema = provider.schema();

        let resources: Vec<_> = schema.resources.keys().cloned().collect();
        assert_eq!(
            resources,
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
        assert!(schema.data_sources.contains_key("devlake_apikeys"));
        assert!(schema.provider.block.attributes.contains_key("token"));
    }

    #[tokio::test]
    async fn test_operations_require_configuration() {
        let provider = DevlakeProvider::new("0.1.0");
        let err = provider
            .read("devlake_apikey", json!({"id": "1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let provider = DevlakeProvider::new("0.1.0");
        let err = provider
            .validate_resource_config("devlake_gitlab_connection", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_configure_reports_bad_host() {
        let provider = DevlakeProvider::new("0.1.0");
        let diagnostics = provider
            .configure(json!({"host": "::bad", "token": "t"}))
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Unable to create devlake api client");
        assert_err!(provider.client().await);
    }

    #[tokio::test]
    async fn test_configure_then_stop() {
        let provider = DevlakeProvider::new("0.1.0");
        let diagnostics = provider
            .configure(json!({"host": "http://devlake:8080", "token": "t"}))
            .await
            .unwrap();
        assert!(diagnostics.is_empty());
        assert_ok!(provider.client().await);

        assert_ok!(provider.stop().await);
        assert_err!(provider.client().await);
    }

    #[tokio::test]
    async fn test_import_rejects_malformed_id_before_calling_api() {
        let provider = DevlakeProvider::new("0.1.0");
        let err = provider
            .import_resource("devlake_github_connection_scope", "42")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }
}
