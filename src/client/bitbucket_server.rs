//! `/plugins/bitbucket_server` endpoints.

use tracing::instrument;

use super::models::{
    BitbucketServerConnection, BitbucketServerConnectionScope, BitbucketServerConnectionScopeConfig,
    ScopeDetail, ScopeList,
};
use super::Client;
use crate::error::ClientError;

const PLUGIN: &str = "bitbucket_server";

impl Client {
    fn bitbucket_server_url(&self, segments: &[&str]) -> Result<reqwest::Url, ClientError> {
        let mut all = vec!["plugins", PLUGIN, "connections"];
        all.extend_from_slice(segments);
        self.url(&all)
    }

    /// Create a Bitbucket Server connection.
    #[instrument(skip(self, connection), fields(name = %connection.name))]
    pub async fn create_bitbucket_server_connection(
        &self,
        connection: &BitbucketServerConnection,
    ) -> Result<BitbucketServerConnection, ClientError> {
        self.create(self.bitbucket_server_url(&[])?, connection).await
    }

    /// Fetch connection `id`.
    #[instrument(skip(self))]
    pub async fn read_bitbucket_server_connection(
        &self,
        id: &str,
    ) -> Result<BitbucketServerConnection, ClientError> {
        self.read(self.bitbucket_server_url(&[id])?).await
    }

    /// Patch connection `id`.
    #[instrument(skip(self, connection))]
    pub async fn update_bitbucket_server_connection(
        &self,
        id: &str,
        connection: &BitbucketServerConnection,
    ) -> Result<BitbucketServerConnection, ClientError> {
        self.update(self.bitbucket_server_url(&[id])?, connection).await
    }

    /// Delete connection `id`.
    #[instrument(skip(self))]
    pub async fn delete_bitbucket_server_connection(&self, id: &str) -> Result<(), ClientError> {
        self.delete(self.bitbucket_server_url(&[id])?).await.map(drop)
    }

    /// Create a scope config under `connection_id`.
    #[instrument(skip(self, config), fields(name = %config.name))]
    pub async fn create_bitbucket_server_connection_scope_config(
        &self,
        connection_id: &str,
        config: &BitbucketServerConnectionScopeConfig,
    ) -> Result<BitbucketServerConnectionScopeConfig, ClientError> {
        self.create(
            self.bitbucket_server_url(&[connection_id, "scope-configs"])?,
            config,
        )
        .await
    }

    /// Fetch scope config `id` of `connection_id`.
    #[instrument(skip(self))]
    pub async fn read_bitbucket_server_connection_scope_config(
        &self,
        connection_id: &str,
        id: &str,
    ) -> Result<BitbucketServerConnectionScopeConfig, ClientError> {
        self.read(self.bitbucket_server_url(&[connection_id, "scope-configs", id])?)
            .await
    }

    /// Patch scope config `id` of `connection_id`.
    #[instrument(skip(self, config))]
    pub async fn update_bitbucket_server_connection_scope_config(
        &self,
        connection_id: &str,
        id: &str,
        config: &BitbucketServerConnectionScopeConfig,
    ) -> Result<BitbucketServerConnectionScopeConfig, ClientError> {
        self.update(
            self.bitbucket_server_url(&[connection_id, "scope-configs", id])?,
            config,
        )
        .await
    }

    /// Delete scope config `id` of `connection_id`.
    #[instrument(skip(self))]
    pub async fn delete_bitbucket_server_connection_scope_config(
        &self,
        connection_id: &str,
        id: &str,
    ) -> Result<(), ClientError> {
        self.delete(self.bitbucket_server_url(&[connection_id, "scope-configs", id])?)
            .await
            .map(drop)
    }

    /// Upsert a single scope through the bulk endpoint and return what was stored.
    #[instrument(skip(self, scope), fields(id = %scope.bitbucket_id))]
    pub async fn create_bitbucket_server_connection_scope(
        &self,
        connection_id: &str,
        scope: &BitbucketServerConnectionScope,
    ) -> Result<BitbucketServerConnectionScope, ClientError> {
        let url = self.bitbucket_server_url(&[connection_id, "scopes"])?;
        let body = ScopeList {
            data: vec![scope.clone()],
        };
        let stored: Vec<BitbucketServerConnectionScope> = self.put(url.clone(), &body).await?;
        stored
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::EmptyResponse(url.to_string()))
    }

    /// Fetch repository scope `id`, e.g. `PROJ/repos/app`.
    /// The id is percent-encoded as a single path segment.
    #[instrument(skip(self))]
    pub async fn read_bitbucket_server_connection_scope(
        &self,
        connection_id: &str,
        id: &str,
    ) -> Result<BitbucketServerConnectionScope, ClientError> {
        let detail: ScopeDetail<BitbucketServerConnectionScope, BitbucketServerConnectionScopeConfig> =
            self.read(self.bitbucket_server_url(&[connection_id, "scopes", id])?)
                .await?;
        Ok(detail.scope)
    }

    /// Patch repository scope `id`.
    #[instrument(skip(self, scope))]
    pub async fn update_bitbucket_server_connection_scope(
        &self,
        connection_id: &str,
        id: &str,
        scope: &BitbucketServerConnectionScope,
    ) -> Result<BitbucketServerConnectionScope, ClientError> {
        self.update(self.bitbucket_server_url(&[connection_id, "scopes", id])?, scope)
            .await
    }

    /// Delete repository scope `id`.
    #[instrument(skip(self))]
    pub async fn delete_bitbucket_server_connection_scope(
        &self,
        connection_id: &str,
        id: &str,
    ) -> Result<(), ClientError> {
        self.delete(self.bitbucket_server_url(&[connection_id, "scopes", id])?)
            .await
            .map(drop)
    }
}
