//! `/plugins/github` endpoints.

use tracing::instrument;

use super::models::{
    GithubConnection, GithubConnectionScope, GithubConnectionScopeConfig, ScopeDetail, ScopeList,
};
use super::Client;
use crate::error::ClientError;

const PLUGIN: &str = "github";

impl Client {
    fn github_url(&self, segments: &[&str]) -> Result<reqwest::Url, ClientError> {
        let mut all = vec!["plugins", PLUGIN, "connections"];
        all.extend_from_slice(segments);
        self.url(&all)
    }

    /// Create a GitHub connection.
    #[instrument(skip(self, connection), fields(name = %connection.name))]
    pub async fn create_github_connection(
        &self,
        connection: &GithubConnection,
    ) -> Result<GithubConnection, ClientError> {
        self.create(self.github_url(&[])?, connection).await
    }

    /// Fetch connection `id`. A missing connection is a 404 [`ClientError::Status`].
    #[instrument(skip(self))]
    pub async fn read_github_connection(&self, id: &str) -> Result<GithubConnection, ClientError> {
        self.read(self.github_url(&[id])?).await
    }

    /// Patch connection `id` with every field of `connection`.
    #[instrument(skip(self, connection))]
    pub async fn update_github_connection(
        &self,
        id: &str,
        connection: &GithubConnection,
    ) -> Result<GithubConnection, ClientError> {
        self.update(self.github_url(&[id])?, connection).await
    }

    /// Delete connection `id`.
    #[instrument(skip(self))]
    pub async fn delete_github_connection(&self, id: &str) -> Result<(), ClientError> {
        self.delete(self.github_url(&[id])?).await.map(drop)
    }

    /// Create a scope config under `connection_id`.
    #[instrument(skip(self, config), fields(name = %config.name))]
    pub async fn create_github_connection_scope_config(
        &self,
        connection_id: &str,
        config: &GithubConnectionScopeConfig,
    ) -> Result<GithubConnectionScopeConfig, ClientError> {
        self.create(self.github_url(&[connection_id, "scope-configs"])?, config)
            .await
    }

    /// Fetch scope config `id` of `connection_id`.
    #[instrument(skip(self))]
    pub async fn read_github_connection_scope_config(
        &self,
        connection_id: &str,
        id: &str,
    ) -> Result<GithubConnectionScopeConfig, ClientError> {
        self.read(self.github_url(&[connection_id, "scope-configs", id])?)
            .await
    }

    /// Patch scope config `id` of `connection_id`.
    #[instrument(skip(self, config))]
    pub async fn update_github_connection_scope_config(
        &self,
        connection_id: &str,
        id: &str,
        config: &GithubConnectionScopeConfig,
    ) -> Result<GithubConnectionScopeConfig, ClientError> {
        self.update(self.github_url(&[connection_id, "scope-configs", id])?, config)
            .await
    }

    /// Delete scope config `id` of `connection_id`.
    #[instrument(skip(self))]
    pub async fn delete_github_connection_scope_config(
        &self,
        connection_id: &str,
        id: &str,
    ) -> Result<(), ClientError> {
        self.delete(self.github_url(&[connection_id, "scope-configs", id])?)
            .await
            .map(drop)
    }

    /// Upsert a single scope through the bulk endpoint and return what was stored.
    #[instrument(skip(self, scope), fields(full_name = %scope.full_name))]
    pub async fn create_github_connection_scope(
        &self,
        connection_id: &str,
        scope: &GithubConnectionScope,
    ) -> Result<GithubConnectionScope, ClientError> {
        let url = self.github_url(&[connection_id, "scopes"])?;
        let body = ScopeList {
            data: vec![scope.clone()],
        };
        let stored: Vec<GithubConnectionScope> = self.put(url.clone(), &body).await?;
        stored
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::EmptyResponse(url.to_string()))
    }

    /// Fetch repository scope `id`, unwrapping the `{scope, scopeConfig}` detail.
    #[instrument(skip(self))]
    pub async fn read_github_connection_scope(
        &self,
        connection_id: &str,
        id: &str,
    ) -> Result<GithubConnectionScope, ClientError> {
        let detail: ScopeDetail<GithubConnectionScope, GithubConnectionScopeConfig> = self
            .read(self.github_url(&[connection_id, "scopes", id])?)
            .await?;
        Ok(detail.scope)
    }

    /// Patch repository scope `id`.
    #[instrument(skip(self, scope))]
    pub async fn update_github_connection_scope(
        &self,
        connection_id: &str,
        id: &str,
        scope: &GithubConnectionScope,
    ) -> Result<GithubConnectionScope, ClientError> {
        self.update(self.github_url(&[connection_id, "scopes", id])?, scope)
            .await
    }

    /// Delete repository scope `id`.
    #[instrument(skip(self))]
    pub async fn delete_github_connection_scope(
        &self,
        connection_id: &str,
        id: &str,
    ) -> Result<(), ClientError> {
        self.delete(self.github_url(&[connection_id, "scopes", id])?)
            .await
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_connection_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plugins/github/connections/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 3,
                "appId": "1234",
                "name": "gh",
                "proxy": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/plugins/github/connections/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3})))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(Some(&server.uri()), Some("tok")).unwrap();
        let connection = client.read_github_connection("3").await.unwrap();
        assert_eq!(connection.app_id, "1234");
        assert_eq!(connection.proxy, "");

        client.delete_github_connection("3").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_scope_uses_bulk_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/plugins/github/connections/1/scopes"))
            .and(body_json(json!({"data": [{
                "githubId": 42,
                "cloneUrl": "https://github.com/org/repo.git",
                "connectionId": 1,
                "createdAt": "",
                "description": "",
                "fullName": "org/repo",
                "HTMLUrl": "https://github.com/org/repo",
                "name": "repo",
                "scopeConfigId": 2,
                "updatedAt": "",
                "createdDate": "",
                "updatedDate": ""
            }]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"githubId": 42, "connectionId": 1, "fullName": "org/repo", "scopeConfigId": 2}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(Some(&server.uri()), Some("tok")).unwrap();
        let scope = client
            .create_github_connection_scope(
                "1",
                &GithubConnectionScope {
                    github_id: 42,
                    clone_url: "https://github.com/org/repo.git".into(),
                    connection_id: 1,
                    full_name: "org/repo".into(),
                    html_url: "https://github.com/org/repo".into(),
                    name: "repo".into(),
                    scope_config_id: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(scope.github_id, 42);
    }

    #[tokio::test]
    async fn test_create_scope_empty_list_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = Client::new(Some(&server.uri()), Some("tok")).unwrap();
        let err = client
            .create_github_connection_scope("1", &GithubConnectionScope::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_read_scope_unwraps_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plugins/github/connections/1/scopes/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "scope": {"githubId": 42, "fullName": "org/repo"},
                "scopeConfig": {"id": 2, "name": "cfg"}
            })))
            .mount(&server)
            .await;

        let client = Client::new(Some(&server.uri()), Some("tok")).unwrap();
        let scope = client.read_github_connection_scope("1", "42").await.unwrap();
        assert_eq!(scope.full_name, "org/repo");
    }
}
