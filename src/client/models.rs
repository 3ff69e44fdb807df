//! Wire models for the DevLake REST API.
//!
//! Field names follow the API's camelCase JSON. Every struct defaults missing
//! fields, and string or list fields the API sends as `null` decode to their
//! empty value.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Deserialize `null` as the type's default value.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Envelope returned by some mutation endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonBody {
    /// Underlying error messages, if any.
    #[serde(deserialize_with = "nullable")]
    pub causes: Vec<String>,
    /// Application status code.
    pub code: i64,
    /// Payload, shape depends on the endpoint.
    pub data: Value,
    /// Human readable outcome.
    #[serde(deserialize_with = "nullable")]
    pub message: String,
    /// `false` when the request was rejected.
    pub success: bool,
}

/// An API key as returned by `/api-keys`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiKey {
    /// Numeric id assigned by DevLake.
    pub id: i64,
    /// Regex of API paths the key may call.
    #[serde(deserialize_with = "nullable")]
    pub allowed_path: String,
    /// The secret. Only returned unmasked on creation.
    #[serde(deserialize_with = "nullable")]
    pub api_key: String,
    /// Creation time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub created_at: String,
    /// User that created the key.
    #[serde(deserialize_with = "nullable")]
    pub creator: String,
    /// Email of the creator.
    #[serde(deserialize_with = "nullable")]
    pub creator_email: String,
    /// Expiry in RFC 3339.
    #[serde(deserialize_with = "nullable")]
    pub expired_at: String,
    /// Free-form extra data.
    #[serde(deserialize_with = "nullable")]
    pub extra: String,
    /// Display name.
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    /// Key type, sent as `type`.
    #[serde(rename = "type", deserialize_with = "nullable")]
    pub kind: String,
    /// Last modification time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub updated_at: String,
    /// User that last changed the key.
    #[serde(deserialize_with = "nullable")]
    pub updater: String,
    /// Email of the last updater.
    #[serde(deserialize_with = "nullable")]
    pub updater_email: String,
}

/// Request body for creating an API key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyCreate {
    /// Regex of API paths the key may call.
    pub allowed_path: String,
    /// Expiry in RFC 3339.
    pub expired_at: String,
    /// Display name.
    pub name: String,
    /// Key type, sent as `type`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Response of the API key list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeyList {
    /// Every key, in API order.
    #[serde(deserialize_with = "nullable")]
    pub apikeys: Vec<ApiKey>,
}

/// Tag comparison settings of a scope config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefDiff {
    /// How many recent tags to compare.
    pub tags_limit: i64,
    /// Regex selecting the tags to compare.
    #[serde(deserialize_with = "nullable")]
    pub tags_pattern: String,
}

/// A GitHub connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GithubConnection {
    /// Numeric id assigned by DevLake.
    pub id: i64,
    /// GitHub App id. The API carries it as a string.
    #[serde(deserialize_with = "nullable")]
    pub app_id: String,
    /// `AppKey` or `AccessToken`.
    #[serde(deserialize_with = "nullable")]
    pub auth_method: String,
    /// Creation time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub created_at: String,
    /// Collect through the GraphQL API.
    pub enable_graphql: bool,
    /// Base URL of the upstream REST API.
    #[serde(deserialize_with = "nullable")]
    pub endpoint: String,
    /// GitHub App installation id.
    pub installation_id: i64,
    /// Display name.
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    /// Proxy for upstream requests, empty for none.
    #[serde(deserialize_with = "nullable")]
    pub proxy: String,
    /// Upstream request budget per hour. 0 lets DevLake decide.
    pub rate_limit_per_hour: i64,
    /// App private key. Masked in responses.
    #[serde(deserialize_with = "nullable")]
    pub secret_key: String,
    /// Personal access token. Masked in responses.
    #[serde(deserialize_with = "nullable")]
    pub token: String,
    /// Last modification time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub updated_at: String,
}

/// A GitHub scope config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GithubConnectionScopeConfig {
    /// Id of the owning connection.
    pub connection_id: i64,
    /// Creation time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub created_at: String,
    /// Numeric id assigned by DevLake.
    pub id: i64,
    /// Regex matching CI jobs that deploy.
    #[serde(deserialize_with = "nullable")]
    pub deployment_pattern: String,
    /// Domain entities to collect, e.g. `CODE` or `CROSS`.
    #[serde(deserialize_with = "nullable")]
    pub entities: Vec<String>,
    /// Regex matching the environment name of a deployment.
    #[serde(deserialize_with = "nullable")]
    pub env_name_pattern: String,
    /// Regex that extracts the component from an issue label.
    #[serde(deserialize_with = "nullable")]
    pub issue_component: String,
    /// Regex that extracts the priority from an issue label.
    #[serde(deserialize_with = "nullable")]
    pub issue_priority: String,
    /// Regex that extracts the severity from an issue label.
    #[serde(deserialize_with = "nullable")]
    pub issue_severity: String,
    /// Regex of labels marking a bug.
    #[serde(deserialize_with = "nullable")]
    pub issue_type_bug: String,
    /// Regex of labels marking an incident.
    #[serde(deserialize_with = "nullable")]
    pub issue_type_incident: String,
    /// Regex of labels marking a requirement.
    #[serde(deserialize_with = "nullable")]
    pub issue_type_requirement: String,
    /// Display name.
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    /// Regex finding the issues a pull request closes.
    #[serde(deserialize_with = "nullable")]
    pub pr_body_close_pattern: String,
    /// Regex that extracts the component from a pull request.
    #[serde(deserialize_with = "nullable")]
    pub pr_component: String,
    /// Regex that extracts the type from a pull request.
    #[serde(deserialize_with = "nullable")]
    pub pr_type: String,
    /// Regex matching production deployments.
    #[serde(deserialize_with = "nullable")]
    pub production_pattern: String,
    /// Tag comparison settings, sent as `refdiff`.
    #[serde(rename = "refdiff")]
    pub ref_diff: Option<RefDiff>,
    /// Last modification time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub updated_at: String,
}

/// A GitHub repository tracked under a connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GithubConnectionScope {
    /// GitHub repository id, also the scope id.
    pub github_id: i64,
    /// Clone URL of the repository.
    #[serde(deserialize_with = "nullable")]
    pub clone_url: String,
    /// Id of the owning connection.
    pub connection_id: i64,
    /// Creation time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub created_at: String,
    /// Repository description.
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    /// `owner/repo`.
    #[serde(deserialize_with = "nullable")]
    pub full_name: String,
    /// Web URL of the repository, sent as `HTMLUrl`.
    #[serde(rename = "HTMLUrl", deserialize_with = "nullable")]
    pub html_url: String,
    /// Repository name.
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    /// Scope config applied to this repository, 0 for none.
    pub scope_config_id: i64,
    /// Last modification time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub updated_at: String,
    /// Repository creation time on GitHub.
    #[serde(deserialize_with = "nullable")]
    pub created_date: String,
    /// Last push time on GitHub.
    #[serde(deserialize_with = "nullable")]
    pub updated_date: String,
}

/// A Bitbucket Server connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BitbucketServerConnection {
    /// Numeric id assigned by DevLake.
    pub id: i64,
    /// Creation time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub created_at: String,
    /// Base URL of the upstream REST API.
    #[serde(deserialize_with = "nullable")]
    pub endpoint: String,
    /// Display name.
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    /// Password or HTTP access token. Masked in responses.
    #[serde(deserialize_with = "nullable")]
    pub password: String,
    /// Proxy for upstream requests, empty for none.
    #[serde(deserialize_with = "nullable")]
    pub proxy: String,
    /// Upstream request budget per hour. 0 lets DevLake decide.
    pub rate_limit_per_hour: i64,
    /// Last modification time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub updated_at: String,
    /// Bitbucket Server user.
    #[serde(deserialize_with = "nullable")]
    pub username: String,
}

/// A Bitbucket Server scope config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BitbucketServerConnectionScopeConfig {
    /// Id of the owning connection.
    pub connection_id: i64,
    /// Creation time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub created_at: String,
    /// Numeric id assigned by DevLake.
    pub id: i64,
    /// Domain entities to collect, e.g. `CODE` or `CROSS`.
    #[serde(deserialize_with = "nullable")]
    pub entities: Vec<String>,
    /// Display name.
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    /// Regex that extracts the component from a pull request.
    #[serde(deserialize_with = "nullable")]
    pub pr_component: String,
    /// Regex that extracts the type from a pull request.
    #[serde(deserialize_with = "nullable")]
    pub pr_type: String,
    /// Tag comparison settings, sent as `refdiff`.
    #[serde(rename = "refdiff")]
    pub ref_diff: Option<RefDiff>,
    /// Last modification time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub updated_at: String,
}

/// A Bitbucket Server repository tracked under a connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BitbucketServerConnectionScope {
    /// `PROJECT/repos/REPOSITORY`, also the scope id.
    #[serde(deserialize_with = "nullable")]
    pub bitbucket_id: String,
    /// Clone URL of the repository.
    #[serde(deserialize_with = "nullable")]
    pub clone_url: String,
    /// Id of the owning connection.
    pub connection_id: i64,
    /// Creation time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub created_at: String,
    /// Repository description.
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    /// Web URL of the repository, sent as `HTMLUrl`.
    #[serde(rename = "HTMLUrl", deserialize_with = "nullable")]
    pub html_url: String,
    /// Repository name.
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    /// Scope config applied to this repository, 0 for none.
    pub scope_config_id: i64,
    /// Last modification time as reported by DevLake.
    #[serde(deserialize_with = "nullable")]
    pub updated_at: String,
}

/// Bulk upsert body for the scopes endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeList<T> {
    /// Scopes to upsert.
    pub data: Vec<T>,
}

/// A single scope together with the scope config applied to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDetail<S, C> {
    /// The scope itself.
    pub scope: S,
    /// Its scope config, absent when none is applied.
    #[serde(default)]
    pub scope_config: Option<C>,
}
