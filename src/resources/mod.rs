//! Managed resources.
//!
//! Each resource pairs a [`Schema`] with CRUD operations against the DevLake
//! API. States cross this boundary as `serde_json::Value` and are decoded
//! into a typed model inside each resource.

mod apikey;
mod bitbucket_server_connection;
mod bitbucket_server_connection_scope;
mod bitbucket_server_connection_scopeconfig;
mod github_connection;
mod github_connection_scope;
mod github_connection_scopeconfig;
mod ref_diff;

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::client::Client;
use crate::error::{ClientError, ProviderError};
use crate::schema::Schema;

pub use apikey::ApiKeyResource;
pub use bitbucket_server_connection::BitbucketServerConnectionResource;
pub use bitbucket_server_connection_scope::BitbucketServerConnectionScopeResource;
pub use bitbucket_server_connection_scopeconfig::BitbucketServerConnectionScopeConfigResource;
pub use github_connection::GithubConnectionResource;
pub use github_connection_scope::GithubConnectionScopeResource;
pub use github_connection_scopeconfig::GithubConnectionScopeConfigResource;

/// A resource type managed through the DevLake API.
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// The resource type name, e.g. `devlake_apikey`.
    fn type_name(&self) -> &'static str;

    /// Attributes and blocks of the resource, used for validation and planning.
    fn schema(&self) -> Schema;

    /// Create the remote object and return the resulting state.
    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh `state` from the remote object. `None` means it no longer exists.
    async fn read(&self, client: &Client, state: Value) -> Result<Option<Value>, ProviderError>;

    /// Apply `planned` to the object recorded in `prior` and return the new state.
    ///
    /// Only reached for changes that do not force replacement.
    async fn update(
        &self,
        client: &Client,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the object recorded in `state`.
    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError>;

    /// Turn an import identifier into the partial state `read` starts from.
    ///
    /// The default treats the identifier as the object's `id`.
    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        Ok(json!({ "id": id }))
    }
}

/// Every resource this provider registers.
pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(ApiKeyResource),
        Arc::new(BitbucketServerConnectionResource),
        Arc::new(BitbucketServerConnectionScopeConfigResource),
        Arc::new(BitbucketServerConnectionScopeResource),
        Arc::new(GithubConnectionResource),
        Arc::new(GithubConnectionScopeConfigResource),
        Arc::new(GithubConnectionScopeResource),
    ]
}

/// Split a `connection_id,<object>_id` import identifier.
///
/// ```
/// use devlake_provider::resources::parse_composite_id;
///
/// let (connection, scope) = parse_composite_id("1,PROJ/repos/app", "connection_id,scope_id").unwrap();
/// assert_eq!(connection, "1");
/// assert_eq!(scope, "PROJ/repos/app");
///
/// assert!(parse_composite_id("1,", "connection_id,scope_id").is_err());
/// ```
pub fn parse_composite_id<'a>(
    id: &'a str,
    format: &str,
) -> Result<(&'a str, &'a str), ProviderError> {
    let parts: Vec<&str> = id.split(',').collect();
    match parts.as_slice() {
        [first, second] if !first.is_empty() && !second.is_empty() => Ok((*first, *second)),
        _ => Err(ProviderError::InvalidRequest(format!(
            "Unexpected Import Identifier: Expected import identifier with format: {}. Got: {:?}",
            format, id
        ))),
    }
}

/// Parse a numeric identifier held as a string in state.
pub(crate) fn parse_id(field: &str, value: &str) -> Result<i64, ProviderError> {
    value.parse().map_err(|e| {
        ProviderError::Validation(format!("{} must be numeric, got {:?}: {}", field, value, e))
    })
}

/// Current time in RFC 850 form, as written to `last_updated`.
pub(crate) fn rfc850_now() -> String {
    Utc::now().format("%A, %d-%b-%y %H:%M:%S UTC").to_string()
}

/// Current time in RFC 3339 form, as written to scope timestamps.
pub(crate) fn rfc3339_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn decode_state<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    serde_json::from_value(value).map_err(|e| ProviderError::Validation(format!("invalid state: {}", e)))
}

pub(crate) fn encode_state<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

/// Treat a 404 as the object having been removed.
pub(crate) fn absent_if_not_found<T>(result: Result<T, ClientError>) -> Result<Option<T>, ClientError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_parse_composite_id() {
        assert_eq!(
            parse_composite_id("3,17", "connection_id,scopeconfig_id").unwrap(),
            ("3", "17")
        );

        for bad in ["", "3", "3,", ",17", "3,17,5"] {
            let err = parse_composite_id(bad, "connection_id,scopeconfig_id").unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains("Unexpected Import Identifier"), "{}", msg);
            assert!(msg.contains("connection_id,scopeconfig_id"), "{}", msg);
            assert!(msg.contains(&format!("{:?}", bad)), "{}", msg);
        }
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("connection_id", "42").unwrap(), 42);
        assert!(matches!(
            parse_id("connection_id", "abc"),
            Err(ProviderError::Validation(_))
        ));
    }

    #[test]
    fn test_timestamps() {
        let rfc850 = rfc850_now();
        assert!(rfc850.ends_with(" UTC"));
        assert!(rfc850.contains(", "));

        let rfc3339 = rfc3339_now();
        assert!(DateTime::parse_from_rfc3339(&rfc3339).is_ok());
    }

    #[test]
    fn test_absent_if_not_found() {
        let missing: Result<(), _> = Err(ClientError::Status {
            status: 404,
            body: String::new(),
        });
        assert_eq!(absent_if_not_found(missing).unwrap(), None);

        let failed: Result<(), _> = Err(ClientError::Status {
            status: 500,
            body: String::new(),
        });
        assert!(absent_if_not_found(failed).is_err());
    }

    #[test]
    fn test_all_resources_have_distinct_names() {
        let mut names: Vec<_> = all().iter().map(|r| r.type_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 7);
    }
}
