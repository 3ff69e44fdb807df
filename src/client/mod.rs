//! HTTP client for the DevLake REST API.
//!
//! [`Client`] owns a `reqwest` connection pool, the base URL of the DevLake
//! backend and the API token. Endpoint-specific methods live in the
//! [`apikeys`], [`github`] and [`bitbucket_server`] modules; they are thin
//! wrappers over the generic verbs defined here.

pub mod apikeys;
pub mod bitbucket_server;
pub mod github;
pub mod models;

use std::fmt;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::ClientError;

/// Host used when none is configured.
pub const DEFAULT_HOST: &str = "http://localhost:8080";

/// Timeout applied to every request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for a single DevLake backend.
#[derive(Clone)]
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
    token: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Client {
    /// Create a client for `host` (default [`DEFAULT_HOST`]) authenticating with `token`.
    ///
    /// ```
    /// use devlake_provider::client::Client;
    ///
    /// let client = Client::new(None, Some("secret")).unwrap();
    /// assert_eq!(client.host(), "http://localhost:8080/");
    ///
    /// assert!(Client::new(None, None).is_err());
    /// ```
    pub fn new(host: Option<&str>, token: Option<&str>) -> Result<Self, ClientError> {
        let token = token.ok_or(ClientError::MissingToken)?;
        let host = host.unwrap_or(DEFAULT_HOST);

        let base_url = Url::parse(host).map_err(|e| ClientError::InvalidUrl {
            host: host.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                host: host.to_string(),
                reason: "not a base URL".to_string(),
            });
        }

        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            base_url,
            http,
            token: token.to_string(),
        })
    }

    /// The base URL requests are sent to.
    pub fn host(&self) -> &str {
        self.base_url.as_str()
    }

    /// Build an endpoint URL from path segments, percent-encoding each one.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl {
                host: self.base_url.to_string(),
                reason: "not a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request with the auth headers set and return the body of a 2xx response.
    #[instrument(skip(self, request), level = "debug")]
    async fn do_request(&self, method: Method, url: Url, request: RequestBuilder) -> Result<Vec<u8>, ClientError> {
        let response = request
            .header(AUTHORIZATION, &self.token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        if !(200..=226).contains(&status) {
            let body = String::from_utf8_lossy(&body).into_owned();
            warn!(%method, %url, status, "devlake api returned an error");
            return Err(ClientError::Status { status, body });
        }

        debug!(%method, %url, status, bytes = body.len(), "devlake api request completed");
        Ok(body)
    }

    async fn send<B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<Vec<u8>, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }
        self.do_request(method, url, request).await
    }

    /// POST `body` as JSON and decode the response.
    pub(crate) async fn create<B, R>(&self, url: Url, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let bytes = self.send(Method::POST, url, Some(body)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GET and decode the response.
    pub(crate) async fn read<R>(&self, url: Url) -> Result<R, ClientError>
    where
        R: DeserializeOwned,
    {
        let bytes = self.send::<()>(Method::GET, url, None).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// PATCH `body` as JSON and decode the response.
    pub(crate) async fn update<B, R>(&self, url: Url, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let bytes = self.send(Method::PATCH, url, Some(body)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// PUT `body` as JSON and decode the response.
    pub(crate) async fn put<B, R>(&self, url: Url, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let bytes = self.send(Method::PUT, url, Some(body)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// DELETE, returning the raw response body.
    pub(crate) async fn delete(&self, url: Url) -> Result<Vec<u8>, ClientError> {
        self.send::<()>(Method::DELETE, url, None).await
    }
}
