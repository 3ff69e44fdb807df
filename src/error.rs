//! Error types for the DevLake provider.
//!
//! [`ClientError`] describes failures talking to the DevLake REST API.
//! [`ProviderError`] is what resources and the plugin server deal in; client
//! errors are folded into it by HTTP status so the host sees what kind of
//! failure it was.

use thiserror::Error;

/// Errors returned by the DevLake HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No API token was supplied.
    #[error("no api token provided")]
    MissingToken,

    /// The configured host is not a usable base URL.
    #[error("invalid devlake host '{host}': {reason}")]
    InvalidUrl {
        /// The host as configured.
        host: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a status outside the 2xx range.
    #[error("status: {status}, body: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The response body was not the JSON we expected.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The API reported failure inside a `success: false` envelope.
    #[error("{0}")]
    Api(String),

    /// A list endpoint returned no elements where one was expected.
    #[error("empty response from {0}")]
    EmptyResponse(String),
}

impl ClientError {
    /// The HTTP status code, if the API answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the remote object does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Error returned by provider operations.
///
/// REST failures arrive through `From<ClientError>`, which picks the variant
/// from the HTTP status. The server reports every variant to the host as an
/// error diagnostic.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The DevLake object does not exist (HTTP 404, or import of a missing id).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// State or configuration that cannot be decoded into a resource model.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A bug or an unexpected response shape, e.g. an undecodable body.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The provider block was not configured or is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No resource or data source is registered under this type name.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// State could not be encoded to JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP 409.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// HTTP 401 or 403, usually a bad `token`.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// HTTP 429.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// HTTP 5xx or the backend could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The request hit the client timeout.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// DevLake answered but reported failure, e.g. `{"success": false}`.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// A malformed import id, or HTTP 400/422.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Short name of the failure, used as the diagnostic summary.
    ///
    /// ```
    /// use devlake_provider::ProviderError;
    ///
    /// let err = ProviderError::Unavailable("status: 500, body: boom".into());
    /// assert_eq!(err.summary(), "Service unavailable");
    /// ```
    pub fn summary(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Resource not found",
            Self::Validation(_) => "Validation error",
            Self::Internal(_) => "Internal error",
            Self::Configuration(_) => "Configuration error",
            Self::UnknownResource(_) => "Unknown resource type",
            Self::Serialization(_) => "Serialization error",
            Self::AlreadyExists(_) => "Resource already exists",
            Self::PermissionDenied(_) => "Permission denied",
            Self::ResourceExhausted(_) => "Resource exhausted",
            Self::Unavailable(_) => "Service unavailable",
            Self::DeadlineExceeded(_) => "Deadline exceeded",
            Self::FailedPrecondition(_) => "Failed precondition",
            Self::InvalidRequest(_) => "Invalid request",
        }
    }

    /// Everything after the summary. For serialization errors this is the
    /// underlying serde message.
    pub fn detail(&self) -> String {
        match self {
            Self::Serialization(err) => err.to_string(),
            other => other.message().to_string(),
        }
    }

    /// The message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Internal(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::FailedPrecondition(msg)
            | Self::InvalidRequest(msg) => msg,
            Self::Serialization(_) => "serialization error (see Debug output)",
        }
    }

    /// Prefix the message with what the provider was doing, keeping the variant.
    ///
    /// ```
    /// use devlake_provider::ProviderError;
    ///
    /// let err = ProviderError::NotFound("status: 404".into())
    ///     .context("Could not read devlake github connection");
    /// assert_eq!(err.message(), "Could not read devlake github connection: status: 404");
    /// ```
    pub fn context(self, what: impl std::fmt::Display) -> Self {
        let wrap = |msg: String| format!("{}: {}", what, msg);
        match self {
            Self::NotFound(msg) => Self::NotFound(wrap(msg)),
            Self::Validation(msg) => Self::Validation(wrap(msg)),
            Self::Internal(msg) => Self::Internal(wrap(msg)),
            Self::Configuration(msg) => Self::Configuration(wrap(msg)),
            Self::UnknownResource(msg) => Self::UnknownResource(wrap(msg)),
            Self::AlreadyExists(msg) => Self::AlreadyExists(wrap(msg)),
            Self::PermissionDenied(msg) => Self::PermissionDenied(wrap(msg)),
            Self::ResourceExhausted(msg) => Self::ResourceExhausted(wrap(msg)),
            Self::Unavailable(msg) => Self::Unavailable(wrap(msg)),
            Self::DeadlineExceeded(msg) => Self::DeadlineExceeded(wrap(msg)),
            Self::FailedPrecondition(msg) => Self::FailedPrecondition(wrap(msg)),
            Self::InvalidRequest(msg) => Self::InvalidRequest(wrap(msg)),
            Self::Serialization(err) => Self::Validation(wrap(err.to_string())),
        }
    }
}

impl From<ClientError> for ProviderError {
    fn from(err: ClientError) -> Self {
        let msg = err.to_string();
        match &err {
            ClientError::MissingToken | ClientError::InvalidUrl { .. } => {
                ProviderError::Configuration(msg)
            },
            ClientError::Http(inner) if inner.is_timeout() => ProviderError::DeadlineExceeded(msg),
            ClientError::Http(inner) if inner.is_connect() => ProviderError::Unavailable(msg),
            ClientError::Decode(_) => ProviderError::Internal(msg),
            ClientError::Api(_) | ClientError::EmptyResponse(_) => {
                ProviderError::FailedPrecondition(msg)
            },
            _ => match err.status() {
                Some(404) => ProviderError::NotFound(msg),
                Some(401) | Some(403) => ProviderError::PermissionDenied(msg),
                Some(409) => ProviderError::AlreadyExists(msg),
                Some(429) => ProviderError::ResourceExhausted(msg),
                Some(400) | Some(422) => ProviderError::InvalidRequest(msg),
                Some(status) if status >= 500 => ProviderError::Unavailable(msg),
                _ => ProviderError::Internal(msg),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ClientError {
        ClientError::Status {
            status: code,
            body: "{}".to_string(),
        }
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::UnknownResource("devlake_gitlab_connection".to_string());
        assert_eq!(err.to_string(), "Unknown resource type: devlake_gitlab_connection");
        assert_eq!(err.message(), "devlake_gitlab_connection");

        assert_eq!(status(500).to_string(), "status: 500, body: {}");
    }

    #[test]
    fn test_summary_matches_display_prefix() {
        let decode = serde_json::from_str::<u32>("nope").unwrap_err();
        let cases = [
            ProviderError::from(status(404)),
            ProviderError::Validation("bad state".into()),
            ProviderError::Configuration("no client".into()),
            ProviderError::from(status(503)),
            ProviderError::Internal("boom".into()),
            ProviderError::Serialization(decode),
        ];
        for err in cases {
            let display = err.to_string();
            assert_eq!(display, format!("{}: {}", err.summary(), err.detail()));
        }
    }

    #[test]
    fn test_client_status_mapping() {
        assert!(matches!(
            ProviderError::from(status(404)),
            ProviderError::NotFound(_)
        ));
        assert!(matches!(
            ProviderError::from(status(401)),
            ProviderError::PermissionDenied(_)
        ));
        assert!(matches!(
            ProviderError::from(status(403)),
            ProviderError::PermissionDenied(_)
        ));
        assert!(matches!(
            ProviderError::from(status(409)),
            ProviderError::AlreadyExists(_)
        ));
        assert!(matches!(
            ProviderError::from(status(429)),
            ProviderError::ResourceExhausted(_)
        ));
        assert!(matches!(
            ProviderError::from(status(400)),
            ProviderError::InvalidRequest(_)
        ));
        assert!(matches!(
            ProviderError::from(status(503)),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            ProviderError::from(status(418)),
            ProviderError::Internal(_)
        ));
    }

    #[test]
    fn test_client_non_status_mapping() {
        assert!(matches!(
            ProviderError::from(ClientError::MissingToken),
            ProviderError::Configuration(_)
        ));
        assert!(matches!(
            ProviderError::from(ClientError::Api("connection in use".into())),
            ProviderError::FailedPrecondition(_)
        ));
        let decode = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(
            ProviderError::from(ClientError::Decode(decode)),
            ProviderError::Internal(_)
        ));
    }

    #[test]
    fn test_is_not_found() {
        assert!(status(404).is_not_found());
        assert!(!status(500).is_not_found());
        assert!(!ClientError::MissingToken.is_not_found());
    }

    #[test]
    fn test_context_keeps_variant() {
        let err = ProviderError::from(status(409)).context("Could not create apikey");
        assert!(matches!(err, ProviderError::AlreadyExists(_)));
        assert_eq!(
            err.message(),
            "Could not create apikey: status: 409, body: {}"
        );
    }
}
