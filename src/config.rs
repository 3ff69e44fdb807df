//! Provider configuration.
//!
//! The provider block takes an optional `host` and `token`. Either may come
//! from the environment instead (`DEVLAKE_HOST`, `DEVLAKE_TOKEN`); a value
//! set in configuration always wins.

use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::client::Client;
use crate::error::ClientError;
use crate::schema::{Attribute, Diagnostic, Schema, Usage};
use crate::types::is_unknown;

/// Environment variable consulted when `host` is not configured.
pub const HOST_ENV: &str = "DEVLAKE_HOST";

/// Environment variable consulted when `token` is not configured.
pub const TOKEN_ENV: &str = "DEVLAKE_TOKEN";

/// Resolved connection settings for the DevLake API.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Base URL of the DevLake API.
    pub host: String,
    /// Sent verbatim as the `Authorization` header.
    pub token: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl ProviderConfig {
    /// Schema of the provider configuration block.
    pub fn schema() -> Schema {
        Schema::new()
            .with_description("Interact with the Apache DevLake REST API.")
            .with_attribute(
                "host",
                Attribute::string(Usage::Optional).with_description(
                    "URI for the DevLake API. May also be provided via the DEVLAKE_HOST environment variable.",
                ),
            )
            .with_attribute(
                "token",
                Attribute::string(Usage::Optional).sensitive().with_description(
                    "Token for the DevLake API. May also be provided via the DEVLAKE_TOKEN environment variable.",
                ),
            )
    }

    /// Resolve settings from `config`, falling back to the process environment.
    pub fn resolve(config: &Value) -> Result<Self, Vec<Diagnostic>> {
        Self::resolve_with(config, |key| std::env::var(key).ok())
    }

    /// Resolve settings from `config`, falling back to `env` for unset values.
    pub fn resolve_with<F>(config: &Value, env: F) -> Result<Self, Vec<Diagnostic>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = config.get("host").filter(|v| !v.is_null());
        let token = config.get("token").filter(|v| !v.is_null());

        let mut diagnostics = Vec::new();
        if host.is_some_and(is_unknown) {
            diagnostics.push(unknown_value("host", "host", HOST_ENV));
        }
        if token.is_some_and(is_unknown) {
            diagnostics.push(unknown_value("token", "token", TOKEN_ENV));
        }
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let host = match host {
            Some(v) => v.as_str().map(str::to_string).unwrap_or_default(),
            None => env(HOST_ENV).unwrap_or_default(),
        };
        let token = match token {
            Some(v) => v.as_str().map(str::to_string).unwrap_or_default(),
            None => env(TOKEN_ENV).unwrap_or_default(),
        };

        if host.is_empty() {
            diagnostics.push(missing_value("host", "host", HOST_ENV));
        }
        if token.is_empty() {
            diagnostics.push(missing_value("token", "token", TOKEN_ENV));
        }
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        debug!(devlake_host = %host, "resolved devlake provider configuration");
        Ok(Self { host, token })
    }

    /// Build an API client from these settings.
    pub fn client(&self) -> Result<Client, ClientError> {
        Client::new(Some(&self.host), Some(&self.token))
    }
}

fn unknown_value(attribute: &str, what: &str, env: &str) -> Diagnostic {
    Diagnostic::error(format!("Unknown devlake api {}", what))
        .with_detail(format!(
            "The provider cannot create the devlake api client as there is an unknown configuration value for the devlake api {}. \
             Either target apply the source of the value first, set the value statically in the configuration, or use the {} environment variable.",
            what, env
        ))
        .with_attribute(attribute)
}

fn missing_value(attribute: &str, what: &str, env: &str) -> Diagnostic {
    Diagnostic::error(format!("Missing devlake api {}", what))
        .with_detail(format!(
            "The provider cannot create the devlake api client as there is a missing or empty value for the devlake api {}. \
             Set the {} value in the configuration or use the {} environment variable. \
             If either is already set, ensure the value is not empty.",
            what, what, env
        ))
        .with_attribute(attribute)
}
