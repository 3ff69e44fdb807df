//! Infrastructure-as-code provider for [Apache DevLake](https://devlake.apache.org).
//!
//! The provider manages DevLake API keys plus GitHub and Bitbucket Server
//! connections, their scope configs and their scopes, and exposes the
//! `devlake_apikeys` data source. It runs as a plugin process speaking the
//! gRPC provider protocol in `proto/provider.proto`.
//!
//! # Handshake Protocol
//!
//! On start the binary binds an ephemeral localhost port and prints one line
//! to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Everything else, logs included, goes to stderr.
//!
//! # Provider Configuration
//!
//! | attribute | env fallback    | notes               |
//! |-----------|-----------------|---------------------|
//! | `host`    | `DEVLAKE_HOST`  | base URL of the API |
//! | `token`   | `DEVLAKE_TOKEN` | sensitive           |
//!
//! Both must resolve to a non-empty value; a configured value always wins
//! over the environment.
//!
//! # Layout
//!
//! - [`client`]: typed HTTP client for the DevLake REST API
//! - [`resources`] and [`data_sources`]: schema plus CRUD per type
//! - [`provider`]: [`DevlakeProvider`], dispatching protocol calls to them
//! - [`plan`], [`validation`], [`schema`]: schema-driven planning and checks
//! - [`server`]: the gRPC adapter and `serve*` entry points
//! - [`testing`]: an in-process harness for acceptance tests
//!
//! ```no_run
//! use devlake_provider::{serve, try_init_logging, DevlakeProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     try_init_logging();
//!     serve(DevlakeProvider::new(env!("CARGO_PKG_VERSION"))).await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use client::Client;
pub use config::ProviderConfig;
pub use error::{ClientError, ProviderError};
pub use logging::{try_init_logging, try_init_logging_with_default};
pub use provider::DevlakeProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities, HANDSHAKE_PREFIX,
    PROTOCOL_VERSION,
};
pub use validation::validate;

pub use async_trait::async_trait;
pub use serde_json;
pub use tonic;
pub use tracing;
