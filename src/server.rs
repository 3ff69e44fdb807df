//! gRPC plumbing for the provider plugin protocol.
//!
//! [`ProviderService`] is the typed interface a provider implements. The
//! `serve*` functions bind a listener, print the handshake line on stdout and
//! run the generated `Provider` service until a shutdown signal arrives.
//!
//! # Signal Handling
//!
//! On SIGTERM or SIGINT (CTRL+C on Windows) the server stops accepting new
//! connections and drains in-flight requests for at most
//! [`ServeOptions::shutdown_timeout`]. The provider's `stop()` runs last.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated as pb;
use crate::schema::{has_errors, Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema};
use crate::types::{handshake_line, ImportedResource, PlanResult, ProviderMetadata};

/// Operations a provider exposes over the plugin protocol.
///
/// Values cross this boundary as `serde_json::Value`; the gRPC adapter
/// handles the byte encoding. Errors returned from any method are reported
/// to the caller as error diagnostics.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// The provider, resource and data source schemas.
    fn schema(&self) -> ProviderSchema;

    /// Resource and data source names, derived from the schema by default.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.into_keys().collect(),
            data_sources: schema.data_sources.into_keys().collect(),
            capabilities: Default::default(),
        }
    }

    /// Check the provider block before `configure`. Accepts anything by default.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Apply provider configuration. Problems with the configuration are
    /// returned as diagnostics rather than errors.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Release resources before the process exits. Called once the server has drained.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Check a resource configuration. Accepts anything by default.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Migrate state written by an older schema version. Every schema is at
    /// version 0, so the default returns the state unchanged.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Compute the planned state. `prior_state` is `None` for a create.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create the remote object and return its state.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh state. `Value::Null` means the remote object is gone.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Apply `planned_state` in place and return the new state.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Build state for an existing object from its import id.
    ///
    /// Providers without import support can keep the default, which fails.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Internal(format!(
            "import is not supported for resource type: {}",
            resource_type
        )))
    }

    /// Check a data source configuration. Accepts anything by default.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read a data source. The default knows no data sources.
    async fn read_data_source(&self, data_source_type: &str, _config: Value) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// Adapts a [`ProviderService`] to the generated gRPC trait.
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

/// Decode a JSON payload. Empty or malformed bytes decode to `Null`.
fn decode(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or_else(|e| {
        warn!(error = %e, "discarding undecodable json payload");
        Value::Null
    })
}

fn encode(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<pb::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| pb::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => pb::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => pb::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

/// One error diagnostic: the kind of failure as summary, the message as detail.
fn error_to_proto(err: ProviderError) -> Vec<pb::Diagnostic> {
    diagnostics_to_proto(vec![Diagnostic::error(err.summary()).with_detail(err.detail())])
}

/// Collapse a diagnostics-returning call into the proto diagnostics list,
/// logging the outcome under `operation`.
fn report(operation: &str, subject: &str, result: Result<Vec<Diagnostic>, ProviderError>) -> Vec<pb::Diagnostic> {
    match result {
        Ok(diagnostics) if has_errors(&diagnostics) => {
            warn!(subject, diagnostics = diagnostics.len(), "{} completed with errors", operation);
            diagnostics_to_proto(diagnostics)
        },
        Ok(diagnostics) => {
            debug!(subject, "{} completed", operation);
            diagnostics_to_proto(diagnostics)
        },
        Err(e) => {
            error!(subject, error = %e, "{} failed", operation);
            error_to_proto(e)
        },
    }
}

fn schema_to_proto(schema: &Schema) -> pb::Schema {
    pb::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> pb::Block {
    let attributes = block
        .attributes
        .iter()
        .map(|(name, attr)| pb::Attribute {
            name: name.clone(),
            r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
            required: attr.flags.required,
            optional: attr.flags.optional,
            computed: attr.flags.computed,
            sensitive: attr.flags.sensitive,
            description: attr.description.clone().unwrap_or_default(),
            force_new: attr.force_new,
            default_value: attr.default.as_ref().map(encode).unwrap_or_default(),
        })
        .collect();

    let block_types = block
        .blocks
        .iter()
        .map(|(name, nested)| pb::NestedBlock {
            type_name: name.clone(),
            block: Some(block_to_proto(&nested.block)),
            nesting_mode: match nested.nesting_mode {
                BlockNestingMode::Single => pb::nested_block::NestingMode::Single as i32,
                BlockNestingMode::List => pb::nested_block::NestingMode::List as i32,
            },
            min_items: nested.min_items as i32,
            max_items: nested.max_items as i32,
        })
        .collect();

    pb::Block {
        attributes,
        block_types,
        description: block.description.clone().unwrap_or_default(),
    }
}

#[tonic::async_trait]
impl<P: ProviderService> pb::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip(self, _request), name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: Request<pb::GetMetadataRequest>,
    ) -> Result<Response<pb::GetMetadataResponse>, Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "GetMetadata completed"
        );
        Ok(Response::new(pb::GetMetadataResponse {
            server_capabilities: Some(pb::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: Request<pb::GetSchemaRequest>,
    ) -> Result<Response<pb::GetSchemaResponse>, Status> {
        let schema = self.provider.schema();
        debug!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema completed"
        );
        Ok(Response::new(pb::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(name, s)| (name.clone(), schema_to_proto(s)))
                .collect(),
            data_sources: schema
                .data_sources
                .iter()
                .map(|(name, s)| (name.clone(), schema_to_proto(s)))
                .collect(),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, request), name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: Request<pb::ValidateProviderConfigRequest>,
    ) -> Result<Response<pb::ValidateProviderConfigResponse>, Status> {
        let config = decode(&request.into_inner().config);
        let result = self.provider.validate_provider_config(config).await;
        Ok(Response::new(pb::ValidateProviderConfigResponse {
            diagnostics: report("ValidateProviderConfig", "provider", result),
        }))
    }

    #[instrument(skip(self, request), name = "grpc.configure")]
    async fn configure(
        &self,
        request: Request<pb::ConfigureRequest>,
    ) -> Result<Response<pb::ConfigureResponse>, Status> {
        let config = decode(&request.into_inner().config);
        let result = self.provider.configure(config).await;
        Ok(Response::new(pb::ConfigureResponse {
            diagnostics: report("Configure", "provider", result),
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.stop")]
    async fn stop(&self, _request: Request<pb::StopRequest>) -> Result<Response<pb::StopResponse>, Status> {
        info!("Stop called");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            },
        };
        Ok(Response::new(pb::StopResponse { error }))
    }

    #[instrument(skip(self, request), name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: Request<pb::ValidateResourceConfigRequest>,
    ) -> Result<Response<pb::ValidateResourceConfigResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .provider
            .validate_resource_config(&req.resource_type, decode(&req.config))
            .await;
        Ok(Response::new(pb::ValidateResourceConfigResponse {
            diagnostics: report("ValidateResourceConfig", &req.resource_type, result),
        }))
    }

    #[instrument(skip(self, request), name = "grpc.upgrade_resource_state")]
    async fn upgrade_resource_state(
        &self,
        request: Request<pb::UpgradeResourceStateRequest>,
    ) -> Result<Response<pb::UpgradeResourceStateResponse>, Status> {
        let req = request.into_inner();
        let state = decode(&req.raw_state);

        let response = match self
            .provider
            .upgrade_resource_state(&req.resource_type, req.version, state)
            .await
        {
            Ok(upgraded) => pb::UpgradeResourceStateResponse {
                upgraded_state: encode(&upgraded),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, version = req.version, error = %e, "UpgradeResourceState failed");
                pb::UpgradeResourceStateResponse {
                    upgraded_state: vec![],
                    diagnostics: error_to_proto(e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.plan")]
    async fn plan(&self, request: Request<pb::PlanRequest>) -> Result<Response<pb::PlanResponse>, Status> {
        let req = request.into_inner();
        let prior_state = match decode(&req.prior_state) {
            Value::Null => None,
            prior => Some(prior),
        };
        debug!(resource_type = %req.resource_type, is_create = prior_state.is_none(), "Plan called");

        let response = match self
            .provider
            .plan(
                &req.resource_type,
                prior_state,
                decode(&req.proposed_state),
                decode(&req.config),
            )
            .await
        {
            Ok(result) => {
                info!(
                    resource_type = %req.resource_type,
                    changes = result.changes.len(),
                    requires_replace = result.requires_replace,
                    "Plan completed"
                );
                pb::PlanResponse {
                    planned_state: encode(&result.planned_state),
                    changes: result.changes.into_iter().map(Into::into).collect(),
                    requires_replace: result.requires_replace,
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Plan failed");
                pb::PlanResponse {
                    planned_state: vec![],
                    changes: vec![],
                    requires_replace: false,
                    diagnostics: error_to_proto(e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.create")]
    async fn create(&self, request: Request<pb::CreateRequest>) -> Result<Response<pb::CreateResponse>, Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, "Create called");

        let response = match self.provider.create(&req.resource_type, decode(&req.planned_state)).await {
            Ok(state) => pb::CreateResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Create failed");
                pb::CreateResponse {
                    state: vec![],
                    diagnostics: error_to_proto(e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.read")]
    async fn read(&self, request: Request<pb::ReadRequest>) -> Result<Response<pb::ReadResponse>, Status> {
        let req = request.into_inner();
        debug!(resource_type = %req.resource_type, "Read called");

        let response = match self.provider.read(&req.resource_type, decode(&req.current_state)).await {
            // An empty state tells the caller the object is gone.
            Ok(Value::Null) => pb::ReadResponse {
                state: vec![],
                diagnostics: vec![],
            },
            Ok(state) => pb::ReadResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Read failed");
                pb::ReadResponse {
                    state: vec![],
                    diagnostics: error_to_proto(e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.update")]
    async fn update(&self, request: Request<pb::UpdateRequest>) -> Result<Response<pb::UpdateResponse>, Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, "Update called");

        let response = match self
            .provider
            .update(&req.resource_type, decode(&req.prior_state), decode(&req.planned_state))
            .await
        {
            Ok(state) => pb::UpdateResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Update failed");
                pb::UpdateResponse {
                    state: vec![],
                    diagnostics: error_to_proto(e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.delete")]
    async fn delete(&self, request: Request<pb::DeleteRequest>) -> Result<Response<pb::DeleteResponse>, Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, "Delete called");

        let diagnostics = match self.provider.delete(&req.resource_type, decode(&req.current_state)).await {
            Ok(()) => vec![],
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Delete failed");
                error_to_proto(e)
            },
        };
        Ok(Response::new(pb::DeleteResponse { diagnostics }))
    }

    #[instrument(skip(self, request), name = "grpc.import_resource_state")]
    async fn import_resource_state(
        &self,
        request: Request<pb::ImportResourceStateRequest>,
    ) -> Result<Response<pb::ImportResourceStateResponse>, Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, id = %req.id, "ImportResourceState called");

        let response = match self.provider.import_resource(&req.resource_type, &req.id).await {
            Ok(imported) => pb::ImportResourceStateResponse {
                imported: imported
                    .into_iter()
                    .map(|r| pb::ImportedResource {
                        resource_type: r.resource_type,
                        state: encode(&r.state),
                    })
                    .collect(),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, id = %req.id, error = %e, "ImportResourceState failed");
                pb::ImportResourceStateResponse {
                    imported: vec![],
                    diagnostics: error_to_proto(e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.validate_data_source_config")]
    async fn validate_data_source_config(
        &self,
        request: Request<pb::ValidateDataSourceConfigRequest>,
    ) -> Result<Response<pb::ValidateDataSourceConfigResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .provider
            .validate_data_source_config(&req.data_source_type, decode(&req.config))
            .await;
        Ok(Response::new(pb::ValidateDataSourceConfigResponse {
            diagnostics: report("ValidateDataSourceConfig", &req.data_source_type, result),
        }))
    }

    #[instrument(skip(self, request), name = "grpc.read_data_source")]
    async fn read_data_source(
        &self,
        request: Request<pb::ReadDataSourceRequest>,
    ) -> Result<Response<pb::ReadDataSourceResponse>, Status> {
        let req = request.into_inner();
        debug!(data_source_type = %req.data_source_type, "ReadDataSource called");

        let response = match self
            .provider
            .read_data_source(&req.data_source_type, decode(&req.config))
            .await
        {
            Ok(state) => pb::ReadDataSourceResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(data_source_type = %req.data_source_type, error = %e, "ReadDataSource failed");
                pb::ReadDataSourceResponse {
                    state: vec![],
                    diagnostics: error_to_proto(e),
                }
            },
        };
        Ok(Response::new(response))
    }
}

/// Options for running the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may keep running after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Options with the default 30 second drain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how long in-flight requests may run after a shutdown signal.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Resolve once SIGTERM or SIGINT (CTRL+C on Windows) is received.
///
/// If the handlers cannot be installed the server keeps running until it is
/// killed.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "failed to install signal handlers, graceful shutdown disabled");
                return std::future::pending().await;
            },
        };

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
    }

    #[cfg(windows)]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install CTRL+C handler, graceful shutdown disabled");
            return std::future::pending().await;
        }
        info!("received CTRL+C, shutting down");
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::future::pending::<()>().await;
    }
}

/// Serve a provider on an ephemeral localhost port.
///
/// Prints `HEMMER_PROVIDER|<protocol version>|<address>` on stdout once the
/// listener is bound, then serves until a shutdown signal.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// [`serve`] with explicit [`ServeOptions`].
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    serve_on_listener(provider, listener, wait_for_shutdown_signal(), options).await
}

/// Serve a provider on a fixed address.
pub async fn serve_on<P: ProviderService>(provider: P, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    serve_on_with_options(provider, addr, ServeOptions::default()).await
}

/// [`serve_on`] with explicit [`ServeOptions`].
///
/// ```no_run
/// use std::time::Duration;
///
/// use devlake_provider::{serve_on_with_options, DevlakeProvider, ServeOptions};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let options = ServeOptions::new().with_shutdown_timeout(Duration::from_secs(5));
/// serve_on_with_options(DevlakeProvider::new("dev"), "127.0.0.1:50051".parse()?, options).await
/// # }
/// ```
pub async fn serve_on_with_options<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    serve_on_listener(provider, listener, wait_for_shutdown_signal(), options).await
}

async fn serve_on_listener<P, F>(
    provider: P,
    listener: TcpListener,
    shutdown: F,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>>
where
    P: ProviderService,
    F: std::future::Future<Output = ()>,
{
    let addr = listener.local_addr()?;
    println!("{}", handshake_line(addr));
    info!(address = %addr, "provider server starting");

    let provider = Arc::new(provider);
    let service = pb::provider_server::ProviderServer::new(ProviderGrpcService {
        provider: Arc::clone(&provider),
    });

    // The drain deadline starts when the signal fires, not when serving starts.
    let (signalled_tx, signalled_rx) = oneshot::channel();
    let server = Server::builder().add_service(service).serve_with_incoming_shutdown(
        tokio_stream::wrappers::TcpListenerStream::new(listener),
        async move {
            shutdown.await;
            let _ = signalled_tx.send(());
        },
    );
    tokio::pin!(server);

    let result = tokio::select! {
        result = &mut server => Some(result),
        _ = signalled_rx => {
            debug!(timeout = ?options.shutdown_timeout, "draining in-flight requests");
            tokio::time::timeout(options.shutdown_timeout, &mut server).await.ok()
        },
    };

    match result {
        Some(Ok(())) => info!("server shutdown complete"),
        Some(Err(e)) => {
            error!(error = %e, "server error");
            return Err(e.into());
        },
        None => warn!(timeout = ?options.shutdown_timeout, "shutdown timeout exceeded, abandoning in-flight requests"),
    }

    if let Err(e) = provider.stop().await {
        warn!(error = %e, "provider stop returned an error");
    }
    info!("provider shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generated::provider_server::Provider as _;
    use crate::provider::DevlakeProvider;
    use crate::schema::{Attribute, NestedBlock, Usage};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_decode_tolerates_empty_and_garbage() {
        assert_eq!(decode(b""), Value::Null);
        assert_eq!(decode(b"{not json"), Value::Null);
        assert_eq!(decode(br#"{"id":"1"}"#), json!({"id": "1"}));
    }

    #[test]
    fn test_error_to_proto() {
        let diags = error_to_proto(ProviderError::NotFound("connection 3".into()));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, pb::diagnostic::Severity::Error as i32);
        assert_eq!(diags[0].summary, "Resource not found");
        assert_eq!(diags[0].detail, "connection 3");
    }

    #[test]
    fn test_error_to_proto_splits_summary_and_detail() {
        let err = ProviderError::from(crate::error::ClientError::Status {
            status: 500,
            body: "boom".to_string(),
        })
        .context("Could not create devlake github connection, unexpected error");

        let diags = error_to_proto(err);
        assert_eq!(diags[0].summary, "Service unavailable");
        assert_eq!(
            diags[0].detail,
            "Could not create devlake github connection, unexpected error: status: 500, body: boom"
        );
        assert!(diags[0].attribute.is_empty());

        let decode = serde_json::from_str::<u32>("nope").unwrap_err();
        let expected = decode.to_string();
        let diags = error_to_proto(ProviderError::Serialization(decode));
        assert_eq!(diags[0].summary, "Serialization error");
        assert_eq!(diags[0].detail, expected);
    }

    #[test]
    fn test_report_keeps_attribute_paths() {
        let diags = report(
            "Configure",
            "provider",
            Ok(vec![Diagnostic::error("Missing devlake api token").with_attribute("token")]),
        );
        assert_eq!(diags[0].attribute, "token");
        assert_eq!(diags[0].summary, "Missing devlake api token");
    }

    #[test]
    fn test_block_to_proto_keeps_name_order_and_defaults() {
        let block = Block::new()
            .with_attribute("name", Attribute::string(Usage::Required))
            .with_attribute("enable_graphql", Attribute::bool(Usage::OptionalComputed).with_default(json!(true)));
        let schema = Schema::new()
            .with_attribute("id", Attribute::string(Usage::Computed))
            .with_block("refdiff", NestedBlock::single(block));

        let proto = schema_to_proto(&schema);
        let block = proto.block.unwrap();
        assert_eq!(block.attributes[0].name, "id");

        let nested = &block.block_types[0];
        assert_eq!(nested.type_name, "refdiff");
        assert_eq!(nested.nesting_mode, pb::nested_block::NestingMode::Single as i32);
        let nested = nested.block.as_ref().unwrap();
        assert_eq!(nested.attributes[0].name, "enable_graphql");
        assert_eq!(nested.attributes[0].default_value, b"true".to_vec());
    }

    struct Stoppable {
        stopped: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait::async_trait]
    impl ProviderService for Stoppable {
        fn schema(&self) -> ProviderSchema {
            ProviderSchema::default()
        }

        async fn configure(&self, _config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
            Ok(vec![])
        }

        async fn stop(&self) -> Result<(), ProviderError> {
            self.stopped.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }

        async fn plan(
            &self,
            _resource_type: &str,
            _prior_state: Option<Value>,
            proposed_state: Value,
            _config: Value,
        ) -> Result<PlanResult, ProviderError> {
            Ok(PlanResult::unchanged(proposed_state))
        }

        async fn create(&self, _resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
            Ok(planned_state)
        }

        async fn read(&self, _resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
            Ok(current_state)
        }

        async fn update(
            &self,
            _resource_type: &str,
            _prior_state: Value,
            planned_state: Value,
        ) -> Result<Value, ProviderError> {
            Ok(planned_state)
        }

        async fn delete(&self, _resource_type: &str, _current_state: Value) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_provider() {
        let stopped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let provider = Stoppable {
            stopped: Arc::clone(&stopped),
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        // Signal immediately: the server starts, drains nothing and stops.
        serve_on_listener(
            provider,
            listener,
            async {},
            ServeOptions::new().with_shutdown_timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap();

        assert!(stopped.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_default_metadata_is_empty() {
        let provider = Stoppable {
            stopped: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        };
        let metadata = provider.metadata();
        assert!(metadata.resources.is_empty());
        assert!(!metadata.capabilities.plan_destroy);
    }

    fn devlake() -> ProviderGrpcService<DevlakeProvider> {
        ProviderGrpcService {
            provider: Arc::new(DevlakeProvider::new("test")),
        }
    }

    async fn configured(server: &MockServer) -> ProviderGrpcService<DevlakeProvider> {
        let service = devlake();
        let response = service
            .configure(Request::new(pb::ConfigureRequest {
                config: encode(&json!({"host": server.uri(), "token": "t"})),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        service
    }

    async fn mount_apikeys(server: &MockServer, keys: Value) {
        Mock::given(method("GET"))
            .and(path("/api-keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"apikeys": keys})))
            .mount(server)
            .await;
    }

    fn remote_key() -> Value {
        json!({
            "id": 1,
            "allowedPath": ".*",
            "apiKey": "****",
            "expiredAt": "2030-01-01T00:00:00Z",
            "name": "ci",
            "type": "devlake"
        })
    }

    #[tokio::test]
    async fn test_grpc_metadata_and_schema_list_devlake_types() {
        let service = devlake();

        let metadata = service
            .get_metadata(Request::new(pb::GetMetadataRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert!(metadata.resources.contains(&"devlake_github_connection".to_string()));
        assert_eq!(metadata.data_sources, vec!["devlake_apikeys".to_string()]);

        let schema = service
            .get_schema(Request::new(pb::GetSchemaRequest {}))
            .await
            .unwrap()
            .into_inner();
        let provider = schema.provider.unwrap().block.unwrap();
        assert!(provider.attributes.iter().any(|a| a.name == "token" && a.sensitive));
        assert!(schema.resources.contains_key("devlake_apikey"));
    }

    #[tokio::test]
    async fn test_grpc_read_of_missing_object_returns_empty_state() {
        let server = MockServer::start().await;
        mount_apikeys(&server, json!([])).await;
        let service = configured(&server).await;

        let response = service
            .read(Request::new(pb::ReadRequest {
                resource_type: "devlake_apikey".to_string(),
                current_state: encode(&json!({"id": "1", "name": "ci"})),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.state.is_empty());
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_grpc_read_encodes_refreshed_state() {
        let server = MockServer::start().await;
        mount_apikeys(&server, json!([remote_key()])).await;
        let service = configured(&server).await;

        let response = service
            .read(Request::new(pb::ReadRequest {
                resource_type: "devlake_apikey".to_string(),
                current_state: encode(&json!({"id": "1", "name": "ci"})),
            }))
            .await
            .unwrap()
            .into_inner();
        let state = decode(&response.state);
        assert_eq!(state["id"], "1");
        assert_eq!(state["allowed_path"], ".*");
    }

    #[tokio::test]
    async fn test_grpc_failures_become_diagnostics() {
        let service = devlake();

        // Not configured yet.
        let response = service
            .create(Request::new(pb::CreateRequest {
                resource_type: "devlake_apikey".to_string(),
                planned_state: encode(&json!({"name": "ci"})),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.state.is_empty());
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].severity, pb::diagnostic::Severity::Error as i32);
        assert_eq!(response.diagnostics[0].summary, "Configuration error");
        assert!(response.diagnostics[0].detail.contains("Configure"));

        let response = service
            .plan(Request::new(pb::PlanRequest {
                resource_type: "devlake_gitlab_connection".to_string(),
                config: encode(&json!({"name": "gl"})),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.planned_state.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Unknown resource type");
        assert_eq!(response.diagnostics[0].detail, "devlake_gitlab_connection");
    }

    #[tokio::test]
    async fn test_grpc_server_error_keeps_context_in_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api-keys"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        let service = configured(&server).await;

        let response = service
            .read(Request::new(pb::ReadRequest {
                resource_type: "devlake_apikey".to_string(),
                current_state: encode(&json!({"id": "1"})),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.state.is_empty());
        let diagnostic = &response.diagnostics[0];
        assert_eq!(diagnostic.summary, "Service unavailable");
        assert!(diagnostic.detail.ends_with("status: 500, body: boom"), "{}", diagnostic.detail);
    }

    #[tokio::test]
    async fn test_grpc_plan_without_prior_state_creates() {
        let service = devlake();

        let response = service
            .plan(Request::new(pb::PlanRequest {
                resource_type: "devlake_apikey".to_string(),
                prior_state: vec![],
                proposed_state: vec![],
                config: encode(&json!({
                    "allowed_path": ".*",
                    "expired_at": "2030-01-01T00:00:00Z",
                    "name": "ci"
                })),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert!(!response.requires_replace);

        let planned = decode(&response.planned_state);
        assert_eq!(planned["name"], "ci");
        assert!(planned["id"].is_null());

        let name = response.changes.iter().find(|c| c.path == "name").unwrap();
        assert!(name.before.is_empty());
        assert_eq!(name.after, br#""ci""#.to_vec());
        assert!(response.changes.iter().all(|c| c.before.is_empty()));
    }

    #[tokio::test]
    async fn test_grpc_import_encodes_state() {
        let server = MockServer::start().await;
        mount_apikeys(&server, json!([remote_key()])).await;
        let service = configured(&server).await;

        let response = service
            .import_resource_state(Request::new(pb::ImportResourceStateRequest {
                resource_type: "devlake_apikey".to_string(),
                id: "1".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(response.imported.len(), 1);
        assert_eq!(response.imported[0].resource_type, "devlake_apikey");
        let state = decode(&response.imported[0].state);
        assert_eq!(state["id"], "1");
        assert_eq!(state["name"], "ci");

        let response = service
            .import_resource_state(Request::new(pb::ImportResourceStateRequest {
                resource_type: "devlake_apikey".to_string(),
                id: "2".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.imported.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Resource not found");
    }

    #[tokio::test]
    async fn test_grpc_validate_resource_config_reports_attribute() {
        let service = devlake();

        let response = service
            .validate_resource_config(Request::new(pb::ValidateResourceConfigRequest {
                resource_type: "devlake_apikey".to_string(),
                config: encode(&json!({"allowed_path": ".*", "expired_at": "2030-01-01T00:00:00Z"})),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].attribute, "name");
    }

    #[tokio::test]
    async fn test_grpc_stop_reports_no_error() {
        let response = devlake()
            .stop(Request::new(pb::StopRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert!(response.error.is_empty());
    }
}
