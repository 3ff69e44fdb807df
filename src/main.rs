use devlake_provider::{serve, try_init_logging, DevlakeProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    try_init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting devlake provider");

    serve(DevlakeProvider::new(env!("CARGO_PKG_VERSION"))).await
}
