//! A provider process: registers a greeter service in etcd and serves it.
//!
//! Needs a reachable etcd (default `http://127.0.0.1:2379`):
//!
//! ```text
//! cargo run -p lariat-server --example provider
//! ```

use std::sync::Arc;

use lariat_common::config::RpcConfig;
use lariat_registry::registry_for_key;
use lariat_server::{FnInvoker, Provider, ServiceInvoker};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = RpcConfig {
        server_host: "127.0.0.1".to_string(),
        server_port: 9000,
        ..RpcConfig::default()
    };

    let registry = registry_for_key(&config.registry.backend, &config.registry).await?;
    let provider = Provider::new(config, registry);

    let greeter: Arc<dyn ServiceInvoker> =
        Arc::new(FnInvoker::new().method("hello", |params| async move {
            let name = params
                .first()
                .and_then(|p| p.as_str())
                .unwrap_or("world")
                .to_string();
            Ok(json!(format!("hello, {name}")))
        }));
    provider
        .register_service("com.demo.Greeter", "1.0", greeter)
        .await?;

    provider.serve().await?;
    Ok(())
}
