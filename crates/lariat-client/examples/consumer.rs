//! A consumer process: discovers the demo greeter through etcd and calls it.
//!
//! Run the `provider` example from `lariat-server` first, then:
//!
//! ```text
//! cargo run -p lariat-client --example consumer
//! ```

use lariat_client::RpcCaller;
use lariat_common::config::RpcConfig;
use lariat_common::model::RpcRequest;
use lariat_registry::registry_for_key;
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
        retry_strategy: "fixedinterval".to_string(),
        tolerant_strategy: "failover".to_string(),
        ..RpcConfig::default()
    };

    let registry = registry_for_key(&config.registry.backend, &config.registry).await?;
    let caller = RpcCaller::new(config, registry)?;

    let request = RpcRequest::new("com.demo.Greeter", "hello")
        .with_parameters(vec!["string".into()], vec![json!("lariat")]);
    let result = caller.call(request).await?;
    println!("remote said: {result}");
    Ok(())
}
