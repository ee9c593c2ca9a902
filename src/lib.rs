//! Lariat
//!
//! An RPC framework: a caller invokes a local interface and the call is
//! routed to a remote implementation over a binary TCP protocol, with
//! etcd-backed service discovery, load balancing, retries and fault
//! tolerance.
//!
//! This crate is a facade over the workspace members:
//!
//! - [`common`] - data model, wire codec, errors, configuration
//! - [`registry`] - the etcd-backed service registry and its read cache
//! - [`client`] - TCP transport, resilience pipeline, call orchestrator
//! - [`server`] - TCP server role, service table, provider bootstrap
//!
//! # A provider
//!
//! ```no_run
//! use std::sync::Arc;
//! use lariat::{FnInvoker, Provider, RpcConfig, ServiceInvoker};
//! use lariat::registry::registry_for_key;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RpcConfig::default();
//! let registry = registry_for_key(&config.registry.backend, &config.registry).await?;
//! let provider = Provider::new(config, registry);
//!
//! let greeter: Arc<dyn ServiceInvoker> = Arc::new(
//!     FnInvoker::new().method("hello", |_params| async move { Ok(json!("hi")) }),
//! );
//! provider.register_service("com.demo.Greeter", "1.0", greeter).await?;
//! provider.serve().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # A consumer
//!
//! ```no_run
//! use lariat::{RpcCaller, RpcConfig, RpcRequest};
//! use lariat::registry::registry_for_key;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RpcConfig::default();
//! let registry = registry_for_key(&config.registry.backend, &config.registry).await?;
//! let caller = RpcCaller::new(config, registry)?;
//!
//! let result = caller.call(RpcRequest::new("com.demo.Greeter", "hello")).await?;
//! # Ok(())
//! # }
//! ```

pub use lariat_client as client;
pub use lariat_common as common;
pub use lariat_registry as registry;
pub use lariat_server as server;

pub use lariat_client::RpcCaller;
pub use lariat_common::{Result, RpcConfig, RpcError, RpcRequest, RpcResponse, ServiceMetaInfo};
pub use lariat_registry::Registry;
pub use lariat_server::{FnInvoker, Provider, ServiceInvoker, TcpServer};
