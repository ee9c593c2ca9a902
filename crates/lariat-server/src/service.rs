//! Local service table and invoker abstraction.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use lariat_common::error::{Result, RpcError};
use serde_json::Value;
use tokio::sync::RwLock;

/// A registered service implementation.
///
/// Invokers are built once at registration time; invocation is a table
/// lookup by method name, never reflection. Failures come back as
/// [`RpcError::RemoteExecution`] and end up in the response's exception
/// field rather than tearing down the connection.
#[async_trait]
pub trait ServiceInvoker: Send + Sync {
    async fn invoke(&self, method_name: &str, parameters: Vec<Value>) -> Result<Value>;
}

type MethodHandler = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A [`ServiceInvoker`] assembled from one async closure per method.
///
/// ```
/// use lariat_server::FnInvoker;
/// use serde_json::json;
///
/// let invoker = FnInvoker::new().method("hello", |params| async move {
///     let name = params.first().and_then(|p| p.as_str()).unwrap_or("world");
///     Ok(json!(format!("hello, {name}")))
/// });
/// ```
#[derive(Default)]
pub struct FnInvoker {
    methods: HashMap<String, MethodHandler>,
}

impl FnInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.methods
            .insert(name.into(), Arc::new(move |params| Box::pin(handler(params))));
        self
    }
}

#[async_trait]
impl ServiceInvoker for FnInvoker {
    async fn invoke(&self, method_name: &str, parameters: Vec<Value>) -> Result<Value> {
        match self.methods.get(method_name) {
            Some(handler) => handler(parameters).await,
            None => Err(RpcError::RemoteExecution(format!(
                "unknown method '{method_name}'"
            ))),
        }
    }
}

/// Maps service names to their implementations for the server role.
#[derive(Default)]
pub struct LocalServiceTable {
    services: RwLock<HashMap<String, Arc<dyn ServiceInvoker>>>,
}

impl LocalServiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, service_name: impl Into<String>, invoker: Arc<dyn ServiceInvoker>) {
        self.services.write().await.insert(service_name.into(), invoker);
    }

    pub async fn lookup(&self, service_name: &str) -> Option<Arc<dyn ServiceInvoker>> {
        self.services.read().await.get(service_name).cloned()
    }

    pub async fn remove(&self, service_name: &str) {
        self.services.write().await.remove(service_name);
    }

    pub async fn service_names(&self) -> Vec<String> {
        self.services.read().await.keys().cloned().collect()
    }
}
