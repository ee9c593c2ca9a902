//! Provider bootstrap: the service table, the registry registrations and
//! the accept loop, tied together with a best-effort shutdown.

use std::sync::Arc;

use lariat_common::config::RpcConfig;
use lariat_common::error::Result;
use lariat_common::model::ServiceMetaInfo;
use lariat_registry::Registry;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::server::TcpServer;
use crate::service::{LocalServiceTable, ServiceInvoker};

/// A serving process: local implementations plus their registry presence.
pub struct Provider {
    config: RpcConfig,
    registry: Arc<dyn Registry>,
    services: Arc<LocalServiceTable>,
    registered: Mutex<Vec<ServiceMetaInfo>>,
}

impl Provider {
    pub fn new(config: RpcConfig, registry: Arc<dyn Registry>) -> Self {
        Self {
            config,
            registry,
            services: Arc::new(LocalServiceTable::new()),
            registered: Mutex::new(Vec::new()),
        }
    }

    /// Install an implementation in the local table and publish this
    /// instance to the registry under the configured listen address.
    pub async fn register_service(
        &self,
        service_name: &str,
        service_version: &str,
        invoker: Arc<dyn ServiceInvoker>,
    ) -> Result<()> {
        self.services.register(service_name, invoker).await;

        let meta = ServiceMetaInfo::new(
            service_name,
            service_version,
            self.config.server_host.clone(),
            self.config.server_port,
        );
        self.registry.register(meta.clone()).await?;
        info!(
            service = %meta.service_key(),
            address = %meta.service_address(),
            "service registered"
        );
        self.registered.lock().await.push(meta);
        Ok(())
    }

    /// Bind the configured listen address and serve until the task ends.
    pub async fn serve(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.server_host, self.config.server_port);
        let server = TcpServer::bind(&addr, self.services.clone()).await?;
        info!(%addr, "provider listening");
        server.run().await
    }

    /// Withdraw every registration and release the registry. Best-effort:
    /// shutdown proceeds whatever the store says.
    pub async fn shutdown(&self) {
        for meta in self.registered.lock().await.drain(..) {
            if let Err(err) = self.registry.unregister(&meta).await {
                warn!(service = %meta.service_key(), "unregister during shutdown failed: {err}");
            }
        }
        if let Err(err) = self.registry.destroy().await {
            warn!("registry teardown failed: {err}");
        }
        info!("provider shut down");
    }
}
