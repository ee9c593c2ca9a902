//! Lariat Service Registry
//!
//! Providers publish their live instances here; consumers discover them.
//! The authoritative mapping of logical service to live instances lives in
//! a distributed coordination store (etcd), with a local read cache in
//! front of it that watch notifications keep honest.
//!
//! # Lifecycle of a registered instance
//!
//! An instance is written under a time-bounded lease. A background task
//! renews the lease periodically; if a lease lapses faster than renewal,
//! one re-registration is attempted, and a second failure takes the
//! instance offline for good (it needs an external restart to rejoin).
//!
//! # Components
//!
//! - [`Registry`] - the backend-neutral registry interface
//! - [`EtcdRegistry`](etcd::EtcdRegistry) - the etcd backend
//! - [`RegistryCache`](cache::RegistryCache) - the keyed local read cache
//! - [`registry_for_key`] - backend selection by configuration key

pub mod cache;
pub mod etcd;

use std::sync::Arc;

use async_trait::async_trait;
use lariat_common::config::RegistryConfig;
use lariat_common::error::{Result, RpcError};
use lariat_common::model::ServiceMetaInfo;

pub use cache::RegistryCache;
pub use etcd::EtcdRegistry;

/// Configuration key of the etcd backend.
pub const REGISTRY_ETCD: &str = "etcd";

/// Distributed service registry.
///
/// Implementations keep the store authoritative: a cache may answer
/// repeated discoveries, but a miss always falls through to the store.
#[async_trait]
pub trait Registry: Send + Sync + std::fmt::Debug {
    /// Publish one instance under a fresh lease and start tracking it for
    /// renewal.
    async fn register(&self, meta: ServiceMetaInfo) -> Result<()>;

    /// Withdraw one instance. Best-effort: local tracking stops even if
    /// the store delete fails, so shutdown can always proceed.
    async fn unregister(&self, meta: &ServiceMetaInfo) -> Result<()>;

    /// All live instances of a logical service (`name:version`).
    async fn discover(&self, service_key: &str) -> Result<Vec<ServiceMetaInfo>>;

    /// Release store clients and background tasks. Called once at process
    /// teardown.
    async fn destroy(&self) -> Result<()>;
}

/// Build the registry backend selected by configuration key.
pub async fn registry_for_key(key: &str, config: &RegistryConfig) -> Result<Arc<dyn Registry>> {
    match key {
        REGISTRY_ETCD => Ok(Arc::new(EtcdRegistry::connect(config).await?)),
        other => Err(RpcError::Config(format!(
            "unknown registry backend '{other}'"
        ))),
    }
}
