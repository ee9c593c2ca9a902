//! etcd registry backend.
//!
//! Instances live under `"/rpc/" + service_node_key`, serialized as JSON
//! and bound to a TTL lease. A background task renews every tracked lease;
//! discovery is cache-first with a prefix watch per service key so that a
//! deleted instance invalidates exactly the affected cache entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{
    Client, ConnectOptions, EventType, GetOptions, PutOptions, WatchOptions, Watcher,
};
use lariat_common::config::RegistryConfig;
use lariat_common::error::{Result, RpcError};
use lariat_common::model::ServiceMetaInfo;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::RegistryCache;
use crate::Registry;

/// Root prefix of all registry keys in etcd.
pub const ETCD_ROOT_PATH: &str = "/rpc/";

struct RegisteredNode {
    meta: ServiceMetaInfo,
    lease_id: i64,
}

enum RenewOutcome {
    Alive,
    Reregistered(i64),
}

/// Service registry backed by etcd.
pub struct EtcdRegistry {
    client: Client,
    cache: Arc<RegistryCache>,
    /// Locally registered nodes, kept for lease renewal. Mutated by both
    /// the call path (register/unregister) and the renewal task.
    tracked: Arc<Mutex<HashMap<String, RegisteredNode>>>,
    /// One watcher per service key; doubles as the idempotence guard so a
    /// prefix is never watched twice.
    watchers: Mutex<HashMap<String, Watcher>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    lease_ttl: i64,
}

impl EtcdRegistry {
    /// Connect to etcd and start the background lease renewal task.
    pub async fn connect(config: &RegistryConfig) -> Result<Self> {
        let options = ConnectOptions::new().with_connect_timeout(config.connect_timeout());
        let client = Client::connect(config.endpoints.clone(), Some(options))
            .await
            .map_err(|e| {
                RpcError::Discovery(format!(
                    "failed to connect to etcd at {:?}: {e}",
                    config.endpoints
                ))
            })?;

        let registry = Self {
            client,
            cache: Arc::new(RegistryCache::new()),
            tracked: Arc::new(Mutex::new(HashMap::new())),
            watchers: Mutex::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            lease_ttl: config.lease_ttl_secs,
        };
        let renewal = registry.spawn_renewal_task(config.heartbeat_interval());
        registry.tasks.lock().await.push(renewal);

        info!(endpoints = ?config.endpoints, "connected to etcd registry");
        Ok(registry)
    }

    /// The local read cache. Exposed for introspection.
    pub fn cache(&self) -> &RegistryCache {
        &self.cache
    }

    fn spawn_renewal_task(&self, interval: Duration) -> JoinHandle<()> {
        let client = self.client.clone();
        let tracked = self.tracked.clone();
        let ttl = self.lease_ttl;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick of an interval fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                renew_tracked(&client, &tracked, ttl).await;
            }
        })
    }

    async fn ensure_watch(&self, service_key: &str, prefix: &str) -> Result<()> {
        let mut watchers = self.watchers.lock().await;
        if watchers.contains_key(service_key) {
            return Ok(());
        }

        let mut watch_client = self.client.watch_client();
        let (watcher, mut stream) = watch_client
            .watch(prefix.to_string(), Some(WatchOptions::new().with_prefix()))
            .await
            .map_err(|e| RpcError::Discovery(format!("failed to watch {prefix}: {e}")))?;

        let cache = self.cache.clone();
        let key = service_key.to_string();
        let task = tokio::spawn(async move {
            loop {
                match stream.message().await {
                    Ok(Some(response)) => {
                        for event in response.events() {
                            apply_watch_event(&cache, &key, event.event_type()).await;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(service_key = %key, "registry watch stream failed: {err}");
                        break;
                    }
                }
            }
            debug!(service_key = %key, "registry watch ended");
        });
        self.tasks.lock().await.push(task);
        watchers.insert(service_key.to_string(), watcher);
        Ok(())
    }
}

impl std::fmt::Debug for EtcdRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtcdRegistry")
            .field("lease_ttl", &self.lease_ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Registry for EtcdRegistry {
    async fn register(&self, meta: ServiceMetaInfo) -> Result<()> {
        let lease_id = put_with_lease(&self.client, &meta, self.lease_ttl).await?;
        let key = registry_key(&meta);
        info!(key = %key, lease_id, "registered service instance");
        self.tracked
            .lock()
            .await
            .insert(key, RegisteredNode { meta, lease_id });
        Ok(())
    }

    async fn unregister(&self, meta: &ServiceMetaInfo) -> Result<()> {
        let key = registry_key(meta);
        self.tracked.lock().await.remove(&key);
        let mut kv = self.client.kv_client();
        match kv.delete(key.clone(), None).await {
            Ok(_) => info!(key = %key, "unregistered service instance"),
            Err(err) => warn!(key = %key, "best-effort unregister failed: {err}"),
        }
        Ok(())
    }

    async fn discover(&self, service_key: &str) -> Result<Vec<ServiceMetaInfo>> {
        if let Some(cached) = self.cache.read(service_key).await {
            if !cached.is_empty() {
                debug!(service_key, instances = cached.len(), "discovery served from cache");
                return Ok(cached);
            }
        }

        let prefix = service_prefix(service_key);
        let mut kv = self.client.kv_client();
        let response = kv
            .get(prefix.clone(), Some(GetOptions::new().with_prefix()))
            .await
            .map_err(|e| RpcError::Discovery(format!("etcd prefix query {prefix} failed: {e}")))?;

        let mut instances = Vec::with_capacity(response.kvs().len());
        for entry in response.kvs() {
            match serde_json::from_slice::<ServiceMetaInfo>(entry.value()) {
                Ok(meta) => instances.push(meta),
                Err(err) => warn!(
                    key = %String::from_utf8_lossy(entry.key()),
                    "skipping undecodable registry entry: {err}"
                ),
            }
        }
        debug!(service_key, instances = instances.len(), "discovery queried the store");

        self.cache.write(service_key, instances.clone()).await;
        self.ensure_watch(service_key, &prefix).await?;
        Ok(instances)
    }

    async fn destroy(&self) -> Result<()> {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        for (_, mut watcher) in self.watchers.lock().await.drain() {
            if let Err(err) = watcher.cancel().await {
                debug!("watch cancel failed during destroy: {err}");
            }
        }
        self.tracked.lock().await.clear();
        self.cache.clear().await;
        info!("registry destroyed");
        Ok(())
    }
}

/// Storage key of one instance: `"/rpc/" + name:version/host:port`.
pub fn registry_key(meta: &ServiceMetaInfo) -> String {
    format!("{ETCD_ROOT_PATH}{}", meta.service_node_key())
}

/// Prefix all instances of a logical service share. Ends in `/` so that
/// `com.x.Foo:1.0` never matches `com.x.FooBar:1.0`.
pub fn service_prefix(service_key: &str) -> String {
    format!("{ETCD_ROOT_PATH}{service_key}/")
}

async fn put_with_lease(client: &Client, meta: &ServiceMetaInfo, ttl: i64) -> Result<i64> {
    let mut lease = client.lease_client();
    let granted = lease
        .grant(ttl, None)
        .await
        .map_err(|e| RpcError::Registration(format!("lease grant failed: {e}")))?;

    let key = registry_key(meta);
    let value = serde_json::to_string(meta)?;
    let mut kv = client.kv_client();
    kv.put(key.clone(), value, Some(PutOptions::new().with_lease(granted.id())))
        .await
        .map_err(|e| RpcError::Registration(format!("failed to write {key}: {e}")))?;
    Ok(granted.id())
}

/// One renewal pass over every locally tracked node.
async fn renew_tracked(
    client: &Client,
    tracked: &Mutex<HashMap<String, RegisteredNode>>,
    ttl: i64,
) {
    let snapshot: Vec<(String, ServiceMetaInfo, i64)> = tracked
        .lock()
        .await
        .iter()
        .map(|(key, node)| (key.clone(), node.meta.clone(), node.lease_id))
        .collect();

    for (key, meta, lease_id) in snapshot {
        match renew_node(client, &key, &meta, lease_id, ttl).await {
            Ok(RenewOutcome::Alive) => debug!(key = %key, "lease renewed"),
            Ok(RenewOutcome::Reregistered(new_lease)) => {
                warn!(key = %key, "registration had lapsed, re-registered under a new lease");
                if let Some(node) = tracked.lock().await.get_mut(&key) {
                    node.lease_id = new_lease;
                }
            }
            Err(err) => {
                // The instance is now effectively offline and needs an
                // external restart to rejoin.
                error!(key = %key, "lease renewal failed, dropping instance from local tracking: {err}");
                tracked.lock().await.remove(&key);
            }
        }
    }
}

async fn renew_node(
    client: &Client,
    key: &str,
    meta: &ServiceMetaInfo,
    lease_id: i64,
    ttl: i64,
) -> Result<RenewOutcome> {
    let mut kv = client.kv_client();
    let present = !kv
        .get(key, None)
        .await
        .map_err(|e| RpcError::LeaseRenewal(format!("failed to re-read {key}: {e}")))?
        .kvs()
        .is_empty();

    if present {
        let mut lease = client.lease_client();
        let extended = match lease.keep_alive(lease_id).await {
            Ok((mut keeper, mut stream)) => {
                keeper.keep_alive().await.is_ok()
                    && matches!(stream.message().await, Ok(Some(reply)) if reply.ttl() > 0)
            }
            Err(_) => false,
        };
        if extended {
            return Ok(RenewOutcome::Alive);
        }
    }

    // Lease lapsed faster than renewal: one re-registration attempt.
    let new_lease = put_with_lease(client, meta, ttl)
        .await
        .map_err(|e| RpcError::LeaseRenewal(format!("re-registration of {key} failed: {e}")))?;
    Ok(RenewOutcome::Reregistered(new_lease))
}

/// Route one watch event into the cache. A DELETE invalidates exactly the
/// affected service key; PUTs leave the cache alone until the next miss.
pub(crate) async fn apply_watch_event(
    cache: &RegistryCache,
    service_key: &str,
    event: EventType,
) {
    match event {
        EventType::Delete => {
            info!(service_key, "instance removed from registry, invalidating cached discovery");
            cache.invalidate(service_key).await;
        }
        EventType::Put => {}
    }
}
