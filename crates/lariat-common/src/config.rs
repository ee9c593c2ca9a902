use std::time::Duration;

use serde::Deserialize;

/// Framework configuration.
///
/// Constructed once at process start and passed by reference into every
/// component; there is no global mutable default. All fields have sensible
/// defaults so a config can be deserialized from a partial document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Framework instance name, used in logs only.
    pub name: String,
    pub version: String,
    /// Host the provider listens on and advertises to the registry.
    pub server_host: String,
    pub server_port: u16,
    /// Serializer key, see `lariat_common::serialize`.
    pub serializer: String,
    /// Load balancer key ("random", "roundrobin").
    pub load_balancer: String,
    /// Retry strategy key ("no", "fixedinterval").
    pub retry_strategy: String,
    /// Fault tolerance key ("failfast", "failsafe", "failover", "failback").
    pub tolerant_strategy: String,
    /// Per-attempt timeout for a remote call, in milliseconds.
    pub call_timeout_ms: u64,
    pub registry: RegistryConfig,
}

impl RpcConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            name: "lariat".to_string(),
            version: "1.0".to_string(),
            server_host: "localhost".to_string(),
            server_port: 8080,
            serializer: "json".to_string(),
            load_balancer: "random".to_string(),
            retry_strategy: "no".to_string(),
            tolerant_strategy: "failfast".to_string(),
            call_timeout_ms: 5000,
            registry: RegistryConfig::default(),
        }
    }
}

/// Coordination store settings for the service registry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry backend key ("etcd").
    pub backend: String,
    pub endpoints: Vec<String>,
    pub connect_timeout_ms: u64,
    /// TTL granted to a registration lease. The instance disappears from
    /// the registry this long after its last successful renewal.
    pub lease_ttl_secs: i64,
    /// Interval of the background lease renewal task.
    pub heartbeat_interval_secs: u64,
}

impl RegistryConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: "etcd".to_string(),
            endpoints: vec!["http://127.0.0.1:2379".to_string()],
            connect_timeout_ms: 10_000,
            lease_ttl_secs: 30,
            heartbeat_interval_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = RpcConfig::default();
        assert_eq!(config.serializer, "json");
        assert_eq!(config.load_balancer, "random");
        assert_eq!(config.retry_strategy, "no");
        assert_eq!(config.tolerant_strategy, "failfast");
        assert_eq!(config.call_timeout(), Duration::from_millis(5000));
        assert_eq!(config.registry.backend, "etcd");
        assert_eq!(config.registry.lease_ttl_secs, 30);
    }

    #[test]
    fn partial_document_fills_in_defaults() {
        let config: RpcConfig = serde_json::from_str(
            r#"{"server_port": 9100, "registry": {"endpoints": ["http://etcd-a:2379"]}}"#,
        )
        .unwrap();
        assert_eq!(config.server_port, 9100);
        assert_eq!(config.server_host, "localhost");
        assert_eq!(config.registry.endpoints, vec!["http://etcd-a:2379"]);
        assert_eq!(config.registry.heartbeat_interval_secs, 10);
    }
}
