use std::collections::HashMap;

use lariat_common::model::ServiceMetaInfo;
use tokio::sync::RwLock;

/// Local read cache of discovery results, keyed by service key.
///
/// Populated on a discovery miss and invalidated by watch notifications,
/// one service key at a time. The cache is never the sole source of
/// truth: a miss (or an empty entry) always falls through to the store.
#[derive(Default)]
pub struct RegistryCache {
    entries: RwLock<HashMap<String, Vec<ServiceMetaInfo>>>,
}

impl RegistryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self, service_key: &str) -> Option<Vec<ServiceMetaInfo>> {
        self.entries.read().await.get(service_key).cloned()
    }

    pub async fn write(&self, service_key: &str, instances: Vec<ServiceMetaInfo>) {
        self.entries
            .write()
            .await
            .insert(service_key.to_string(), instances);
    }

    /// Drop exactly one service key's entry, leaving the rest untouched.
    pub async fn invalidate(&self, service_key: &str) {
        self.entries.write().await.remove(service_key);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(service: &str, port: u16) -> ServiceMetaInfo {
        ServiceMetaInfo::new(service, "1.0", "localhost", port)
    }

    #[tokio::test]
    async fn read_misses_until_written() {
        let cache = RegistryCache::new();
        assert!(cache.read("com.x.Foo:1.0").await.is_none());

        cache
            .write("com.x.Foo:1.0", vec![instance("com.x.Foo", 9000)])
            .await;
        let cached = cache.read("com.x.Foo:1.0").await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].service_port, 9000);
    }

    #[tokio::test]
    async fn invalidate_clears_exactly_one_key() {
        let cache = RegistryCache::new();
        cache
            .write("com.x.Foo:1.0", vec![instance("com.x.Foo", 9000)])
            .await;
        cache
            .write("com.x.Bar:1.0", vec![instance("com.x.Bar", 9001)])
            .await;

        cache.invalidate("com.x.Foo:1.0").await;

        assert!(cache.read("com.x.Foo:1.0").await.is_none());
        assert!(cache.read("com.x.Bar:1.0").await.is_some());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn write_replaces_previous_entry() {
        let cache = RegistryCache::new();
        cache
            .write("com.x.Foo:1.0", vec![instance("com.x.Foo", 9000)])
            .await;
        cache
            .write(
                "com.x.Foo:1.0",
                vec![instance("com.x.Foo", 9000), instance("com.x.Foo", 9001)],
            )
            .await;

        assert_eq!(cache.read("com.x.Foo:1.0").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn clear_empties_everything() {
        let cache = RegistryCache::new();
        cache
            .write("com.x.Foo:1.0", vec![instance("com.x.Foo", 9000)])
            .await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
