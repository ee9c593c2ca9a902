//! Load balancing policies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lariat_common::error::{Result, RpcError};
use lariat_common::model::{RpcRequest, ServiceMetaInfo};
use rand::Rng;

/// Configuration keys of the shipped policies.
pub const LOAD_BALANCER_RANDOM: &str = "random";
pub const LOAD_BALANCER_ROUND_ROBIN: &str = "roundrobin";

/// Call metadata handed to a policy, so content-aware strategies can key
/// off the method or the request itself.
pub struct SelectContext<'a> {
    pub method_name: &'a str,
    pub request: &'a RpcRequest,
}

/// Picks one instance from a candidate list.
///
/// `None` for an empty list; a sole candidate is returned as-is.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    fn select(
        &self,
        context: &SelectContext<'_>,
        candidates: &[ServiceMetaInfo],
    ) -> Option<ServiceMetaInfo>;
}

/// Resolve a configured load balancer key.
pub fn balancer_for_key(key: &str) -> Result<Arc<dyn LoadBalancer>> {
    match key {
        LOAD_BALANCER_RANDOM => Ok(Arc::new(RandomLoadBalancer)),
        LOAD_BALANCER_ROUND_ROBIN => Ok(Arc::new(RoundRobinLoadBalancer::new())),
        other => Err(RpcError::Config(format!(
            "unknown load balancer key '{other}'"
        ))),
    }
}

/// Uniformly random choice. The sole candidate shortcut avoids an RNG
/// draw on the common single-instance case.
#[derive(Debug)]
pub struct RandomLoadBalancer;

impl LoadBalancer for RandomLoadBalancer {
    fn select(
        &self,
        _context: &SelectContext<'_>,
        candidates: &[ServiceMetaInfo],
    ) -> Option<ServiceMetaInfo> {
        match candidates {
            [] => None,
            [only] => Some(only.clone()),
            _ => {
                let index = rand::thread_rng().gen_range(0..candidates.len());
                Some(candidates[index].clone())
            }
        }
    }
}

/// Rotating choice through an atomic cursor, safe to share across calls.
#[derive(Debug)]
pub struct RoundRobinLoadBalancer {
    cursor: AtomicUsize,
}

impl RoundRobinLoadBalancer {
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobinLoadBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for RoundRobinLoadBalancer {
    fn select(
        &self,
        _context: &SelectContext<'_>,
        candidates: &[ServiceMetaInfo],
    ) -> Option<ServiceMetaInfo> {
        match candidates {
            [] => None,
            [only] => Some(only.clone()),
            _ => {
                let index = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
                Some(candidates[index].clone())
            }
        }
    }
}
