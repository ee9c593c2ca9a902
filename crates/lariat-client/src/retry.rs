//! Retry policies for a single remote call.
//!
//! A strategy re-executes one transport attempt under its policy and is
//! transparent to the caller: success returns the response, exhaustion
//! re-raises the last failure for the fault tolerance layer. Only
//! transport-class failures are ever retried; a remote that answered,
//! however unhappily, is not asked the same question again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use lariat_common::error::{Result, RpcError};
use lariat_common::model::RpcResponse;
use tracing::warn;

/// Configuration keys of the shipped policies.
pub const RETRY_NO: &str = "no";
pub const RETRY_FIXED_INTERVAL: &str = "fixedinterval";

/// One re-invocable remote attempt. Every invocation issues a brand-new
/// request with its own request id.
pub type Attempt<'a> = Box<dyn Fn() -> BoxFuture<'a, Result<RpcResponse>> + Send + Sync + 'a>;

#[async_trait]
pub trait RetryStrategy: Send + Sync + std::fmt::Debug {
    async fn retry(&self, operation: Attempt<'_>) -> Result<RpcResponse>;
}

/// Resolve a configured retry strategy key.
pub fn retry_strategy_for_key(key: &str) -> Result<Arc<dyn RetryStrategy>> {
    match key {
        RETRY_NO => Ok(Arc::new(NoRetryStrategy)),
        RETRY_FIXED_INTERVAL => Ok(Arc::new(FixedIntervalRetryStrategy::default())),
        other => Err(RpcError::Config(format!(
            "unknown retry strategy key '{other}'"
        ))),
    }
}

/// Execute once, propagate any failure immediately.
#[derive(Debug)]
pub struct NoRetryStrategy;

#[async_trait]
impl RetryStrategy for NoRetryStrategy {
    async fn retry(&self, operation: Attempt<'_>) -> Result<RpcResponse> {
        operation().await
    }
}

/// Up to `max_attempts` executions with a fixed delay in between.
#[derive(Debug)]
pub struct FixedIntervalRetryStrategy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl FixedIntervalRetryStrategy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

impl Default for FixedIntervalRetryStrategy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

#[async_trait]
impl RetryStrategy for FixedIntervalRetryStrategy {
    async fn retry(&self, operation: Attempt<'_>) -> Result<RpcResponse> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "remote attempt failed, retrying in {:?}: {err}",
                        self.interval
                    );
                    tokio::time::sleep(self.interval).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
