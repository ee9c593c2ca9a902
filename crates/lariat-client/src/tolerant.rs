//! Fault tolerance policies, applied only after retries are exhausted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lariat_common::error::{Result, RpcError};
use lariat_common::model::{RpcRequest, RpcResponse, ServiceMetaInfo};
use tracing::{info, warn};

use crate::balancer::{LoadBalancer, SelectContext};
use crate::transport::TcpClient;

/// Configuration keys of the shipped policies.
pub const TOLERANT_FAIL_FAST: &str = "failfast";
pub const TOLERANT_FAIL_SAFE: &str = "failsafe";
pub const TOLERANT_FAIL_OVER: &str = "failover";
pub const TOLERANT_FAIL_BACK: &str = "failback";

/// Everything a policy may need to decide the final outcome, including
/// what it takes to re-target the call at another instance.
pub struct TolerantContext<'a> {
    pub request: &'a RpcRequest,
    /// The full candidate list discovery returned for this call.
    pub candidates: &'a [ServiceMetaInfo],
    /// The instance the failed attempts were sent to.
    pub failed: Option<&'a ServiceMetaInfo>,
    pub transport: &'a TcpClient,
    pub balancer: &'a dyn LoadBalancer,
    pub timeout: Duration,
}

/// Decides the final result of a call once retries are exhausted.
#[async_trait]
pub trait TolerantStrategy: Send + Sync + std::fmt::Debug {
    async fn tolerate(
        &self,
        context: &TolerantContext<'_>,
        error: RpcError,
    ) -> Result<RpcResponse>;
}

/// Resolve a configured fault tolerance key.
pub fn tolerant_strategy_for_key(key: &str) -> Result<Arc<dyn TolerantStrategy>> {
    match key {
        TOLERANT_FAIL_FAST => Ok(Arc::new(FailFastTolerantStrategy)),
        TOLERANT_FAIL_SAFE => Ok(Arc::new(FailSafeTolerantStrategy)),
        TOLERANT_FAIL_OVER => Ok(Arc::new(FailOverTolerantStrategy)),
        TOLERANT_FAIL_BACK => Ok(Arc::new(FailBackTolerantStrategy)),
        other => Err(RpcError::Config(format!(
            "unknown fault tolerance key '{other}'"
        ))),
    }
}

/// Re-raise immediately. The default.
#[derive(Debug)]
pub struct FailFastTolerantStrategy;

#[async_trait]
impl TolerantStrategy for FailFastTolerantStrategy {
    async fn tolerate(
        &self,
        _context: &TolerantContext<'_>,
        error: RpcError,
    ) -> Result<RpcResponse> {
        Err(error)
    }
}

/// Swallow the error and hand back an empty response.
#[derive(Debug)]
pub struct FailSafeTolerantStrategy;

#[async_trait]
impl TolerantStrategy for FailSafeTolerantStrategy {
    async fn tolerate(
        &self,
        context: &TolerantContext<'_>,
        error: RpcError,
    ) -> Result<RpcResponse> {
        warn!(
            service = %context.request.service_key(),
            method = %context.request.method_name,
            "suppressing call failure: {error}"
        );
        Ok(RpcResponse::default())
    }
}

/// One more attempt against a different candidate, chosen by the load
/// balancer from the instances the failed one is removed from.
#[derive(Debug)]
pub struct FailOverTolerantStrategy;

#[async_trait]
impl TolerantStrategy for FailOverTolerantStrategy {
    async fn tolerate(
        &self,
        context: &TolerantContext<'_>,
        error: RpcError,
    ) -> Result<RpcResponse> {
        let remaining: Vec<ServiceMetaInfo> = context
            .candidates
            .iter()
            .filter(|candidate| context.failed.map_or(true, |failed| failed != *candidate))
            .cloned()
            .collect();

        let select_context = SelectContext {
            method_name: &context.request.method_name,
            request: context.request,
        };
        let Some(target) = context.balancer.select(&select_context, &remaining) else {
            warn!(
                service = %context.request.service_key(),
                "failover found no alternative instance: {error}"
            );
            return Err(RpcError::NoInstance(context.request.service_key()));
        };

        info!(
            service = %context.request.service_key(),
            instance = %target.service_address(),
            "failing over after: {error}"
        );
        context
            .transport
            .call(context.request, &target, context.timeout)
            .await
    }
}

/// Degrade instead of failing: answer with an empty fallback response.
#[derive(Debug)]
pub struct FailBackTolerantStrategy;

#[async_trait]
impl TolerantStrategy for FailBackTolerantStrategy {
    async fn tolerate(
        &self,
        context: &TolerantContext<'_>,
        error: RpcError,
    ) -> Result<RpcResponse> {
        warn!(
            service = %context.request.service_key(),
            method = %context.request.method_name,
            "serving degraded fallback after: {error}"
        );
        Ok(RpcResponse {
            message: "degraded".to_string(),
            ..RpcResponse::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::RandomLoadBalancer;
    use lariat_common::serialize::Serializer;

    fn fixture() -> (TcpClient, RandomLoadBalancer) {
        (TcpClient::new(Serializer::Json), RandomLoadBalancer)
    }

    fn context_of<'a>(
        request: &'a RpcRequest,
        candidates: &'a [ServiceMetaInfo],
        failed: Option<&'a ServiceMetaInfo>,
        transport: &'a TcpClient,
        balancer: &'a RandomLoadBalancer,
    ) -> TolerantContext<'a> {
        TolerantContext {
            request,
            candidates,
            failed,
            transport,
            balancer,
            timeout: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn fail_fast_reraises() {
        let request = RpcRequest::new("com.x.Foo", "bar");
        let (transport, balancer) = fixture();
        let context = context_of(&request, &[], None, &transport, &balancer);

        let err = FailFastTolerantStrategy
            .tolerate(&context, RpcError::Timeout(5000))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Timeout(5000)));
    }

    #[tokio::test]
    async fn fail_safe_returns_an_empty_response() {
        let request = RpcRequest::new("com.x.Foo", "bar");
        let (transport, balancer) = fixture();
        let context = context_of(&request, &[], None, &transport, &balancer);

        let response = FailSafeTolerantStrategy
            .tolerate(&context, RpcError::Transport("refused".into()))
            .await
            .unwrap();
        assert!(response.result.is_none());
        assert!(response.exception.is_none());
    }

    #[tokio::test]
    async fn fail_back_serves_a_degraded_response() {
        let request = RpcRequest::new("com.x.Foo", "bar");
        let (transport, balancer) = fixture();
        let context = context_of(&request, &[], None, &transport, &balancer);

        let response = FailBackTolerantStrategy
            .tolerate(&context, RpcError::Transport("refused".into()))
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.message, "degraded");
    }

    #[tokio::test]
    async fn fail_over_with_no_alternative_reports_no_instance() {
        let request = RpcRequest::new("com.x.Foo", "bar");
        let only = ServiceMetaInfo::new("com.x.Foo", "1.0", "localhost", 9000);
        let candidates = vec![only.clone()];
        let (transport, balancer) = fixture();
        let context = context_of(&request, &candidates, Some(&only), &transport, &balancer);

        let err = FailOverTolerantStrategy
            .tolerate(&context, RpcError::Timeout(100))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::NoInstance(_)));
    }

    #[tokio::test]
    async fn unknown_key_is_a_config_error() {
        let err = tolerant_strategy_for_key("circuitbreaker").unwrap_err();
        assert!(matches!(err, RpcError::Config(_)));
    }
}
