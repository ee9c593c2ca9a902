//! The per-invocation call pipeline.

use std::sync::Arc;

use lariat_common::config::RpcConfig;
use lariat_common::error::{Result, RpcError};
use lariat_common::model::RpcRequest;
use lariat_common::serialize::Serializer;
use lariat_registry::Registry;
use serde_json::Value;
use tracing::{debug, warn};

use crate::balancer::{balancer_for_key, LoadBalancer, SelectContext};
use crate::retry::{retry_strategy_for_key, Attempt, RetryStrategy};
use crate::tolerant::{tolerant_strategy_for_key, TolerantContext, TolerantStrategy};
use crate::transport::TcpClient;

/// Executes remote calls end to end: discovery, instance selection, the
/// retry-wrapped transport attempt, and fault tolerance once retries are
/// exhausted.
///
/// All strategies are resolved from their configuration keys at
/// construction, so a bad key fails the process at startup rather than
/// the first call. The caller of [`call`](RpcCaller::call) always receives
/// either one result value or one terminal error.
pub struct RpcCaller {
    config: RpcConfig,
    registry: Arc<dyn Registry>,
    transport: TcpClient,
    balancer: Arc<dyn LoadBalancer>,
    retry: Arc<dyn RetryStrategy>,
    tolerant: Arc<dyn TolerantStrategy>,
}

impl RpcCaller {
    pub fn new(config: RpcConfig, registry: Arc<dyn Registry>) -> Result<Self> {
        let serializer = Serializer::for_key(&config.serializer)?;
        let balancer = balancer_for_key(&config.load_balancer)?;
        let retry = retry_strategy_for_key(&config.retry_strategy)?;
        let tolerant = tolerant_strategy_for_key(&config.tolerant_strategy)?;
        Ok(Self {
            config,
            registry,
            transport: TcpClient::new(serializer),
            balancer,
            retry,
            tolerant,
        })
    }

    /// Invoke a remote method and return its result value.
    ///
    /// Discovery failures propagate untouched (there is nothing to retry
    /// against), as does an empty candidate list. A response whose
    /// `exception` is set surfaces as [`RpcError::RemoteExecution`]; the
    /// failing call is not re-sent, since re-invoking a deterministic
    /// failure is futile. Transport failures go through the configured
    /// retry strategy, and whatever error survives it is handed to the
    /// fault tolerance strategy together with the candidate list so that
    /// failover can re-target.
    pub async fn call(&self, request: RpcRequest) -> Result<Value> {
        let service_key = request.service_key();

        let candidates = self.registry.discover(&service_key).await?;
        if candidates.is_empty() {
            return Err(RpcError::NoInstance(service_key));
        }

        let select_context = SelectContext {
            method_name: &request.method_name,
            request: &request,
        };
        let target = self
            .balancer
            .select(&select_context, &candidates)
            .ok_or_else(|| RpcError::NoInstance(service_key.clone()))?;
        debug!(
            service = %service_key,
            method = %request.method_name,
            instance = %target.service_address(),
            "dispatching call"
        );

        let timeout = self.config.call_timeout();
        let transport = &self.transport;
        let attempt_request = &request;
        let attempt_target = &target;
        let operation: Attempt<'_> = Box::new(move || {
            Box::pin(async move { transport.call(attempt_request, attempt_target, timeout).await })
        });

        let response = match self.retry.retry(operation).await {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    service = %service_key,
                    instance = %target.service_address(),
                    "call failed after retries: {error}"
                );
                let context = TolerantContext {
                    request: &request,
                    candidates: &candidates,
                    failed: Some(&target),
                    transport: &self.transport,
                    balancer: self.balancer.as_ref(),
                    timeout,
                };
                self.tolerant.tolerate(&context, error).await?
            }
        };

        if let Some(exception) = response.exception {
            return Err(RpcError::RemoteExecution(exception));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// The transport, for liveness probes against known instances.
    pub fn transport(&self) -> &TcpClient {
        &self.transport
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }
}
