//! Lariat Client Side
//!
//! Everything a consumer needs to place a remote call: the asynchronous
//! TCP transport with request/response correlation, the per-call
//! resilience pipeline and the orchestrator that composes them.
//!
//! # Call path
//!
//! ```text
//! RpcCaller::call
//!   -> Registry::discover            (cache-first instance lookup)
//!   -> LoadBalancer::select          (pick one candidate)
//!   -> RetryStrategy over TcpClient  (send frame, await correlated reply)
//!   -> TolerantStrategy              (only if retries are exhausted)
//! ```
//!
//! # Components
//!
//! - [`TcpClient`](transport::TcpClient) - pooled connections, pending-call
//!   table, timeouts
//! - [`LoadBalancer`](balancer::LoadBalancer) - `random` and `roundrobin`
//! - [`RetryStrategy`](retry::RetryStrategy) - `no` and `fixedinterval`
//! - [`TolerantStrategy`](tolerant::TolerantStrategy) - `failfast`,
//!   `failsafe`, `failover`, `failback`
//! - [`RpcCaller`](caller::RpcCaller) - the per-invocation pipeline

pub mod balancer;
pub mod caller;
pub mod retry;
pub mod tolerant;
pub mod transport;

pub use balancer::{balancer_for_key, LoadBalancer, SelectContext};
pub use caller::RpcCaller;
pub use retry::{retry_strategy_for_key, Attempt, RetryStrategy};
pub use tolerant::{tolerant_strategy_for_key, TolerantContext, TolerantStrategy};
pub use transport::TcpClient;
