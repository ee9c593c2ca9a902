use thiserror::Error;

/// Error taxonomy shared by every lariat crate.
///
/// The variants mirror the places a call can fail: decoding a frame,
/// reaching the registry, picking an instance, the network attempt itself,
/// or the remote method. Retry decisions are made through
/// [`is_retryable`](RpcError::is_retryable), never by matching ad hoc.
#[derive(Error, Debug)]
pub enum RpcError {
    /// Malformed or unrecognized wire message. Fatal to that message only.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connection or send failure on a single remote attempt.
    #[error("transport error: {0}")]
    Transport(String),

    /// A single remote attempt did not answer within the call timeout.
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    /// Registry unreachable or a store query failed.
    #[error("service discovery failed: {0}")]
    Discovery(String),

    /// Discovery succeeded but returned zero candidates.
    #[error("no available service instance for '{0}'")]
    NoInstance(String),

    /// The remote method itself failed. Carried inside a normal response,
    /// not a transport failure.
    #[error("remote execution failed: {0}")]
    RemoteExecution(String),

    #[error("service registration failed: {0}")]
    Registration(String),

    #[error("lease renewal failed: {0}")]
    LeaseRenewal(String),

    /// Unknown strategy, serializer or backend key in the configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// True for failures of a single transport attempt. Everything else is
    /// either permanent or already carries a server-side verdict, so
    /// re-executing the same call cannot help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcError::Transport(_) | RpcError::Timeout(_) | RpcError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
