//! Asynchronous TCP client transport.
//!
//! One connection per destination, shared by every call to it. Each
//! connection runs an independent read task; in-flight calls are
//! distinguished solely by request id through a pending-call table, so
//! responses may return in any order. A call holds a one-shot slot in the
//! table until either its response arrives or its timeout fires, whichever
//! happens first; the loser of that race finds the slot already gone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use lariat_common::error::{Result, RpcError};
use lariat_common::model::{RpcRequest, RpcResponse, ServiceMetaInfo};
use lariat_common::protocol::codec::{self, read_message};
use lariat_common::protocol::{MessageBody, ProtocolMessage};
use lariat_common::serialize::Serializer;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Globally unique id for one in-flight call: timestamp in the upper half,
/// a monotonically increasing counter in the lower half.
fn next_request_id() -> u64 {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let counter = REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst);
    (timestamp & 0xFFFF_FFFF_0000_0000) | (counter & 0xFFFF_FFFF)
}

type PendingTable = Mutex<HashMap<u64, oneshot::Sender<ProtocolMessage>>>;

/// One live connection to a destination.
///
/// The pending table is shared between the issuing path (insert on send,
/// remove on timeout) and the read task (remove on response). Removal is
/// what settles the race: whoever takes the entry out first owns the
/// outcome.
struct Connection {
    addr: String,
    writer: Mutex<OwnedWriteHalf>,
    pending: Arc<PendingTable>,
    closed: Arc<AtomicBool>,
}

impl Connection {
    async fn open(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| RpcError::Transport(format!("failed to connect to {addr}: {e}")))?;
        let (mut reader, writer) = stream.into_split();

        let pending: Arc<PendingTable> = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let read_pending = pending.clone();
        let read_closed = closed.clone();
        let read_addr = addr.to_string();
        tokio::spawn(async move {
            loop {
                match read_message(&mut reader).await {
                    Ok(message) => {
                        let request_id = message.header.request_id;
                        let slot = read_pending.lock().await.remove(&request_id);
                        match slot {
                            Some(sender) => {
                                // the receiver may have timed out in between
                                let _ = sender.send(message);
                            }
                            None => warn!(
                                request_id,
                                addr = %read_addr,
                                "dropping reply with no pending call (timed out or duplicate)"
                            ),
                        }
                    }
                    Err(RpcError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        debug!(addr = %read_addr, "connection closed by peer");
                        break;
                    }
                    Err(err) => {
                        warn!(addr = %read_addr, "read failed on connection: {err}");
                        break;
                    }
                }
            }
            read_closed.store(true, Ordering::Release);
            // dropping the senders fails every call still waiting here
            read_pending.lock().await.clear();
        });

        Ok(Self {
            addr: addr.to_string(),
            writer: Mutex::new(writer),
            pending,
            closed,
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn register_pending(&self, request_id: u64) -> oneshot::Receiver<ProtocolMessage> {
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().await.insert(request_id, sender);
        receiver
    }

    async fn discard_pending(&self, request_id: u64) {
        self.pending.lock().await.remove(&request_id);
    }

    async fn send(&self, message: &ProtocolMessage) -> Result<()> {
        let bytes = codec::encode(message)?;
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&bytes)
            .await
            .map_err(|e| RpcError::Transport(format!("send to {} failed: {e}", self.addr)))?;
        writer
            .flush()
            .await
            .map_err(|e| RpcError::Transport(format!("flush to {} failed: {e}", self.addr)))?;
        Ok(())
    }
}

/// TCP client transport with one pooled connection per destination.
pub struct TcpClient {
    serializer: Serializer,
    connections: Mutex<HashMap<String, Arc<Connection>>>,
}

impl TcpClient {
    pub fn new(serializer: Serializer) -> Self {
        Self {
            serializer,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Perform one remote attempt: send the request to `target` and await
    /// the correlated response or the timeout, whichever comes first.
    ///
    /// A timed-out call removes its own pending entry, so a reply arriving
    /// later is dropped by the read task instead of reaching a stale
    /// caller. A response that arrives is returned as-is; a server-side
    /// failure travels inside [`RpcResponse::exception`], not as a
    /// transport error.
    pub async fn call(
        &self,
        request: &RpcRequest,
        target: &ServiceMetaInfo,
        timeout: Duration,
    ) -> Result<RpcResponse> {
        let reply = self
            .exchange(
                &target.service_address(),
                |request_id| ProtocolMessage::request(self.serializer, request_id, request.clone()),
                timeout,
            )
            .await?;
        match reply.body {
            MessageBody::Response(response) => Ok(response),
            _ => Err(RpcError::Protocol(format!(
                "expected a response frame from {}, got type {}",
                target.service_address(),
                reply.header.message_type
            ))),
        }
    }

    /// Send a heartbeat frame and await its echo.
    pub async fn ping(&self, target: &ServiceMetaInfo, timeout: Duration) -> Result<()> {
        let reply = self
            .exchange(
                &target.service_address(),
                ProtocolMessage::heartbeat,
                timeout,
            )
            .await?;
        match reply.body {
            MessageBody::Heartbeat => Ok(()),
            _ => Err(RpcError::Protocol(format!(
                "expected a heartbeat echo from {}, got type {}",
                target.service_address(),
                reply.header.message_type
            ))),
        }
    }

    /// In-flight calls towards `addr`. Zero once every call has completed
    /// or timed out.
    pub async fn pending_calls(&self, addr: &str) -> usize {
        match self.connections.lock().await.get(addr) {
            Some(connection) => connection.pending.lock().await.len(),
            None => 0,
        }
    }

    async fn exchange(
        &self,
        addr: &str,
        build: impl FnOnce(u64) -> ProtocolMessage,
        timeout: Duration,
    ) -> Result<ProtocolMessage> {
        let connection = self.connection_for(addr).await?;
        let request_id = next_request_id();
        let receiver = connection.register_pending(request_id).await;

        let message = build(request_id);
        if let Err(err) = connection.send(&message).await {
            connection.discard_pending(request_id).await;
            self.evict(&connection).await;
            return Err(err);
        }

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(reply)) => Ok(reply),
            // sender dropped: the connection died underneath us
            Ok(Err(_)) => {
                self.evict(&connection).await;
                Err(RpcError::Transport(format!(
                    "connection to {addr} closed before a reply arrived"
                )))
            }
            Err(_) => {
                connection.discard_pending(request_id).await;
                Err(RpcError::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    /// One connection per destination; a dead one is replaced on the next
    /// call. The pool lock is held across the dial so concurrent calls to
    /// the same destination share one connection instead of racing to
    /// open several, which would strand their replies on unread sockets.
    async fn connection_for(&self, addr: &str) -> Result<Arc<Connection>> {
        let mut connections = self.connections.lock().await;
        if let Some(existing) = connections.get(addr) {
            if !existing.is_closed() {
                return Ok(existing.clone());
            }
            debug!(%addr, "replacing closed connection");
            connections.remove(addr);
        }

        let fresh = Arc::new(Connection::open(addr).await?);
        connections.insert(addr.to_string(), fresh.clone());
        Ok(fresh)
    }

    async fn evict(&self, connection: &Arc<Connection>) {
        let mut connections = self.connections.lock().await;
        if let Some(current) = connections.get(&connection.addr) {
            if Arc::ptr_eq(current, connection) {
                connections.remove(&connection.addr);
            }
        }
    }
}
