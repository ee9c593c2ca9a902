//! TCP server role.
//!
//! Accepts connections and, per connection, reassembles complete frames
//! off the byte stream no matter how they arrive split or coalesced. Each
//! decoded request is dispatched on its own task and answered on the same
//! connection, so slow methods do not block faster ones behind them.

use std::net::SocketAddr;
use std::sync::Arc;

use lariat_common::error::{Result, RpcError};
use lariat_common::model::{RpcRequest, RpcResponse};
use lariat_common::protocol::codec::{self, decode_body, read_frame};
use lariat_common::protocol::{Header, MessageBody, MessageStatus, ProtocolMessage};
use lariat_common::serialize::Serializer;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::service::LocalServiceTable;

/// Async TCP server dispatching requests through a [`LocalServiceTable`].
pub struct TcpServer {
    listener: TcpListener,
    services: Arc<LocalServiceTable>,
}

impl TcpServer {
    /// Bind to `addr` (e.g. `"0.0.0.0:8080"`, port 0 for an ephemeral one).
    pub async fn bind(addr: &str, services: Arc<LocalServiceTable>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RpcError::Transport(format!("failed to bind {addr}: {e}")))?;
        Ok(Self { listener, services })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped. Every connection runs
    /// independently; one misbehaving peer never affects the others.
    pub async fn run(&self) -> Result<()> {
        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| RpcError::Transport(format!("accept failed: {e}")))?;
            debug!(%peer, "connection established");

            let services = self.services.clone();
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, services).await {
                    warn!(%peer, "connection ended with error: {err}");
                }
            });
        }
    }
}

async fn handle_connection(stream: TcpStream, services: Arc<LocalServiceTable>) -> Result<()> {
    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(Mutex::new(writer));

    loop {
        // Header first. A bad magic byte means we cannot trust the stream
        // position anymore, so that closes the connection; a body that
        // fails to decode leaves the framing intact and only costs the one
        // message.
        let (header, body) = match read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(RpcError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("connection closed by peer");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let message = match decode_body(header, &body) {
            Ok(message) => message,
            Err(err) => {
                warn!(request_id = header.request_id, "skipping undecodable message: {err}");
                continue;
            }
        };

        match message.body {
            MessageBody::Request(request) => {
                let services = services.clone();
                let writer = writer.clone();
                tokio::spawn(async move {
                    serve_request(header, request, services, writer).await;
                });
            }
            MessageBody::Heartbeat => {
                let echo = ProtocolMessage::heartbeat(header.request_id);
                write_message(&writer, &echo).await;
            }
            MessageBody::Response(_) | MessageBody::Other(_) => {
                warn!(
                    request_id = header.request_id,
                    message_type = header.message_type,
                    "dropping unexpected inbound frame"
                );
            }
        }
    }
}

/// Invoke the addressed service and answer on the request's connection,
/// echoing its header with the type flipped to response.
async fn serve_request(
    header: Header,
    request: RpcRequest,
    services: Arc<LocalServiceTable>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
) {
    let (status, response) = dispatch(&services, &request).await;

    let serializer = match Serializer::from_id(header.serializer) {
        Ok(serializer) => serializer,
        // unreachable for frames that decoded, but never panic the server
        Err(err) => {
            error!(request_id = header.request_id, "cannot answer request: {err}");
            return;
        }
    };
    let reply = ProtocolMessage::response(serializer, header.request_id, status, response);
    write_message(&writer, &reply).await;
}

async fn dispatch(services: &LocalServiceTable, request: &RpcRequest) -> (MessageStatus, RpcResponse) {
    let invoker = match services.lookup(&request.service_name).await {
        Some(invoker) => invoker,
        None => {
            warn!(service = %request.service_name, "request for unregistered service");
            return (
                MessageStatus::BadRequest,
                RpcResponse::failure(format!(
                    "service '{}' is not registered",
                    request.service_name
                )),
            );
        }
    };

    match invoker
        .invoke(&request.method_name, request.parameters.clone())
        .await
    {
        Ok(result) => (MessageStatus::Ok, RpcResponse::success(result)),
        Err(err) => {
            warn!(
                service = %request.service_name,
                method = %request.method_name,
                "invocation failed: {err}"
            );
            (MessageStatus::BadResponse, RpcResponse::failure(err.to_string()))
        }
    }
}

async fn write_message(writer: &Mutex<OwnedWriteHalf>, message: &ProtocolMessage) {
    let bytes = match codec::encode(message) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(request_id = message.header.request_id, "failed to encode reply: {err}");
            return;
        }
    };
    let mut writer = writer.lock().await;
    if let Err(err) = writer.write_all(&bytes).await {
        warn!("failed to write reply: {err}");
    }
}
