//! Frame encoding, decoding and stream reassembly.
//!
//! [`encode`]/[`decode`] work on complete byte buffers. [`read_message`]
//! pulls exactly one frame off an async stream, buffering until the full
//! header and then the full body are available, so it is unaffected by
//! how the transport happens to chunk the bytes.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, RpcError};
use crate::serialize::Serializer;

use super::{
    Header, MessageBody, MessageType, ProtocolMessage, HEADER_LENGTH, MAX_BODY_LENGTH,
    PROTOCOL_MAGIC,
};

/// Encode a message into one contiguous frame.
pub fn encode(message: &ProtocolMessage) -> Result<Vec<u8>> {
    let serializer = Serializer::from_id(message.header.serializer)?;
    let body = match &message.body {
        MessageBody::Request(request) => serializer.encode(request)?,
        MessageBody::Response(response) => serializer.encode(response)?,
        MessageBody::Heartbeat => Vec::new(),
        MessageBody::Other(bytes) => bytes.clone(),
    };

    let mut buf = Vec::with_capacity(HEADER_LENGTH + body.len());
    buf.push(message.header.magic);
    buf.push(message.header.version);
    buf.push(message.header.serializer);
    buf.push(message.header.message_type);
    buf.push(message.header.status);
    buf.extend_from_slice(&message.header.request_id.to_be_bytes());
    buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Decode one complete frame from a buffer.
pub fn decode(bytes: &[u8]) -> Result<ProtocolMessage> {
    if bytes.len() < HEADER_LENGTH {
        return Err(RpcError::Protocol(format!(
            "truncated header: {} of {HEADER_LENGTH} bytes",
            bytes.len()
        )));
    }
    let (header, body_length) = decode_header(&bytes[..HEADER_LENGTH])?;
    let frame_length = HEADER_LENGTH + body_length as usize;
    if bytes.len() < frame_length {
        return Err(RpcError::Protocol(format!(
            "truncated body: {} of {body_length} bytes",
            bytes.len() - HEADER_LENGTH
        )));
    }
    decode_body(header, &bytes[HEADER_LENGTH..frame_length])
}

/// Decode the fixed header, returning it together with the declared body
/// length. The request id and body length are multi-byte fields and are
/// read at their full width.
pub fn decode_header(bytes: &[u8]) -> Result<(Header, u32)> {
    if bytes.len() < HEADER_LENGTH {
        return Err(RpcError::Protocol(format!(
            "truncated header: {} of {HEADER_LENGTH} bytes",
            bytes.len()
        )));
    }
    let magic = bytes[0];
    if magic != PROTOCOL_MAGIC {
        return Err(RpcError::Protocol(format!(
            "bad magic byte {magic:#04x}, expected {PROTOCOL_MAGIC:#04x}"
        )));
    }
    let request_id = u64::from_be_bytes(
        bytes[5..13]
            .try_into()
            .map_err(|_| RpcError::Protocol("truncated request id".to_string()))?,
    );
    let body_length = u32::from_be_bytes(
        bytes[13..17]
            .try_into()
            .map_err(|_| RpcError::Protocol("truncated body length".to_string()))?,
    );
    let header = Header {
        magic,
        version: bytes[1],
        serializer: bytes[2],
        message_type: bytes[3],
        status: bytes[4],
        request_id,
    };
    Ok((header, body_length))
}

/// Decode a body against its header. Fails if the serializer id or type
/// byte is unrecognized; heartbeat and untyped frames carry their bytes
/// through without deserialization.
pub fn decode_body(header: Header, body: &[u8]) -> Result<ProtocolMessage> {
    let serializer = Serializer::from_id(header.serializer)?;
    let message_type = MessageType::from_byte(header.message_type).ok_or_else(|| {
        RpcError::Protocol(format!(
            "unrecognized message type {}",
            header.message_type
        ))
    })?;
    let body = match message_type {
        MessageType::Request => MessageBody::Request(serializer.decode(body)?),
        MessageType::Response => MessageBody::Response(serializer.decode(body)?),
        MessageType::Heartbeat => MessageBody::Heartbeat,
        MessageType::Other => MessageBody::Other(body.to_vec()),
    };
    Ok(ProtocolMessage { header, body })
}

/// Read one raw frame (header plus body bytes) off a stream.
///
/// Exact reads buffer across arbitrarily chunked deliveries. An EOF before
/// the first header byte surfaces as `Io(UnexpectedEof)` so callers can
/// tell a clean close from a torn frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<(Header, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; HEADER_LENGTH];
    reader.read_exact(&mut header_buf).await?;
    let (header, body_length) = decode_header(&header_buf)?;
    if body_length as usize > MAX_BODY_LENGTH {
        return Err(RpcError::Protocol(format!(
            "declared body length {body_length} exceeds limit {MAX_BODY_LENGTH}"
        )));
    }
    let mut body = vec![0u8; body_length as usize];
    reader.read_exact(&mut body).await?;
    Ok((header, body))
}

/// Read and decode exactly one message off a stream.
pub async fn read_message<R>(reader: &mut R) -> Result<ProtocolMessage>
where
    R: AsyncRead + Unpin,
{
    let (header, body) = read_frame(reader).await?;
    decode_body(header, &body)
}
