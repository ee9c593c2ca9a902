//! Binary wire protocol.
//!
//! Every frame is a fixed 17-byte big-endian header followed by exactly
//! `body-length` bytes of serializer-encoded body:
//!
//! ```text
//! offset  0      1        2           3     4       5           13
//!         magic  version  serializer  type  status  request-id  body-length
//!         1B     1B       1B          1B    1B      8B          4B
//! ```
//!
//! The magic byte must match [`PROTOCOL_MAGIC`] on both ends or the frame
//! is rejected. The serializer id selects which registered serializer
//! decodes the body, so request and response could in principle use
//! different formats; in practice both sides use the configured default.
//! The request id correlates a response to the call that issued it, and
//! the body length is what lets a stream reader reassemble frames that
//! arrive split or coalesced.

pub mod codec;

#[cfg(test)]
mod tests;

use crate::model::{RpcRequest, RpcResponse};
use crate::serialize::Serializer;

/// First byte of every frame. A mismatch means the peer is not speaking
/// this protocol.
pub const PROTOCOL_MAGIC: u8 = 0x1b;

/// Wire protocol revision.
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed header size in bytes.
pub const HEADER_LENGTH: usize = 17;

/// Upper bound on a declared body length, checked before allocating.
pub const MAX_BODY_LENGTH: usize = 64 * 1024 * 1024;

/// Frame type carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    Response,
    Heartbeat,
    Other,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(MessageType::Request),
            1 => Some(MessageType::Response),
            2 => Some(MessageType::Heartbeat),
            3 => Some(MessageType::Other),
            _ => None,
        }
    }

    pub fn byte(self) -> u8 {
        match self {
            MessageType::Request => 0,
            MessageType::Response => 1,
            MessageType::Heartbeat => 2,
            MessageType::Other => 3,
        }
    }
}

/// Frame status. The codes are the familiar 200/400/500 triple; the wire
/// carries only their low byte (200, 144, 244) since the field is one
/// byte wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Ok,
    BadRequest,
    BadResponse,
}

impl MessageStatus {
    pub fn code(self) -> u16 {
        match self {
            MessageStatus::Ok => 200,
            MessageStatus::BadRequest => 400,
            MessageStatus::BadResponse => 500,
        }
    }

    pub fn wire_byte(self) -> u8 {
        (self.code() & 0xff) as u8
    }

    pub fn from_wire_byte(byte: u8) -> Option<Self> {
        match byte {
            b if b == MessageStatus::Ok.wire_byte() => Some(MessageStatus::Ok),
            b if b == MessageStatus::BadRequest.wire_byte() => Some(MessageStatus::BadRequest),
            b if b == MessageStatus::BadResponse.wire_byte() => Some(MessageStatus::BadResponse),
            _ => None,
        }
    }
}

/// Decoded frame header. The body length is a framing detail owned by the
/// codec and is not kept here, so a message survives an encode/decode
/// round trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u8,
    pub version: u8,
    /// Serializer id, see [`Serializer::from_id`].
    pub serializer: u8,
    /// Raw type byte, see [`MessageType::from_byte`].
    pub message_type: u8,
    /// Raw status byte, see [`MessageStatus::from_wire_byte`]. Unknown
    /// status values pass through undisturbed.
    pub status: u8,
    pub request_id: u64,
}

/// Frame body, shaped by the header's type byte.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Request(RpcRequest),
    Response(RpcResponse),
    /// Liveness probe; carries no body bytes.
    Heartbeat,
    /// Recognized but untyped frame; the body is passed through opaque.
    Other(Vec<u8>),
}

/// One complete protocol frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolMessage {
    pub header: Header,
    pub body: MessageBody,
}

impl ProtocolMessage {
    pub fn request(serializer: Serializer, request_id: u64, request: RpcRequest) -> Self {
        Self {
            header: Header {
                magic: PROTOCOL_MAGIC,
                version: PROTOCOL_VERSION,
                serializer: serializer.id(),
                message_type: MessageType::Request.byte(),
                status: MessageStatus::Ok.wire_byte(),
                request_id,
            },
            body: MessageBody::Request(request),
        }
    }

    pub fn response(
        serializer: Serializer,
        request_id: u64,
        status: MessageStatus,
        response: RpcResponse,
    ) -> Self {
        Self {
            header: Header {
                magic: PROTOCOL_MAGIC,
                version: PROTOCOL_VERSION,
                serializer: serializer.id(),
                message_type: MessageType::Response.byte(),
                status: status.wire_byte(),
                request_id,
            },
            body: MessageBody::Response(response),
        }
    }

    pub fn heartbeat(request_id: u64) -> Self {
        Self {
            header: Header {
                magic: PROTOCOL_MAGIC,
                version: PROTOCOL_VERSION,
                serializer: Serializer::Json.id(),
                message_type: MessageType::Heartbeat.byte(),
                status: MessageStatus::Ok.wire_byte(),
                request_id,
            },
            body: MessageBody::Heartbeat,
        }
    }

    /// The typed view of the header's type byte. Always succeeds on a
    /// message produced by [`codec::decode`] or the constructors above.
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_byte(self.header.message_type)
    }
}
