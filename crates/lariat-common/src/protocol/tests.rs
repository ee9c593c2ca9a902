use serde_json::json;
use tokio::io::AsyncWriteExt;

use crate::error::RpcError;
use crate::model::{RpcRequest, RpcResponse};
use crate::serialize::Serializer;

use super::codec::{decode, encode, read_message};
use super::{MessageBody, MessageStatus, MessageType, ProtocolMessage, HEADER_LENGTH};

fn sample_request() -> RpcRequest {
    RpcRequest::new("com.x.Foo", "bar").with_parameters(
        vec!["string".into(), "number".into()],
        vec![json!("hello"), json!(42)],
    )
}

#[test]
fn request_round_trip() {
    // An id above u8 range and a body longer than 255 bytes would both be
    // mangled by narrow reads; the round trip pins the full widths.
    let padding = "x".repeat(300);
    let request = sample_request().with_parameters(
        vec!["string".into()],
        vec![json!(padding)],
    );
    let message = ProtocolMessage::request(Serializer::Json, 0x0102_0304_0506_0708, request);

    let bytes = encode(&message).unwrap();
    assert!(bytes.len() > HEADER_LENGTH + 255);

    let decoded = decode(&bytes).unwrap();
    assert_eq!(message, decoded);
    assert_eq!(decoded.header.request_id, 0x0102_0304_0506_0708);
}

#[test]
fn response_round_trip() {
    let response = RpcResponse::success(json!({"greeting": "hi"}));
    let message = ProtocolMessage::response(Serializer::Json, 7, MessageStatus::Ok, response);

    let decoded = decode(&encode(&message).unwrap()).unwrap();
    assert_eq!(message, decoded);
}

#[test]
fn heartbeat_round_trip_has_empty_body() {
    let message = ProtocolMessage::heartbeat(99);
    let bytes = encode(&message).unwrap();
    assert_eq!(bytes.len(), HEADER_LENGTH);

    let decoded = decode(&bytes).unwrap();
    assert_eq!(decoded.body, MessageBody::Heartbeat);
    assert_eq!(decoded.header.request_id, 99);
}

#[test]
fn bad_magic_is_rejected() {
    let message = ProtocolMessage::request(Serializer::Json, 1, sample_request());
    let mut bytes = encode(&message).unwrap();
    bytes[0] ^= 0xff;

    let err = decode(&bytes).unwrap_err();
    assert!(matches!(err, RpcError::Protocol(_)), "got {err}");
}

#[test]
fn unknown_serializer_id_is_rejected() {
    let message = ProtocolMessage::request(Serializer::Json, 1, sample_request());
    let mut bytes = encode(&message).unwrap();
    bytes[2] = 200;

    let err = decode(&bytes).unwrap_err();
    assert!(matches!(err, RpcError::Protocol(_)), "got {err}");
}

#[test]
fn unknown_message_type_is_rejected() {
    let message = ProtocolMessage::request(Serializer::Json, 1, sample_request());
    let mut bytes = encode(&message).unwrap();
    bytes[3] = 17;

    let err = decode(&bytes).unwrap_err();
    assert!(matches!(err, RpcError::Protocol(_)), "got {err}");
}

#[test]
fn truncated_buffer_is_rejected() {
    let message = ProtocolMessage::request(Serializer::Json, 1, sample_request());
    let bytes = encode(&message).unwrap();

    assert!(decode(&bytes[..HEADER_LENGTH - 3]).is_err());
    assert!(decode(&bytes[..bytes.len() - 1]).is_err());
}

#[test]
fn status_codes_map_through_their_wire_byte() {
    for status in [
        MessageStatus::Ok,
        MessageStatus::BadRequest,
        MessageStatus::BadResponse,
    ] {
        assert_eq!(MessageStatus::from_wire_byte(status.wire_byte()), Some(status));
    }
    assert_eq!(MessageStatus::Ok.wire_byte(), 200);
    assert_eq!(MessageStatus::from_wire_byte(7), None);
}

#[test]
fn type_bytes_map_both_ways() {
    for message_type in [
        MessageType::Request,
        MessageType::Response,
        MessageType::Heartbeat,
        MessageType::Other,
    ] {
        assert_eq!(MessageType::from_byte(message_type.byte()), Some(message_type));
    }
    assert_eq!(MessageType::from_byte(4), None);
}

#[tokio::test]
async fn read_message_reassembles_byte_sized_chunks() {
    let message = ProtocolMessage::request(Serializer::Json, 314, sample_request());
    let bytes = encode(&message).unwrap();

    let (mut tx, mut rx) = tokio::io::duplex(8);
    let writer = tokio::spawn(async move {
        for byte in bytes {
            tx.write_all(&[byte]).await.unwrap();
            tx.flush().await.unwrap();
        }
    });

    let decoded = read_message(&mut rx).await.unwrap();
    writer.await.unwrap();
    assert_eq!(message, decoded);
}

#[tokio::test]
async fn read_message_splits_coalesced_frames() {
    let first = ProtocolMessage::request(Serializer::Json, 1, sample_request());
    let second = ProtocolMessage::heartbeat(2);
    let mut bytes = encode(&first).unwrap();
    bytes.extend(encode(&second).unwrap());

    let (mut tx, mut rx) = tokio::io::duplex(4096);
    tx.write_all(&bytes).await.unwrap();

    assert_eq!(read_message(&mut rx).await.unwrap(), first);
    assert_eq!(read_message(&mut rx).await.unwrap(), second);
}
