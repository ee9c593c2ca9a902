//! Lariat Common Types, Wire Codec and Configuration
//!
//! This crate provides the shared foundation of the lariat RPC framework:
//! the call data model, the error taxonomy, the framework configuration and
//! the binary wire protocol used by both sides of a connection.
//!
//! # Overview
//!
//! Lariat routes a local invocation to a remote implementation over TCP.
//! Everything that both the calling and the serving side must agree on
//! lives here:
//!
//! - **Data model**: [`model::RpcRequest`], [`model::RpcResponse`] and
//!   [`model::ServiceMetaInfo`] (the identity of one service instance)
//! - **Errors**: the [`error::RpcError`] taxonomy shared by every crate
//! - **Configuration**: [`config::RpcConfig`], constructed once at startup
//!   and passed by reference into every component
//! - **Serialization**: the [`serialize::Serializer`] selected per message
//!   by a one-byte id carried in the frame header
//! - **Wire protocol**: a fixed 17-byte big-endian header followed by a
//!   serializer-encoded body, see [`protocol`]
//!
//! # Wire format
//!
//! ```text
//! magic(1) version(1) serializer(1) type(1) status(1) request-id(8) body-length(4) | body
//! ```
//!
//! # Example
//!
//! ```
//! use lariat_common::model::{RpcRequest, RpcResponse};
//! use lariat_common::protocol::{codec, ProtocolMessage};
//! use lariat_common::serialize::Serializer;
//! use serde_json::json;
//!
//! let request = RpcRequest::new("com.demo.Greeter", "hello")
//!     .with_parameters(vec!["string".into()], vec![json!("world")]);
//! let message = ProtocolMessage::request(Serializer::Json, 42, request);
//!
//! let bytes = codec::encode(&message).unwrap();
//! let decoded = codec::decode(&bytes).unwrap();
//! assert_eq!(message, decoded);
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod protocol;
pub mod serialize;

pub use config::{RegistryConfig, RpcConfig};
pub use error::{Result, RpcError};
pub use model::{RpcRequest, RpcResponse, ServiceMetaInfo};
