//! Lariat Server Side
//!
//! The serving half of the framework: a TCP server that reassembles
//! request frames, dispatches them through a local service table and
//! writes the response back on the same connection, plus the provider
//! bootstrap that registers the served instances with the registry.
//!
//! # Dispatch model
//!
//! There is no runtime reflection. A service registers a
//! [`ServiceInvoker`](service::ServiceInvoker) - typically a
//! [`FnInvoker`](service::FnInvoker) holding one closure per method -
//! and the server resolves incoming requests against that table by
//! service name.

pub mod provider;
pub mod server;
pub mod service;

pub use provider::Provider;
pub use server::TcpServer;
pub use service::{FnInvoker, LocalServiceTable, ServiceInvoker};
