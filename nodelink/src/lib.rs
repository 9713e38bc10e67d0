//! # nodelink
//!
//! Transport-agnostic client layer for network device configuration and
//! state retrieval.
//!
//! One [`Client`] contract covers three transports:
//!
//! - [`nxapi`]: JSON over HTTP, on a remote endpoint or the device-local socket
//! - [`grpc`]: the IOS XR extensible manageability service
//! - [`session`]: an interactive CLI over SSH
//!
//! [`ClientRegistry::create`] tries each registered driver in order and
//! returns the first one that connects, so callers never name a transport.
//! Responses are cached per client and can be narrowed with the
//! [`filter`] engines through [`GetRequest`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nodelink::{Client, ClientRegistry, Credentials, GetRequest, SetRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), nodelink::Error> {
//!     let registry = ClientRegistry::global();
//!     nodelink::register_builtin_drivers(registry);
//!
//!     let creds = Credentials::remote("192.0.2.10", "admin", "secret");
//!     let mut client = registry.create(&creds).await?;
//!
//!     client.set(SetRequest::cli("feature bgp")).await?;
//!     let router_id = client
//!         .get(
//!             GetRequest::cli("show running-config bgp")
//!                 .context("router bgp 65000")
//!                 .value(r"/router-id (\S+)/"),
//!         )
//!         .await?;
//!     println!("{router_id:?}");
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub(crate) mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod grpc;
pub mod nxapi;
pub mod platform;
pub mod session;
pub(crate) mod transport;

pub use client::{
    Client, ClientRegistry, ClientState, Credentials, DataFormat, DriverFactory, GetRequest,
    Output, RequestKind, ResponseCache, SetRequest, YangMode,
};
pub use config::{Environment, Environments};
pub use error::{CliFailure, Error, ErrorKind, RequestFailure, Result};
pub use filter::DataKey;

/// Register the bundled drivers with default settings, in order of
/// preference: NX-API, gRPC, then the SSH session.
pub fn register_builtin_drivers(registry: &ClientRegistry) {
    registry.register(Arc::new(nxapi::NxapiDriver::default()));
    registry.register(Arc::new(grpc::GrpcDriver::default()));
    registry.register(Arc::new(session::CliDriver::default()));
}
