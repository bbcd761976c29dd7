//! # beacon-rpc
//!
//! A lightweight RPC framework built around registry-based service discovery:
//! providers announce every `(service, method)` they host into a hierarchical
//! coordination store as `/<service>/<method>` -> `"ip:port"`; clients resolve
//! the endpoint at call time, borrow a pooled TCP connection, and exchange one
//! length-framed request and one length-framed response.
//!
//! ## Components
//!
//! - [coord]: the coordination-store seam — [ZkStore] for a real ZooKeeper
//!   ensemble, [MemStore] for tests and single-process use.
//! - [server]: the provider runtime — an epoll acceptor feeding a fixed
//!   worker pool, with announcement and session-loss re-announcement.
//! - [client]: the channel — per-call endpoint resolution, connection pool,
//!   per-call receive deadline via [RpcController].
//! - [codec] / [service]: the pluggable serializer surface; [MsgpCodec]
//!   (MessagePack) is the default, and service descriptors are built by hand
//!   or by whatever schema tooling the embedding crate uses.
//!
//! A failed call never panics and never throws: the controller carries
//! `failed()` and `error_text()` back to the caller, who decides what to do.
//!
//! ## Example
//!
//! ```no_run
//! use beacon_rpc::{
//!     BoxMessage, Completion, MemStore, MethodDescriptor, MsgpCodec, ProviderConfig,
//!     RpcChannel, RpcController, RpcProvider, Service, ServiceDescriptor,
//! };
//! use serde_derive::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct LoginRequest {
//!     name: String,
//!     pwd: String,
//! }
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct LoginResponse {
//!     success: bool,
//!     err: String,
//! }
//!
//! struct UserService;
//!
//! impl Service<MsgpCodec> for UserService {
//!     fn descriptor(&self) -> ServiceDescriptor<MsgpCodec> {
//!         ServiceDescriptor::new("User").with_method::<LoginRequest, LoginResponse>("Login")
//!     }
//!
//!     fn call_method(
//!         &self, _method: &MethodDescriptor<MsgpCodec>,
//!         _controller: Option<&mut RpcController>, request: BoxMessage<MsgpCodec>,
//!         mut response: BoxMessage<MsgpCodec>, done: Completion<MsgpCodec>,
//!     ) {
//!         let req = request.as_any().downcast_ref::<LoginRequest>().unwrap();
//!         let resp = response.as_any_mut().downcast_mut::<LoginResponse>().unwrap();
//!         resp.success = req.pwd == "pw";
//!         done.run(response);
//!     }
//! }
//!
//! // provider side
//! let store = Arc::new(MemStore::new());
//! let mut provider = RpcProvider::new(ProviderConfig::default(), store.clone());
//! provider.notify_service(Arc::new(UserService));
//! let handle = provider.start().unwrap();
//!
//! // client side
//! let channel = RpcChannel::<MsgpCodec, _>::new(store);
//! let descriptor = ServiceDescriptor::<MsgpCodec>::new("User")
//!     .with_method::<LoginRequest, LoginResponse>("Login");
//! let mut controller = RpcController::new();
//! let request = LoginRequest { name: "alice".to_string(), pwd: "pw".to_string() };
//! let mut response = LoginResponse::default();
//! channel.call_method(
//!     descriptor.method("Login").unwrap(),
//!     &mut controller,
//!     &request,
//!     &mut response,
//!     None,
//! );
//! assert!(!controller.failed());
//! assert!(response.success);
//! handle.shutdown();
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod controller;
pub mod coord;
pub mod error;
pub mod proto;
pub mod registry;
pub mod server;
pub mod service;
pub mod threadpool;

pub use client::{CallDone, RpcChannel};
pub use codec::{Codec, MsgpCodec};
pub use config::{ProviderConfig, Settings, TimeoutSetting};
pub use controller::RpcController;
pub use coord::{CoordStore, MemStore, SessionCallback, ZkStore};
pub use error::{ConfigError, PoolClosed, RpcFault};
pub use registry::ServiceRegistry;
pub use server::{ProviderHandle, RpcProvider};
pub use service::{
    AnyMessage, BoxMessage, Completion, MethodDescriptor, Service, ServiceDescriptor,
};
pub use threadpool::WorkerPool;
