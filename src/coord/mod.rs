//! Coordination store: the hierarchical key/value service holding
//! `/<service>/<method>` -> `"ip:port"` announcements.
//!
//! [ZkStore] talks to a real ZooKeeper ensemble; [MemStore] keeps the same
//! contract in process memory for tests and single-process deployments.

pub mod memory;
pub mod zk;

pub use memory::MemStore;
pub use zk::ZkStore;

use std::sync::Arc;

/// Invoked when the store session expires. Runs on a dedicated monitor
/// thread, never on the store's event thread, and with no store lock held,
/// so it may call back into the store (reconnect, re-create nodes).
pub type SessionCallback = Arc<dyn Fn() + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum CoordError {
    #[error("store connect error: {0}")]
    Connect(String),
    #[error("store {op} on {path:?} failed: {detail}")]
    Op { op: &'static str, path: String, detail: String },
    #[error("store session is not started")]
    NotStarted,
}

/// The operation set the framework needs from a coordination store.
///
/// All three calls are synchronous: implementations over an async client
/// block the caller until the underlying chain completes.
pub trait CoordStore: Send + Sync + 'static {
    /// (Re)establish a session, blocking until the first connected state.
    ///
    /// `Some(cb)` installs `cb` as the session-expiry handler; `None` keeps
    /// the previously installed one (what the handler itself passes when
    /// reconnecting).
    fn start(&self, on_session_expired: Option<SessionCallback>) -> Result<(), CoordError>;

    /// Idempotent create: an existing node (including one that appeared
    /// concurrently between the exists probe and the create) is success.
    fn create(&self, path: &str, data: &[u8], ephemeral: bool) -> Result<(), CoordError>;

    /// Value at `path`, or `""` when the path does not exist or on any error.
    fn get_data(&self, path: &str) -> String;
}

/// Announcement path of a service: `/<service>`.
#[inline]
pub fn service_path(service_name: &str) -> String {
    format!("/{}", service_name)
}

/// Announcement path of a method: `/<service>/<method>`.
#[inline]
pub fn method_path(service_name: &str, method_name: &str) -> String {
    format!("/{}/{}", service_name, method_name)
}
