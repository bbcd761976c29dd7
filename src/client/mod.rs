use crate::codec::Codec;
use crate::config::TimeoutSetting;
use crate::controller::RpcController;
use crate::coord::{method_path, CoordStore};
use crate::error::RpcFault;
use crate::proto;
use crate::service::{AnyMessage, MethodDescriptor};
use log::*;
use std::collections::HashMap;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Success callback of a call; invoked synchronously before `call_method`
/// returns, and only when the call succeeded.
pub type CallDone = Box<dyn FnOnce() + Send>;

/// The client-side object used to invoke remote methods.
///
/// Resolves `(service, method)` to an endpoint through the coordination store
/// on every call, keeps at most one idle connection per endpoint, and reports
/// every failure through the controller; it never panics on a failed call and
/// never returns an error to the caller directly.
///
/// Concurrent calls on one channel are fine: an idle connection is taken out
/// of the pool for the duration of a call, so racing calls to the same
/// endpoint simply dial extra sockets, and the last one back keeps the single
/// pool slot. The pool is a cache, not an exclusion primitive.
pub struct RpcChannel<C: Codec, S: CoordStore> {
    codec: C,
    store: Arc<S>,
    timeout: TimeoutSetting,
    conns: Mutex<HashMap<String, TcpStream>>,
}

impl<C: Codec, S: CoordStore> RpcChannel<C, S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_timeout(store, TimeoutSetting::default())
    }

    pub fn with_timeout(store: Arc<S>, timeout: TimeoutSetting) -> Self {
        Self { codec: C::default(), store, timeout, conns: Mutex::new(HashMap::new()) }
    }

    /// Live pool size; a test hook.
    pub fn pooled_connections(&self) -> usize {
        self.conns.lock().unwrap().len()
    }

    /// Invoke `method` with `request`, filling `response`.
    ///
    /// On success `done` (if any) runs exactly once before this returns and
    /// the controller stays clean. On failure the controller carries the
    /// error text, `done` does not run, and `response` is unspecified.
    pub fn call_method(
        &self, method: &MethodDescriptor<C>, controller: &mut RpcController,
        request: &dyn AnyMessage<C>, response: &mut dyn AnyMessage<C>, done: Option<CallDone>,
    ) {
        let service_name = method.service_name();
        let method_name = method.name();

        let args = match request.encode(&self.codec) {
            Ok(buf) => buf,
            Err(()) => {
                controller.set_failed("serialize request error!");
                return;
            }
        };
        let wire = match proto::encode_request(&self.codec, service_name, method_name, &args) {
            Ok(buf) => buf,
            Err(_) => {
                controller.set_failed("serialize rpc header error!");
                return;
            }
        };

        // The registry is the source of truth, consulted on every call.
        let path = method_path(service_name, method_name);
        let host_data = self.store.get_data(&path);
        if host_data.is_empty() {
            controller.set_failed(format!("{} is not exist!", path));
            return;
        }
        if !host_data.contains(':') {
            controller.set_failed(format!("{} address is invalid!", path));
            return;
        }
        let addr: SocketAddr = match host_data.parse() {
            Ok(a) => a,
            Err(_) => {
                controller.set_failed(format!("{} address is invalid!", path));
                return;
            }
        };

        // Borrow a pooled connection or dial a fresh one. The pool lock only
        // covers the map; connect and the exchange run outside it.
        let mut stream = match self.take_conn(&host_data) {
            Some(s) => s,
            None => match TcpStream::connect_timeout(&addr, self.timeout.connect_timeout) {
                Ok(s) => {
                    debug!("connected to {}", host_data);
                    s
                }
                Err(e) => {
                    warn!("connect {} error: {:?}", host_data, e);
                    controller.set_failed("connect error!");
                    return;
                }
            },
        };

        // The controller's deadline becomes the socket receive timeout.
        let recv_timeout = match controller.timeout_ms() {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        let _ = stream.set_read_timeout(recv_timeout);

        // A connection that fails anything below is dropped here instead of
        // going back to the pool, which closes it.
        if let Err(e) = stream.write_all(&wire) {
            warn!("send to {} error: {:?}", host_data, e);
            controller.set_failed("send error!");
            return;
        }
        let payload = match proto::read_response(&mut stream) {
            Ok(p) => p,
            Err(RpcFault::Timeout) => {
                controller.set_failed("recv timeout!");
                return;
            }
            Err(e) => {
                debug!("recv from {} error: {}", host_data, e);
                controller.set_failed("recv error!");
                return;
            }
        };
        if !payload.is_empty() {
            if response.merge_from(&self.codec, &payload).is_err() {
                controller.set_failed("parse error!");
                return;
            }
        }

        self.put_conn(host_data, stream);
        if let Some(done) = done {
            done();
        }
    }

    #[inline]
    fn take_conn(&self, endpoint: &str) -> Option<TcpStream> {
        self.conns.lock().unwrap().remove(endpoint)
    }

    #[inline]
    fn put_conn(&self, endpoint: String, stream: TcpStream) {
        // last writer wins the slot; a raced duplicate is dropped (closed)
        self.conns.lock().unwrap().insert(endpoint, stream);
    }
}
