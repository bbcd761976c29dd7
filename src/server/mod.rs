pub mod dispatch;

use crate::codec::Codec;
use crate::config::ProviderConfig;
use crate::coord::{method_path, service_path, CoordStore, SessionCallback};
use crate::error::RpcFault;
use crate::proto;
use crate::registry::ServiceRegistry;
use crate::service::Service;
use crate::threadpool::WorkerPool;
use log::*;
use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use nix::sys::socket::{self, sockopt, AddressFamily, Backlog, SockFlag, SockType, SockaddrIn};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const LISTEN_BACKLOG: i32 = 20;
const MAX_EPOLL_EVENTS: usize = 64;

/// The provider runtime: announces every registered service into the
/// coordination store and serves calls with an epoll acceptor feeding a
/// worker pool.
///
/// Register services with [notify_service](Self::notify_service) first; the
/// registry is frozen once the acceptor starts. [run](Self::run) serves on
/// the calling thread, [start](Self::start) serves on a background thread and
/// returns a [ProviderHandle].
pub struct RpcProvider<C: Codec, S: CoordStore> {
    config: ProviderConfig,
    store: Arc<S>,
    registry: ServiceRegistry<C>,
}

impl<C: Codec, S: CoordStore> RpcProvider<C, S> {
    pub fn new(config: ProviderConfig, store: Arc<S>) -> Self {
        Self { config, store, registry: ServiceRegistry::new() }
    }

    /// Register a service before running; later calls with the same service
    /// name overwrite earlier ones.
    pub fn notify_service(&mut self, handle: Arc<dyn Service<C>>) {
        self.registry.notify_service(handle);
    }

    /// Bind, announce, and serve on the calling thread.
    ///
    /// Returns only on shutdown or a fatal acceptor error; bind/listen
    /// failures surface here and the embedding process decides what to do.
    pub fn run(self) -> io::Result<()> {
        let (accept_loop, wake) = self.prepare()?;
        // the wake pipe's write end must outlive the loop, a closed pipe
        // reads as a shutdown signal
        let _keep = wake;
        accept_loop.run();
        Ok(())
    }

    /// Like [run](Self::run), on a background acceptor thread. The returned
    /// handle reports the actual bound address and stops the provider when
    /// shut down or dropped.
    pub fn start(self) -> io::Result<ProviderHandle> {
        let (accept_loop, wake) = self.prepare()?;
        let addr = accept_loop.local_addr;
        let join = thread::Builder::new()
            .name("rpc-acceptor".to_string())
            .spawn(move || accept_loop.run())?;
        Ok(ProviderHandle { addr, wake: Some(wake), join: Some(join) })
    }

    fn prepare(self) -> io::Result<(AcceptLoop<C>, File)> {
        let ip: Ipv4Addr = self.config.ip.parse().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("bad ip {:?}", self.config.ip))
        })?;
        let listener = bind_listener(SocketAddrV4::new(ip, self.config.port))?;
        let local_addr = listener.local_addr()?;
        // announce the actual port, which may differ when configured as 0
        let endpoint = format!("{}:{}", self.config.ip, local_addr.port());
        info!("rpc provider start service at ip:{} port:{}", self.config.ip, local_addr.port());

        let announcer = Arc::new(Announcer {
            store: self.store.clone(),
            endpoint,
            catalog: self.registry.catalog(),
        });
        let expired_cb: SessionCallback = {
            let announcer = announcer.clone();
            Arc::new(move || announcer.recover())
        };
        announcer
            .store
            .start(Some(expired_cb))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        announcer.announce();

        let epoll = Arc::new(Epoll::new(EpollCreateFlags::empty())?);
        epoll.add(&listener, EpollEvent::new(EpollFlags::EPOLLIN, listener.as_raw_fd() as u64))?;
        let (wake_rx, wake_tx) = nix::unistd::pipe()?;
        epoll.add(&wake_rx, EpollEvent::new(EpollFlags::EPOLLIN, wake_rx.as_raw_fd() as u64))?;

        let shared = Arc::new(ServerShared {
            codec: Arc::new(C::default()),
            registry: self.registry,
            epoll: epoll.clone(),
            conns: Mutex::new(HashMap::new()),
        });
        let accept_loop = AcceptLoop {
            listener,
            local_addr,
            epoll,
            wake_rx,
            read_timeout: self.config.timeout.read_timeout,
            pool: WorkerPool::new(self.config.workers),
            shared,
        };
        Ok((accept_loop, File::from(wake_tx)))
    }
}

/// Handle of a running provider; stops it on [shutdown](Self::shutdown) or
/// drop.
pub struct ProviderHandle {
    addr: SocketAddr,
    wake: Option<File>,
    join: Option<JoinHandle<()>>,
}

impl ProviderHandle {
    /// The actually bound address (resolves a configured port of 0).
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting, drain in-flight handlers, join the acceptor.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(mut wake) = self.wake.take() {
            let _ = wake.write_all(&[1u8]);
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for ProviderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Create, set address-reuse, bind, listen.
fn bind_listener(addr: SocketAddrV4) -> io::Result<TcpListener> {
    let fd = socket::socket(AddressFamily::Inet, SockType::Stream, SockFlag::empty(), None)?;
    socket::setsockopt(&fd, sockopt::ReuseAddr, &true)?;
    socket::bind(fd.as_raw_fd(), &SockaddrIn::from(addr))?;
    socket::listen(&fd, Backlog::new(LISTEN_BACKLOG)?)?;
    let listener = TcpListener::from(fd);
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Announces the frozen catalog and re-announces after session loss.
struct Announcer<S: CoordStore> {
    store: Arc<S>,
    endpoint: String,
    catalog: Vec<(&'static str, Vec<&'static str>)>,
}

impl<S: CoordStore> Announcer<S> {
    /// Persistent `/<service>` plus ephemeral `/<service>/<method>` =
    /// `"ip:port"` for everything registered.
    fn announce(&self) {
        for (service, methods) in &self.catalog {
            if let Err(e) = self.store.create(&service_path(service), b"", false) {
                error!("announce {:?} error: {}", service, e);
                continue;
            }
            for method in methods {
                let path = method_path(service, method);
                match self.store.create(&path, self.endpoint.as_bytes(), true) {
                    Ok(()) => info!("announced {} at {}", path, self.endpoint),
                    Err(e) => error!("announce {:?} error: {}", path, e),
                }
            }
        }
    }

    /// Session-expiry handler: reconnect, then re-create whatever ephemeral
    /// nodes died with the old session.
    fn recover(&self) {
        error!("store session expired, re-connecting and re-announcing services");
        if let Err(e) = self.store.start(None) {
            error!("store re-connect error: {}", e);
            return;
        }
        self.announce();
    }
}

/// One accepted connection. Reads are serialized by EPOLLONESHOT re-arming;
/// writes take the write lock so pipelined responses never interleave.
struct Conn {
    stream: TcpStream,
    wlock: Mutex<()>,
}

impl Conn {
    fn write_frame(&self, payload: &[u8]) -> Result<(), RpcFault> {
        let _guard = self.wlock.lock().unwrap();
        proto::write_response(&mut (&self.stream), payload)
    }
}

/// State shared between the acceptor and the worker handlers.
struct ServerShared<C: Codec> {
    codec: Arc<C>,
    registry: ServiceRegistry<C>,
    epoll: Arc<Epoll>,
    conns: Mutex<HashMap<RawFd, Arc<Conn>>>,
}

impl<C: Codec> ServerShared<C> {
    /// Allow the next readiness event for this socket.
    fn rearm(&self, fd: RawFd, conn: &Conn) {
        let mut event = EpollEvent::new(EpollFlags::EPOLLIN | EpollFlags::EPOLLONESHOT, fd as u64);
        if let Err(e) = self.epoll.modify(&conn.stream, &mut event) {
            warn!("re-arm fd {} error: {}", fd, e);
            self.drop_conn(fd, conn);
        }
    }

    fn drop_conn(&self, fd: RawFd, conn: &Conn) {
        let _ = self.epoll.delete(&conn.stream);
        self.conns.lock().unwrap().remove(&fd);
        let _ = conn.stream.shutdown(Shutdown::Both);
    }
}

struct AcceptLoop<C: Codec> {
    listener: TcpListener,
    local_addr: SocketAddr,
    epoll: Arc<Epoll>,
    wake_rx: OwnedFd,
    read_timeout: Duration,
    pool: WorkerPool,
    shared: Arc<ServerShared<C>>,
}

impl<C: Codec> AcceptLoop<C> {
    fn run(mut self) {
        let listen_fd = self.listener.as_raw_fd();
        let wake_fd = self.wake_rx.as_raw_fd();
        let mut events = [EpollEvent::empty(); MAX_EPOLL_EVENTS];
        'outer: loop {
            let n = match self.epoll.wait(&mut events, EpollTimeout::NONE) {
                Ok(n) => n,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    error!("epoll wait error: {}", e);
                    break;
                }
            };
            for event in &events[..n] {
                let fd = event.data() as RawFd;
                if fd == wake_fd {
                    debug!("provider shutdown requested");
                    break 'outer;
                }
                if fd == listen_fd {
                    self.accept_ready();
                } else {
                    self.client_ready(fd);
                }
            }
        }
        // stop accepting first, then drain in-flight handlers
        drop(self.listener);
        self.pool.shutdown();
        let mut conns = self.shared.conns.lock().unwrap();
        for (_, conn) in conns.drain() {
            let _ = conn.stream.shutdown(Shutdown::Both);
        }
        info!("rpc provider at {} stopped", self.local_addr);
    }

    fn accept_ready(&self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!("new connection accepted from {}", peer);
                    if let Err(e) = self.register_conn(stream) {
                        warn!("register connection error: {}", e);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("accept error: {}", e);
                    return;
                }
            }
        }
    }

    fn register_conn(&self, stream: TcpStream) -> io::Result<()> {
        // workers read blocking, bounded by the read timeout
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(self.read_timeout))?;
        let fd = stream.as_raw_fd();
        let conn = Arc::new(Conn { stream, wlock: Mutex::new(()) });
        self.shared.conns.lock().unwrap().insert(fd, conn.clone());
        // ONESHOT: a socket's readiness is never handed to two workers
        let event = EpollEvent::new(EpollFlags::EPOLLIN | EpollFlags::EPOLLONESHOT, fd as u64);
        if let Err(e) = self.epoll.add(&conn.stream, event) {
            self.shared.conns.lock().unwrap().remove(&fd);
            return Err(e.into());
        }
        Ok(())
    }

    fn client_ready(&self, fd: RawFd) {
        let shared = self.shared.clone();
        if self.pool.submit(move || handle_connection(shared, fd)).is_err() {
            warn!("worker pool closed, dropping event for fd {}", fd);
        }
    }
}

/// Per-connection request handler, run on a worker thread.
fn handle_connection<C: Codec>(shared: Arc<ServerShared<C>>, fd: RawFd) {
    let Some(conn) = shared.conns.lock().unwrap().get(&fd).cloned() else {
        return;
    };
    let mut reader = &conn.stream;
    let frame = match proto::read_request(shared.codec.as_ref(), &mut reader) {
        Ok(frame) => frame,
        Err(fault) => {
            if fault != RpcFault::Closed {
                debug!("closing fd {}: {}", fd, fault);
            }
            shared.drop_conn(fd, &conn);
            return;
        }
    };
    // the frame is fully consumed; let the next request on this socket
    // proceed (possibly on another worker) while this one dispatches
    shared.rearm(fd, &conn);

    let sink_conn = conn.clone();
    let sink_shared = shared.clone();
    let sink: dispatch::ResponseSink = Box::new(move |payload| {
        if let Err(e) = sink_conn.write_frame(&payload) {
            error!("send response error on fd {}: {}", fd, e);
            sink_shared.drop_conn(fd, &sink_conn);
        }
    });
    if let Err(fault) = dispatch::dispatch_frame(&shared.codec, &shared.registry, frame, sink) {
        debug!("closing fd {}: {}", fd, fault);
        shared.drop_conn(fd, &conn);
    }
}
