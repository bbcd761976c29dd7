use super::{CoordError, CoordStore, SessionCallback};
use crossfire::mpsc;
use log::*;
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::runtime::{Builder, Runtime};
use zookeeper_client as zk;

/// ZooKeeper-backed [CoordStore].
///
/// The underlying client is asynchronous; every operation here enqueues the
/// async chain on a private runtime and blocks on its completion, so callers
/// see the synchronous contract. Session-state transitions are observed by a
/// watcher task; expiry events cross to a dedicated monitor thread over a
/// channel, so the user callback never runs on the store's event thread and
/// no adapter lock is held while it runs.
pub struct ZkStore {
    cluster: String,
    rt: Runtime,
    client: Mutex<Option<Arc<zk::Client>>>,
    expiry_cb: Arc<Mutex<Option<SessionCallback>>>,
    session_tx: Mutex<Option<crossfire::MTx<()>>>,
}

impl ZkStore {
    /// `cluster` is a ZooKeeper connect string, typically `"host:port"`.
    pub fn new(cluster: impl Into<String>) -> Result<Self, CoordError> {
        let rt = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("zk-store")
            .enable_all()
            .build()
            .map_err(|e| CoordError::Connect(e.to_string()))?;
        Ok(Self {
            cluster: cluster.into(),
            rt,
            client: Mutex::new(None),
            expiry_cb: Arc::new(Mutex::new(None)),
            session_tx: Mutex::new(None),
        })
    }

    fn current(&self) -> Result<Arc<zk::Client>, CoordError> {
        self.client.lock().unwrap().clone().ok_or(CoordError::NotStarted)
    }

    /// The monitor thread is created once; reconnects reuse its channel.
    /// The sender is only stored once the thread actually runs, so a spawn
    /// failure cannot leave expiry events draining into nothing.
    fn monitor_tx(&self) -> Result<crossfire::MTx<()>, CoordError> {
        let mut guard = self.session_tx.lock().unwrap();
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }
        let (tx, rx) = mpsc::unbounded_blocking::<()>();
        let cb_slot = self.expiry_cb.clone();
        thread::Builder::new()
            .name("zk-session-monitor".to_string())
            .spawn(move || {
                while let Ok(()) = rx.recv() {
                    let cb = cb_slot.lock().unwrap().clone();
                    if let Some(cb) = cb {
                        cb();
                    }
                }
            })
            .map_err(|e| CoordError::Connect(format!("spawn session monitor: {}", e)))?;
        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl CoordStore for ZkStore {
    fn start(&self, on_session_expired: Option<SessionCallback>) -> Result<(), CoordError> {
        if let Some(cb) = on_session_expired {
            *self.expiry_cb.lock().unwrap() = Some(cb);
        }
        // fail before connecting if expiry delivery cannot be set up
        let tx = self.monitor_tx()?;
        // connect blocks until the session reaches its first connected state
        let client = self
            .rt
            .block_on(zk::Client::connect(&self.cluster))
            .map_err(|e| CoordError::Connect(format!("{:?}", e)))?;
        info!("connected to coordination store at {}", self.cluster);

        let mut watcher = client.state_watcher();
        self.rt.spawn(async move {
            loop {
                let state = watcher.changed().await;
                match state {
                    zk::SessionState::Expired => {
                        warn!("coordination store session expired");
                        // a failed send means the monitor is gone; nothing to do
                        let _ = tx.send(());
                        return;
                    }
                    zk::SessionState::Closed => return,
                    other => {
                        debug!("coordination store session state: {:?}", other);
                    }
                }
            }
        });

        *self.client.lock().unwrap() = Some(Arc::new(client));
        Ok(())
    }

    fn create(&self, path: &str, data: &[u8], ephemeral: bool) -> Result<(), CoordError> {
        let client = self.current()?;
        let mode = if ephemeral { zk::CreateMode::Ephemeral } else { zk::CreateMode::Persistent };
        let options = mode.with_acls(zk::Acls::anyone_all());
        self.rt.block_on(async move {
            // exists-then-create chain
            match client.check_stat(path).await {
                Ok(Some(_)) => return Ok(()),
                Ok(None) => {}
                Err(e) => {
                    return Err(CoordError::Op {
                        op: "exists",
                        path: path.to_string(),
                        detail: format!("{:?}", e),
                    });
                }
            }
            match client.create(path, data, &options).await {
                Ok(_) => {
                    info!("created store path {:?} (ephemeral={})", path, ephemeral);
                    Ok(())
                }
                // raced with a concurrent creator: the node is there, good enough
                Err(zk::Error::NodeExists) => Ok(()),
                Err(e) => Err(CoordError::Op {
                    op: "create",
                    path: path.to_string(),
                    detail: format!("{:?}", e),
                }),
            }
        })
    }

    fn get_data(&self, path: &str) -> String {
        let client = match self.current() {
            Ok(c) => c,
            Err(_) => return String::new(),
        };
        match self.rt.block_on(async move { client.get_data(path).await }) {
            Ok((data, _stat)) => String::from_utf8(data).unwrap_or_default(),
            Err(zk::Error::NoNode) => String::new(),
            Err(e) => {
                warn!("get_data {:?} failed: {:?}", path, e);
                String::new()
            }
        }
    }
}
