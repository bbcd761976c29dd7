use super::{CoordError, CoordStore, SessionCallback};
use log::*;
use std::collections::HashMap;
use std::sync::Mutex;

struct MemNode {
    data: Vec<u8>,
    ephemeral: bool,
}

struct MemInner {
    nodes: HashMap<String, MemNode>,
    started: bool,
}

/// In-process [CoordStore]: the full contract of the real store, minus the
/// network.
///
/// Used by the test suite and usable for single-process deployments where
/// provider and clients share one address space. [expire_session]
/// (Self::expire_session) emulates a session timeout: every ephemeral node
/// vanishes and the installed expiry callback fires.
pub struct MemStore {
    inner: Mutex<MemInner>,
    expiry_cb: Mutex<Option<SessionCallback>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemInner { nodes: HashMap::new(), started: false }),
            expiry_cb: Mutex::new(None),
        }
    }

    /// Drop every ephemeral node and fire the expiry callback, the way a
    /// store whose session timed out would. The callback runs with no store
    /// lock held.
    pub fn expire_session(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.started = false;
            inner.nodes.retain(|_, node| !node.ephemeral);
        }
        warn!("memory store: session expired");
        let cb = self.expiry_cb.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb();
        }
    }
}

impl CoordStore for MemStore {
    fn start(&self, on_session_expired: Option<SessionCallback>) -> Result<(), CoordError> {
        if let Some(cb) = on_session_expired {
            *self.expiry_cb.lock().unwrap() = Some(cb);
        }
        self.inner.lock().unwrap().started = true;
        Ok(())
    }

    fn create(&self, path: &str, data: &[u8], ephemeral: bool) -> Result<(), CoordError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.started {
            return Err(CoordError::NotStarted);
        }
        if inner.nodes.contains_key(path) {
            // exists: success without writing
            return Ok(());
        }
        inner.nodes.insert(path.to_string(), MemNode { data: data.to_vec(), ephemeral });
        debug!("memory store: created {:?} (ephemeral={})", path, ephemeral);
        Ok(())
    }

    fn get_data(&self, path: &str) -> String {
        let inner = self.inner.lock().unwrap();
        if !inner.started {
            return String::new();
        }
        match inner.nodes.get(path) {
            Some(node) => String::from_utf8(node.data.clone()).unwrap_or_default(),
            None => String::new(),
        }
    }
}
