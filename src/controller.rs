/// Default receive deadline of a call, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Per-call state: the receive deadline going in, failure and error text
/// coming out.
///
/// A controller serves one call at a time and is not shared between threads;
/// call [reset](Self::reset) before reusing it. Only the channel mutates it
/// during a call.
pub struct RpcController {
    failed: bool,
    error_text: String,
    timeout_ms: u64,
}

impl Default for RpcController {
    fn default() -> Self {
        Self { failed: false, error_text: String::new(), timeout_ms: DEFAULT_TIMEOUT_MS }
    }
}

impl RpcController {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear failure state for reuse; the configured timeout is kept.
    pub fn reset(&mut self) {
        self.failed = false;
        self.error_text.clear();
    }

    #[inline]
    pub fn failed(&self) -> bool {
        self.failed
    }

    #[inline]
    pub fn error_text(&self) -> &str {
        &self.error_text
    }

    pub fn set_failed(&mut self, reason: impl Into<String>) {
        self.failed = true;
        self.error_text = reason.into();
    }

    #[inline]
    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }

    #[inline]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// In-flight cancellation is not implemented; kept for interface parity.
    pub fn start_cancel(&mut self) {}

    /// Always false, see [start_cancel](Self::start_cancel).
    pub fn is_canceled(&self) -> bool {
        false
    }
}
