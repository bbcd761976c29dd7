use std::fmt;

/// Internal fault kind of the wire and provider layers.
///
/// The `rpc_` prefixed string form is what shows up in logs. The client
/// channel never exposes this type to callers directly; call failures are
/// reported through [RpcController](crate::controller::RpcController).
#[derive(strum::Display, strum::EnumString, strum::AsRefStr, PartialEq, Eq, Clone, Copy, thiserror::Error)]
#[repr(u8)]
pub enum RpcFault {
    /// Peer closed the connection mid-frame
    #[strum(serialize = "rpc_closed")]
    Closed = 0,
    /// Socket I/O error
    #[strum(serialize = "rpc_io_err")]
    Io = 1,
    /// Receive deadline fired
    #[strum(serialize = "rpc_timeout")]
    Timeout = 2,
    /// Service not registered
    #[strum(serialize = "rpc_service_notfound")]
    Service = 3,
    /// Method not registered
    #[strum(serialize = "rpc_method_notfound")]
    Method = 4,
    /// Message failed to serialize
    #[strum(serialize = "rpc_encode")]
    Encode = 5,
    /// Message failed to parse
    #[strum(serialize = "rpc_decode")]
    Decode = 6,
    /// A frame region exceeded its ceiling
    #[strum(serialize = "rpc_oversize")]
    Oversize = 7,
}

// The default Debug derive would ignore the strum serialization
impl fmt::Debug for RpcFault {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<std::io::Error> for RpcFault {
    #[inline(always)]
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::Closed,
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io,
        }
    }
}

/// Returned when loading or interpreting process configuration fails.
///
/// The framework returns this from init paths; the embedding process decides
/// whether it is fatal.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing config key {0:?}")]
    Missing(&'static str),
    #[error("config key {key:?} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Submitting work to a pool that has been shut down.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("worker pool is shut down")]
pub struct PoolClosed;
