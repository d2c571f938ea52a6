use crate::traits::{Result, SocketError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default connect threshold checked by `timed_out()`
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 8_000;

/// Default size of a single read from the OS socket
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Default cap on bytes buffered for the owner before reads pause
pub const DEFAULT_MAX_INBOUND: usize = 8 * 1024 * 1024;

/// Which transport variant a socket is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Plain TCP, optionally through a proxy
    #[default]
    Tcp,
}

/// Configuration for a socket
///
/// Deserialises from YAML; every field has a default so an empty mapping
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Transport variant
    pub transport: TransportKind,

    /// How long a connect attempt (resolve + TCP + proxy handshake) may stay
    /// in `Connecting` before `timed_out()` fails it
    pub connect_timeout_ms: u64,

    /// Size of each read from the OS socket into the inbound buffer
    pub read_chunk_size: usize,

    /// Disable Nagle's algorithm on the connected stream
    pub nodelay: bool,

    /// Soft cap on unread inbound bytes; the socket stops reading from the
    /// OS once this many are buffered and resumes after the owner reads.
    /// May be overshot by at most one `read_chunk_size`.
    pub max_inbound: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            nodelay: true,
            max_inbound: DEFAULT_MAX_INBOUND,
        }
    }
}

impl SocketConfig {
    /// Connect threshold as a `Duration`
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    pub fn with_max_inbound(mut self, bytes: usize) -> Self {
        self.max_inbound = bytes;
        self
    }

    /// Reject values the socket cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 {
            return Err(SocketError::Configuration(
                "connect_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.read_chunk_size == 0 {
            return Err(SocketError::Configuration(
                "read_chunk_size must be greater than zero".into(),
            ));
        }
        if self.max_inbound == 0 {
            return Err(SocketError::Configuration(
                "max_inbound must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
