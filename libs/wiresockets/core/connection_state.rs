//! Lock-free connection state and transport counters
//!
//! The owner reads these from its own context while the socket's I/O task
//! updates them, so everything here is a plain atomic.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Socket connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ConnectionState {
    /// No connect attempt has been made, or the socket was reset
    Unconnected = 0,
    /// A connect attempt (resolve, TCP connect, proxy handshake) is in flight
    Connecting = 1,
    /// Connected and usable for application data
    Connected = 2,
    /// Graceful shutdown requested, queued writes are draining
    Closing = 3,
    /// Graceful shutdown finished
    Closed = 4,
    /// A fatal, classified error occurred
    Error = 5,
}

impl ConnectionState {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Convert from the `u8` representation, falling back to `Unconnected`
    #[inline]
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Closing,
            4 => ConnectionState::Closed,
            5 => ConnectionState::Error,
            _ => ConnectionState::Unconnected,
        }
    }

    /// `Closed` and `Error` need a new `connect_to_host` to leave
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Error)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Sub-state of `Connecting`, reported for diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ConnectPhase {
    /// Not connecting
    Idle = 0,
    /// Looking up the address of the host (or of the proxy)
    Resolving = 1,
    /// OS-level TCP connect in flight
    TcpConnecting = 2,
    /// TCP is up, proxy handshake in flight
    ProxyHandshake = 3,
}

impl ConnectPhase {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ConnectPhase::Resolving,
            2 => ConnectPhase::TcpConnecting,
            3 => ConnectPhase::ProxyHandshake,
            _ => ConnectPhase::Idle,
        }
    }
}

/// Atomic wrapper around [`ConnectionState`]
#[derive(Debug)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state.code()),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_code(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.inner.store(state.code(), Ordering::Release);
    }

    /// Transition only if the current state is `current`
    ///
    /// Returns the previous state on failure.
    pub fn compare_exchange(
        &self,
        current: ConnectionState,
        new: ConnectionState,
    ) -> std::result::Result<ConnectionState, ConnectionState> {
        self.inner
            .compare_exchange(current.code(), new.code(), Ordering::AcqRel, Ordering::Acquire)
            .map(ConnectionState::from_code)
            .map_err(ConnectionState::from_code)
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    #[inline]
    pub fn is_connecting(&self) -> bool {
        self.get() == ConnectionState::Connecting
    }

    #[inline]
    pub fn is_closing(&self) -> bool {
        self.get() == ConnectionState::Closing
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.get() == ConnectionState::Error
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Unconnected)
    }
}

/// Lock-free transport counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    writes: AtomicU64,
    connect_attempts: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_connect_attempts(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }
}

/// Socket metrics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub writes: u64,
    pub connect_attempts: u64,
    pub connection_state: ConnectionState,
}

impl Metrics {
    pub(crate) fn capture(metrics: &AtomicMetrics, state: ConnectionState) -> Self {
        Self {
            bytes_sent: metrics.bytes_sent(),
            bytes_received: metrics.bytes_received(),
            writes: metrics.writes(),
            connect_attempts: metrics.connect_attempts(),
            connection_state: state,
        }
    }
}
