//! Error classification
//!
//! Folds OS, resolver and proxy failures into [`ErrorKind`]. Classification
//! is a pure function of the error and the operation that produced it; the
//! socket calls it synchronously at the point of failure and then logs the
//! result through its [`ErrorLogger`](crate::traits::ErrorLogger).

use crate::traits::error::{ErrorKind, SocketError};
use std::fmt;
use std::io;

/// Code used when an I/O error carries no OS error number
pub const NO_OS_CODE: i32 = -1;
/// Synthetic code for a connect attempt that exceeded its threshold
pub const TIMEOUT_CODE: i32 = -2;
/// Synthetic code for a proxy that answered with something unexpected
pub const PROXY_PROTOCOL_CODE: i32 = -3;
/// Synthetic code for an orderly close by the peer (read returned EOF)
pub const PEER_CLOSED_CODE: i32 = -4;
/// Synthetic code for a host name that resolved to no addresses
pub const NO_ADDRESSES_CODE: i32 = -5;

/// Operation during which a failure was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorContext {
    /// Looking up the host (or proxy) address
    Resolve,
    /// OS-level TCP connect
    Connect,
    /// SOCKS5 / HTTP CONNECT negotiation
    ProxyHandshake,
    /// Reading from an established connection
    Read,
    /// Writing to an established connection
    Write,
}

impl ErrorContext {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorContext::Resolve => "resolve",
            ErrorContext::Connect => "connect",
            ErrorContext::ProxyHandshake => "proxy handshake",
            ErrorContext::Read => "read",
            ErrorContext::Write => "write",
        }
    }
}

/// Classify an I/O error raised during `context`
pub fn classify(error: &io::Error, context: ErrorContext) -> ErrorKind {
    use io::ErrorKind as Io;

    if error.kind() == Io::TimedOut {
        return ErrorKind::Timeout;
    }

    match context {
        // Resolver failures surface as `Other`/`Uncategorized` with no
        // portable code; anything failing here means the name is unusable.
        ErrorContext::Resolve => ErrorKind::HostUnreachable,
        ErrorContext::ProxyHandshake => ErrorKind::ProxyNegotiationFailed,
        ErrorContext::Connect => match error.kind() {
            Io::ConnectionRefused => ErrorKind::ConnectionRefused,
            Io::HostUnreachable | Io::NetworkUnreachable | Io::AddrNotAvailable => {
                ErrorKind::HostUnreachable
            }
            Io::ConnectionReset | Io::ConnectionAborted => ErrorKind::UnexpectedClose,
            _ => ErrorKind::Unknown,
        },
        ErrorContext::Read | ErrorContext::Write => match error.kind() {
            Io::UnexpectedEof
            | Io::ConnectionReset
            | Io::ConnectionAborted
            | Io::BrokenPipe
            | Io::NotConnected => ErrorKind::UnexpectedClose,
            Io::HostUnreachable | Io::NetworkUnreachable => ErrorKind::HostUnreachable,
            _ => ErrorKind::ReadWriteFailure,
        },
    }
}

/// A classified failure: kind, raw code and text
///
/// Produced once per fatal condition and handed to the owner through the
/// event channel; the socket itself keeps only the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub code: i32,
    pub text: String,
}

impl ErrorEvent {
    pub fn new(kind: ErrorKind, code: i32, text: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            text: text.into(),
        }
    }

    /// Classify an I/O error
    pub fn from_io(context: ErrorContext, error: &io::Error) -> Self {
        Self {
            kind: classify(error, context),
            code: error.raw_os_error().unwrap_or(NO_OS_CODE),
            text: format!("{} failed: {}", context.as_str(), error),
        }
    }

    /// Connect attempt exceeded its threshold without completing
    pub fn connect_timeout(elapsed: std::time::Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            TIMEOUT_CODE,
            format!("connect attempt timed out after {:?}", elapsed),
        )
    }

    /// Graceful close could not drain queued writes in time
    pub fn close_timeout(elapsed: std::time::Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            TIMEOUT_CODE,
            format!("graceful close did not finish after {:?}", elapsed),
        )
    }

    /// Peer closed an established connection
    pub fn peer_closed() -> Self {
        Self::new(
            ErrorKind::UnexpectedClose,
            PEER_CLOSED_CODE,
            "remote host closed the connection",
        )
    }

    /// Proxy answered, but not with what the protocol requires
    pub fn proxy_protocol(text: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProxyNegotiationFailed, PROXY_PROTOCOL_CODE, text)
    }

    /// Resolver succeeded but produced nothing to connect to
    pub fn no_addresses(host: &str) -> Self {
        Self::new(
            ErrorKind::HostUnreachable,
            NO_ADDRESSES_CODE,
            format!("no addresses found for {}", host),
        )
    }

    /// Log line text; unknown kinds always carry the raw code so gaps in
    /// classification show up in the logs
    pub fn log_text(&self) -> String {
        match self.kind {
            ErrorKind::Unknown => format!("unclassified error (raw code {}): {}", self.code, self.text),
            kind => format!("{}: {}", kind, self.text),
        }
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {}): {}", self.kind, self.code, self.text)
    }
}

impl From<ErrorEvent> for SocketError {
    fn from(event: ErrorEvent) -> Self {
        SocketError::Transport {
            kind: event.kind,
            code: event.code,
            message: event.text,
        }
    }
}
