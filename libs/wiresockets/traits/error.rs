use crate::core::connection_state::ConnectionState;
use std::fmt;
use thiserror::Error;

/// Semantic classification of a transport failure
///
/// Every fatal condition a socket detects is folded into exactly one of
/// these kinds before the socket moves to `Error`. The numeric value is
/// stable and is what the state reporter packs into the debug code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    /// The remote endpoint actively refused the TCP connection
    ConnectionRefused = 1,
    /// The host could not be resolved or no route exists to it
    HostUnreachable = 2,
    /// The connect attempt (or an OS operation) did not complete in time
    Timeout = 3,
    /// The proxy rejected the request or spoke an unexpected protocol
    ProxyNegotiationFailed = 4,
    /// The peer closed or reset an established connection
    UnexpectedClose = 5,
    /// Reading from or writing to an established connection failed
    ReadWriteFailure = 6,
    /// Anything the classifier does not recognise
    Unknown = 7,
}

impl ErrorKind {
    /// All kinds, in code order
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::ConnectionRefused,
        ErrorKind::HostUnreachable,
        ErrorKind::Timeout,
        ErrorKind::ProxyNegotiationFailed,
        ErrorKind::UnexpectedClose,
        ErrorKind::ReadWriteFailure,
        ErrorKind::Unknown,
    ];

    /// Stable numeric code (never 0; 0 means "no error" in the debug code)
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of [`ErrorKind::code`]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.code() == code)
    }

    /// Short human readable label used in log lines
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ConnectionRefused => "connection refused",
            ErrorKind::HostUnreachable => "host unreachable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ProxyNegotiationFailed => "proxy negotiation failed",
            ErrorKind::UnexpectedClose => "unexpected close",
            ErrorKind::ReadWriteFailure => "read/write failure",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for wiresockets
#[derive(Error, Debug)]
pub enum SocketError {
    /// The socket is not in a state that allows the operation
    #[error("Socket not connected (state: {0:?})")]
    NotConnected(ConnectionState),

    /// A transport failure that has already been classified and logged
    #[error("Transport error ({kind}, code {code}): {message}")]
    Transport {
        kind: ErrorKind,
        code: i32,
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SocketError {
    /// Classified kind, if this error carries one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            SocketError::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type for wiresockets operations
pub type Result<T> = std::result::Result<T, SocketError>;
