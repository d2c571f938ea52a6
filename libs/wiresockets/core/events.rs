use crate::core::classifier::ErrorEvent;

/// Readiness notifications delivered to the socket's owner
///
/// The I/O task never calls back into the owner; it pushes these onto a
/// channel the owner drains from its own context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The connect attempt (including any proxy handshake) finished
    Connected,
    /// New bytes were buffered; the payload is the number just added
    ReadyRead(usize),
    /// Graceful shutdown finished
    Disconnected,
    /// A fatal error was classified and logged; the socket is now in `Error`
    Error(ErrorEvent),
}
