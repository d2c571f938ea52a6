use crate::core::connection_state::{ConnectionState, Metrics};
use crate::core::endpoint::Endpoint;
use crate::core::events::SocketEvent;
use crate::traits::error::Result;

/// Transport-agnostic socket contract
///
/// The connection manager that owns a socket only ever talks to it through
/// this trait, so it never learns which transport moves the bytes.
///
/// None of the methods block. Asynchronous progress (connect completed, data
/// arrived, failure) shows up as a state change and as a [`SocketEvent`] on
/// the owner's event channel.
///
/// Mutating methods take `&mut self`: a socket is driven by exactly one
/// owner, and anything else has to go through that owner.
pub trait AbstractSocket: Send {
    /// Start an asynchronous connect attempt
    ///
    /// Any previous attempt or established connection is torn down first.
    /// A cancelled attempt never reports an error.
    fn connect_to_host(&mut self, endpoint: Endpoint);

    /// Force `Error` with kind `Timeout` if the current connect attempt, or
    /// a graceful close that cannot drain, has been pending longer than the
    /// configured threshold
    ///
    /// Call this periodically from the owner's event loop.
    fn timed_out(&mut self);

    /// True only in state `Connected`
    fn is_connected(&self) -> bool;

    /// True only if the next [`read`](AbstractSocket::read) returns at least
    /// one byte
    fn has_bytes_available(&self) -> bool;

    /// Copy already-received bytes into `buffer`
    ///
    /// # Returns
    /// * `Ok(n)` - `n` bytes copied; `0` means nothing is available right now
    /// * `Err(SocketError)` - the socket is in `Error` or `Closed` and nothing
    ///   is left to read
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Queue `prefix` followed by `buffer` as one contiguous unit
    ///
    /// Either both parts are queued or neither is.
    fn write(&mut self, prefix: &[u8], buffer: &[u8]) -> Result<()>;

    /// Diagnostic code for the current state; never use it for control flow
    fn debug_state(&self) -> i32;

    /// Request a graceful shutdown: `Closing` until queued writes drain,
    /// then `Closed`
    fn disconnect_from_host(&mut self);

    /// Current connection state
    fn state(&self) -> ConnectionState;

    /// Try to receive a readiness notification (non-blocking)
    fn try_recv_event(&self) -> Option<SocketEvent>;

    /// Snapshot of the transport counters
    fn metrics(&self) -> Metrics;
}
