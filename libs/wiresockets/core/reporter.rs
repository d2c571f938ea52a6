//! Connection state reporter
//!
//! Packs the socket's internal state into one `i32` for diagnostics:
//!
//! ```text
//!  bits 0..4   connection state   (ConnectionState code)
//!  bits 4..8   connect phase      (ConnectPhase code, 0 unless Connecting)
//!  bits 8..16  last error kind    (ErrorKind code, 0 unless Error)
//! ```
//!
//! Callers must not branch on this value; it exists for log lines and
//! instrumentation.

use crate::core::connection_state::{ConnectPhase, ConnectionState};
use crate::traits::error::ErrorKind;

const STATE_MASK: i32 = 0x0f;
const PHASE_SHIFT: i32 = 4;
const PHASE_MASK: i32 = 0x0f;
const ERROR_SHIFT: i32 = 8;
const ERROR_MASK: i32 = 0xff;

/// Encode a debug code
///
/// Phase is only reported while `Connecting`, the error kind only while in
/// `Error`, so stale sub-state never leaks into the code.
pub fn debug_state(
    state: ConnectionState,
    phase: ConnectPhase,
    last_error: Option<ErrorKind>,
) -> i32 {
    let phase = if state == ConnectionState::Connecting {
        phase.code()
    } else {
        0
    };
    let error = match (state, last_error) {
        (ConnectionState::Error, Some(kind)) => kind.code(),
        _ => 0,
    };

    i32::from(state.code()) | (i32::from(phase) << PHASE_SHIFT) | (i32::from(error) << ERROR_SHIFT)
}

/// Decoded form of a debug code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugState {
    pub state: ConnectionState,
    pub phase: ConnectPhase,
    pub error: Option<ErrorKind>,
}

impl DebugState {
    pub fn decode(code: i32) -> Self {
        Self {
            state: ConnectionState::from_code((code & STATE_MASK) as u8),
            phase: ConnectPhase::from_code(((code >> PHASE_SHIFT) & PHASE_MASK) as u8),
            error: ErrorKind::from_code(((code >> ERROR_SHIFT) & ERROR_MASK) as u8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_states_encode_to_their_code() {
        assert_eq!(debug_state(ConnectionState::Unconnected, ConnectPhase::Idle, None), 0);
        assert_eq!(debug_state(ConnectionState::Connected, ConnectPhase::Idle, None), 2);
        assert_eq!(debug_state(ConnectionState::Closed, ConnectPhase::Idle, None), 4);
    }

    #[test]
    fn test_connecting_carries_phase() {
        let code = debug_state(ConnectionState::Connecting, ConnectPhase::ProxyHandshake, None);
        assert_eq!(code, 1 | (3 << 4));

        let decoded = DebugState::decode(code);
        assert_eq!(decoded.state, ConnectionState::Connecting);
        assert_eq!(decoded.phase, ConnectPhase::ProxyHandshake);
        assert_eq!(decoded.error, None);
    }

    #[test]
    fn test_error_carries_kind() {
        let code = debug_state(
            ConnectionState::Error,
            ConnectPhase::TcpConnecting,
            Some(ErrorKind::ConnectionRefused),
        );
        let decoded = DebugState::decode(code);
        assert_eq!(decoded.state, ConnectionState::Error);
        assert_eq!(decoded.phase, ConnectPhase::Idle);
        assert_eq!(decoded.error, Some(ErrorKind::ConnectionRefused));
    }

    #[test]
    fn test_stale_sub_state_is_hidden() {
        let code = debug_state(
            ConnectionState::Connected,
            ConnectPhase::ProxyHandshake,
            Some(ErrorKind::Timeout),
        );
        assert_eq!(code, ConnectionState::Connected.code() as i32);
    }
}
