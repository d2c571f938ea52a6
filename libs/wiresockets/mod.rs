//! # WireSockets
//!
//! A pluggable, non-blocking byte transport for wire protocol engines.
//!
//! ## Features
//!
//! - **Transport-agnostic contract**: the [`AbstractSocket`] trait hides which
//!   transport moves the bytes
//! - **Owner-affine sockets**: every socket is bound to one runtime handle and
//!   driven through `&mut self`; the I/O task talks back over channels
//! - **Atomic prefix + payload writes**: a header and its body always reach the
//!   peer as one contiguous unit
//! - **Classified errors**: OS and proxy failures are folded into a small
//!   [`ErrorKind`] taxonomy and logged once through an injected [`ErrorLogger`]
//! - **Transparent proxies**: SOCKS5 and HTTP `CONNECT` negotiation before the
//!   socket reports `Connected`

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core socket functionality
pub use self::core::{
    classifier, config, connection_state, endpoint, events, proxy, reporter, tcp_socket,
    transport,
    classifier::{classify, ErrorContext, ErrorEvent},
    config::{SocketConfig, TransportKind},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectPhase, ConnectionState, Metrics},
    endpoint::Endpoint,
    events::SocketEvent,
    proxy::{ProxyConfig, ProxyCredentials, ProxyError, ProxyKind},
    reporter::{debug_state, DebugState},
    tcp_socket::TcpSocket,
    transport::Transport,
};

/// Type alias for Result with SocketError
pub type Result<T> = std::result::Result<T, traits::SocketError>;
