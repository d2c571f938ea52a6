//! # WireSockets core
//!
//! Concrete pieces behind the [`AbstractSocket`](crate::traits::AbstractSocket)
//! contract.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio::runtime::Handle;
//! use wiresockets::*;
//!
//! let proxy = Arc::new(ProxyConfig::new(ProxyKind::Socks5, "127.0.0.1", 1080));
//! let mut socket = Transport::create(Handle::current(), Some(proxy), SocketConfig::default())?;
//!
//! socket.connect_to_host(Endpoint::new("example.org", 443));
//! // ... drive with timed_out() / try_recv_event() / read() / write()
//! ```

pub mod classifier;
pub mod config;
pub mod connection_state;
pub mod endpoint;
pub mod events;
pub mod proxy;
pub mod reporter;
pub mod tcp_socket;
pub mod transport;

// Re-export main types
pub use classifier::{classify, ErrorContext, ErrorEvent};
pub use config::{SocketConfig, TransportKind};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectPhase, ConnectionState, Metrics};
pub use endpoint::Endpoint;
pub use events::SocketEvent;
pub use proxy::{ProxyConfig, ProxyCredentials, ProxyError, ProxyKind};
pub use reporter::{debug_state, DebugState};
pub use tcp_socket::TcpSocket;
pub use transport::Transport;
