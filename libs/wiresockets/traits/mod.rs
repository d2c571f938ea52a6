//! # WireSockets Traits
//!
//! Core traits and types shared by every transport:
//!
//! - **AbstractSocket**: the contract a connection manager drives
//! - **ErrorLogger**: injected sink for classified failures
//! - **SocketError / ErrorKind**: error type and the failure taxonomy

pub mod error;
pub mod logger;
pub mod socket;

// Re-export commonly used types
pub use error::{ErrorKind, Result, SocketError};
pub use logger::{ErrorLogger, TracingErrorLogger};
pub use socket::AbstractSocket;
