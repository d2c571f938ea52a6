//! Socket Probe - Main Library
//!
//! Manual verification harness for the `wiresockets` transport: loads a
//! probe configuration, drives one socket through connect/write/read and
//! reports what happened.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, config, logging, probe)
//! - **wiresockets**: Transport library (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use socket_probe::bin_common::{load_config_from_env, ConfigType, ProbeConfig};
//! ```

// Re-export workspace libraries for convenience
pub use wiresockets;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod config;
    pub mod logging;
    pub mod probe;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use config::{ConfigError, ProbeConfig, ProxySettings};
    pub use logging::init_tracing;
    pub use probe::{run_probe, ProbeReport};
}
