use tracing::error;

/// Sink for transport failure diagnostics
///
/// Sockets never log failures through a global function. Each socket holds
/// an `ErrorLogger` and calls it exactly once per fatal condition, at the
/// point the condition is detected, with the raw numeric code and the text
/// reported by the OS or the proxy.
///
/// # Example
/// ```ignore
/// struct Collect(parking_lot::Mutex<Vec<i32>>);
///
/// impl ErrorLogger for Collect {
///     fn log_error(&self, code: i32, text: &str) {
///         self.0.lock().push(code);
///     }
/// }
/// ```
pub trait ErrorLogger: Send + Sync {
    /// Record a failure
    ///
    /// # Arguments
    /// * `code` - Raw OS error code, or one of the synthetic codes in
    ///   [`crate::core::classifier`] when no OS code exists
    /// * `text` - Human readable description
    fn log_error(&self, code: i32, text: &str);
}

/// Default logger that forwards to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorLogger;

impl ErrorLogger for TracingErrorLogger {
    fn log_error(&self, code: i32, text: &str) {
        error!("Socket error {}: {}", code, text);
    }
}
