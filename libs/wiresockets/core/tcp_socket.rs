//! TCP transport
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐          ┌──────────────────────────────┐
//! │ Owner (connection mgr)   │          │ I/O task (bound runtime)     │
//! │                          │ outbound │                              │
//! │ write(prefix, payload) ──┼─────────>│ write_all(frame) ──> OS      │
//! │                          │  (mpsc)  │                              │
//! │ read() <── inbound buf <─┼──────────┼── read(chunk) <── OS         │
//! │                          │          │                              │
//! │ try_recv_event() <───────┼──────────┼── Connected / ReadyRead /    │
//! │                          │ (xbeam)  │   Disconnected / Error       │
//! └──────────────────────────┘          └──────────────────────────────┘
//! ```
//!
//! Every connect attempt gets a new attempt number. The I/O task may only
//! touch shared state while its number is current, and the owner bumps the
//! number before cancelling a task, so a cancelled attempt can never report
//! anything.

use crate::core::classifier::{ErrorContext, ErrorEvent, NO_OS_CODE};
use crate::core::config::SocketConfig;
use crate::core::connection_state::{
    AtomicConnectionState, AtomicMetrics, ConnectPhase, ConnectionState, Metrics,
};
use crate::core::endpoint::Endpoint;
use crate::core::events::SocketEvent;
use crate::core::proxy::{self, ProxyConfig, ProxyError};
use crate::core::reporter;
use crate::traits::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Commands from the owner to the I/O task
#[derive(Debug)]
enum Outbound {
    /// One contiguous prefix + payload unit
    Frame(Vec<u8>),
    /// Flush queued frames, shut down the write half, report `Closed`
    Shutdown,
}

/// State shared between the owner and the I/O task
struct Shared {
    state: AtomicConnectionState,
    phase: AtomicU8,
    /// `ErrorKind` code of the last failure, 0 if none
    last_error: AtomicU8,
    /// Current attempt number; guards every write from the I/O task
    attempt: Mutex<u64>,
    inbound: Mutex<VecDeque<u8>>,
    /// Signalled when the owner takes bytes out of `inbound`
    drained: Notify,
    metrics: AtomicMetrics,
    events: Sender<SocketEvent>,
    logger: Arc<dyn ErrorLogger>,
}

impl Shared {
    fn new(events: Sender<SocketEvent>, logger: Arc<dyn ErrorLogger>) -> Self {
        Self {
            state: AtomicConnectionState::new(ConnectionState::Unconnected),
            phase: AtomicU8::new(ConnectPhase::Idle.code()),
            last_error: AtomicU8::new(0),
            attempt: Mutex::new(0),
            inbound: Mutex::new(VecDeque::new()),
            drained: Notify::new(),
            metrics: AtomicMetrics::new(),
            events,
            logger,
        }
    }

    /// Invalidate the current attempt and drop its buffered bytes
    fn retire_attempt(&self) -> u64 {
        let mut attempt = self.attempt.lock();
        *attempt += 1;
        self.inbound.lock().clear();
        *attempt
    }

    /// Run `f` only while `attempt` is still current
    fn with_attempt<R>(&self, attempt: u64, f: impl FnOnce() -> R) -> Option<R> {
        let current = self.attempt.lock();
        if *current != attempt {
            return None;
        }
        Some(f())
    }

    fn phase(&self) -> ConnectPhase {
        ConnectPhase::from_code(self.phase.load(Ordering::Acquire))
    }

    fn last_error(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.last_error.load(Ordering::Acquire))
    }

    fn set_phase(&self, attempt: u64, phase: ConnectPhase) -> bool {
        self.with_attempt(attempt, || self.phase.store(phase.code(), Ordering::Release))
            .is_some()
    }

    /// Log, classify and move to `Error`. Caller holds the attempt lock.
    fn record_error(&self, event: ErrorEvent) {
        self.logger.log_error(event.code, &event.log_text());
        self.last_error.store(event.kind.code(), Ordering::Release);
        self.phase.store(ConnectPhase::Idle.code(), Ordering::Release);
        self.state.set(ConnectionState::Error);
        let _ = self.events.send(SocketEvent::Error(event));
    }

    fn handle_error(&self, attempt: u64, event: ErrorEvent) -> bool {
        self.with_attempt(attempt, || self.record_error(event)).is_some()
    }

    /// Fail an attempt stalled in `stalled` and invalidate it in one step
    ///
    /// Returns the new attempt number, or `None` if the attempt already
    /// left that state or was replaced.
    fn expire(&self, attempt: u64, stalled: ConnectionState, event: ErrorEvent) -> Option<u64> {
        let mut current = self.attempt.lock();
        if *current != attempt || self.state.get() != stalled {
            return None;
        }
        *current += 1;
        self.record_error(event);
        Some(*current)
    }

    fn mark_connected(&self, attempt: u64) -> bool {
        self.with_attempt(attempt, || {
            if self
                .state
                .compare_exchange(ConnectionState::Connecting, ConnectionState::Connected)
                .is_err()
            {
                return false;
            }
            self.phase.store(ConnectPhase::Idle.code(), Ordering::Release);
            let _ = self.events.send(SocketEvent::Connected);
            true
        })
        .unwrap_or(false)
    }

    fn push_inbound(&self, attempt: u64, bytes: &[u8]) -> bool {
        self.with_attempt(attempt, || {
            self.inbound.lock().extend(bytes);
            self.metrics.add_received(bytes.len());
            let _ = self.events.send(SocketEvent::ReadyRead(bytes.len()));
        })
        .is_some()
    }

    /// Copy buffered bytes into `buffer`, oldest first
    fn take_inbound(&self, buffer: &mut [u8]) -> usize {
        let mut inbound = self.inbound.lock();
        let count = buffer.len().min(inbound.len());
        for (slot, byte) in buffer.iter_mut().zip(inbound.drain(..count)) {
            *slot = byte;
        }
        if count > 0 {
            // Stores a permit if the I/O task is not waiting yet
            self.drained.notify_one();
        }
        count
    }

    fn inbound_len(&self) -> usize {
        self.inbound.lock().len()
    }

    fn begin_close(&self, attempt: u64) -> bool {
        self.with_attempt(attempt, || {
            self.state
                .compare_exchange(ConnectionState::Connected, ConnectionState::Closing)
                .is_ok()
        })
        .unwrap_or(false)
    }

    fn finish_close(&self, attempt: u64) {
        self.with_attempt(attempt, || {
            self.state.set(ConnectionState::Closed);
            let _ = self.events.send(SocketEvent::Disconnected);
        });
    }

    /// Peer sent EOF: expected while closing, a failure otherwise
    fn peer_closed(&self, attempt: u64) {
        self.with_attempt(attempt, || {
            if self.state.is_closing() {
                self.state.set(ConnectionState::Closed);
                let _ = self.events.send(SocketEvent::Disconnected);
            } else {
                self.record_error(ErrorEvent::peer_closed());
            }
        });
    }
}

/// Socket over a direct or proxied TCP connection
///
/// The socket is bound at construction to the runtime its I/O task runs on
/// and is driven through `&mut self` by a single owner. It is `Send`, so the
/// owner can move it once, but not `Sync`.
///
/// # Example
/// ```ignore
/// let mut socket = TcpSocket::new(Handle::current(), None, SocketConfig::default())?;
/// socket.connect_to_host(Endpoint::new("149.154.167.51", 443));
///
/// loop {
///     socket.timed_out();
///     while let Some(event) = socket.try_recv_event() {
///         match event {
///             SocketEvent::Connected => socket.write(&header, &body)?,
///             SocketEvent::ReadyRead(_) => { let n = socket.read(&mut buf)?; }
///             SocketEvent::Error(e) => return Err(e.into()),
///             SocketEvent::Disconnected => return Ok(()),
///         }
///     }
///     tokio::time::sleep(Duration::from_millis(50)).await;
/// }
/// ```
pub struct TcpSocket {
    runtime: Handle,
    proxy: Option<Arc<ProxyConfig>>,
    config: Arc<SocketConfig>,
    shared: Arc<Shared>,
    event_rx: Receiver<SocketEvent>,
    /// Attempt number owned by the running task
    attempt: u64,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    task: Option<JoinHandle<()>>,
    endpoint: Option<Endpoint>,
    connect_started: Option<Instant>,
    close_started: Option<Instant>,
    _not_sync: PhantomData<Cell<()>>,
}

impl TcpSocket {
    /// Create a socket that logs failures through `tracing`
    pub fn new(
        runtime: Handle,
        proxy: Option<Arc<ProxyConfig>>,
        config: SocketConfig,
    ) -> Result<Self> {
        Self::with_logger(runtime, proxy, config, Arc::new(TracingErrorLogger))
    }

    /// Create a socket with an injected error logger
    pub fn with_logger(
        runtime: Handle,
        proxy: Option<Arc<ProxyConfig>>,
        config: SocketConfig,
        logger: Arc<dyn ErrorLogger>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, event_rx) = unbounded();

        Ok(Self {
            runtime,
            proxy,
            config: Arc::new(config),
            shared: Arc::new(Shared::new(event_tx, logger)),
            event_rx,
            attempt: 0,
            outbound: None,
            task: None,
            endpoint: None,
            connect_started: None,
            close_started: None,
            _not_sync: PhantomData,
        })
    }

    /// Endpoint of the current or last connect attempt
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_deref()
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    /// Sub-state of `Connecting`
    pub fn connect_phase(&self) -> ConnectPhase {
        self.shared.phase()
    }

    /// Kind of the failure that put the socket into `Error`
    pub fn last_error(&self) -> Option<ErrorKind> {
        if self.shared.state.is_error() {
            self.shared.last_error()
        } else {
            None
        }
    }

    /// Stop the running task, if any, and invalidate its attempt
    ///
    /// Returns the aborted handle so the next task can wait for the old
    /// OS socket to be dropped before dialing.
    fn teardown(&mut self) -> Option<JoinHandle<()>> {
        self.attempt = self.shared.retire_attempt();
        self.outbound = None;
        self.connect_started = None;
        self.close_started = None;
        let previous = self.task.take();
        if let Some(task) = &previous {
            task.abort();
        }
        previous
    }
}

impl AbstractSocket for TcpSocket {
    fn connect_to_host(&mut self, endpoint: Endpoint) {
        let previous = self.teardown();
        if previous.is_some() {
            debug!("Cancelled previous attempt before connecting to {}", endpoint);
        }

        // Notifications from the torn-down attempt are meaningless now
        while self.event_rx.try_recv().is_ok() {}

        self.shared.last_error.store(0, Ordering::Release);
        self.shared
            .phase
            .store(ConnectPhase::Resolving.code(), Ordering::Release);
        self.shared.state.set(ConnectionState::Connecting);
        self.shared.metrics.increment_connect_attempts();

        match &self.proxy {
            Some(proxy) => info!(
                "Connecting to {} via {:?} proxy {}:{}",
                endpoint, proxy.kind, proxy.host, proxy.port
            ),
            None => info!("Connecting to {}", endpoint),
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = IoTask {
            shared: Arc::clone(&self.shared),
            attempt: self.attempt,
            endpoint: endpoint.clone(),
            proxy: self.proxy.clone(),
            config: Arc::clone(&self.config),
        };

        self.outbound = Some(outbound_tx);
        self.endpoint = Some(endpoint);
        self.connect_started = Some(Instant::now());
        self.task = Some(self.runtime.spawn(async move {
            if let Some(previous) = previous {
                // Resolves once the aborted task, and its socket, are dropped
                let _ = previous.await;
            }
            task.run(outbound_rx).await;
        }));
    }

    fn timed_out(&mut self) {
        let stalled = self.shared.state.get();
        let started = match stalled {
            ConnectionState::Connecting => self.connect_started,
            // Peer stopped reading while queued writes drain
            ConnectionState::Closing => self.close_started,
            _ => return,
        };
        let Some(started) = started else {
            return;
        };
        let elapsed = started.elapsed();
        if elapsed < self.config.connect_timeout() {
            return;
        }

        let phase = self.shared.phase();
        let event = match stalled {
            ConnectionState::Closing => ErrorEvent::close_timeout(elapsed),
            _ => ErrorEvent::connect_timeout(elapsed),
        };
        if let Some(attempt) = self.shared.expire(self.attempt, stalled, event) {
            match stalled {
                ConnectionState::Closing => {
                    warn!("Graceful close stalled for {:?}, giving up", elapsed)
                }
                _ => warn!("Connect attempt stalled in {:?} for {:?}, giving up", phase, elapsed),
            }
            self.attempt = attempt;
            self.outbound = None;
            self.connect_started = None;
            self.close_started = None;
            if let Some(task) = self.task.take() {
                task.abort();
            }
        }
    }

    #[inline]
    fn is_connected(&self) -> bool {
        self.shared.state.is_connected()
    }

    fn has_bytes_available(&self) -> bool {
        !self.shared.inbound.lock().is_empty()
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let copied = self.shared.take_inbound(buffer);
        if copied > 0 || buffer.is_empty() {
            return Ok(copied);
        }

        let state = self.shared.state.get();
        if state.is_terminal() {
            return Err(SocketError::NotConnected(state));
        }
        Ok(0)
    }

    fn write(&mut self, prefix: &[u8], buffer: &[u8]) -> Result<()> {
        let state = self.shared.state.get();
        if !matches!(state, ConnectionState::Connecting | ConnectionState::Connected) {
            return Err(SocketError::NotConnected(state));
        }
        let Some(outbound) = &self.outbound else {
            return Err(SocketError::NotConnected(state));
        };
        if prefix.is_empty() && buffer.is_empty() {
            return Ok(());
        }

        let mut frame = Vec::with_capacity(prefix.len() + buffer.len());
        frame.extend_from_slice(prefix);
        frame.extend_from_slice(buffer);

        if let Err(err) = outbound.send(Outbound::Frame(frame)) {
            let event = ErrorEvent::new(
                ErrorKind::ReadWriteFailure,
                NO_OS_CODE,
                format!("write failed: {}", err),
            );
            self.shared.handle_error(self.attempt, event.clone());
            return Err(event.into());
        }
        Ok(())
    }

    fn debug_state(&self) -> i32 {
        reporter::debug_state(
            self.shared.state.get(),
            self.shared.phase(),
            self.shared.last_error(),
        )
    }

    fn disconnect_from_host(&mut self) {
        match self.shared.state.get() {
            ConnectionState::Connected => {
                if !self.shared.begin_close(self.attempt) {
                    return;
                }
                info!("Closing connection");
                self.close_started = Some(Instant::now());
                let queued = self
                    .outbound
                    .as_ref()
                    .map(|outbound| outbound.send(Outbound::Shutdown).is_ok())
                    .unwrap_or(false);
                if !queued {
                    self.shared.finish_close(self.attempt);
                }
            }
            ConnectionState::Connecting => {
                info!("Aborting connect attempt");
                self.teardown();
                self.shared
                    .phase
                    .store(ConnectPhase::Idle.code(), Ordering::Release);
                self.shared.state.set(ConnectionState::Unconnected);
            }
            _ => {}
        }
    }

    #[inline]
    fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    fn try_recv_event(&self) -> Option<SocketEvent> {
        self.event_rx.try_recv().ok()
    }

    fn metrics(&self) -> Metrics {
        Metrics::capture(&self.shared.metrics, self.shared.state.get())
    }
}

impl Drop for TcpSocket {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// One connect attempt and, if it succeeds, the connection it produced
struct IoTask {
    shared: Arc<Shared>,
    attempt: u64,
    endpoint: Endpoint,
    proxy: Option<Arc<ProxyConfig>>,
    config: Arc<SocketConfig>,
}

impl IoTask {
    async fn run(self, outbound: mpsc::UnboundedReceiver<Outbound>) {
        let stream = match self.establish().await {
            Ok(stream) => stream,
            Err(event) => {
                self.shared.handle_error(self.attempt, event);
                return;
            }
        };

        if !self.shared.mark_connected(self.attempt) {
            return;
        }
        info!("Connected to {}", self.endpoint);

        self.pump(stream, outbound).await;
        debug!("I/O task for {} exiting", self.endpoint);
    }

    /// Resolve, dial and (if configured) negotiate the proxy tunnel
    async fn establish(&self) -> std::result::Result<TcpStream, ErrorEvent> {
        // Failing to reach the proxy is a proxy error, not a target error
        let (dial, resolve_context, connect_context) = match &self.proxy {
            Some(proxy) => (
                proxy.endpoint(),
                ErrorContext::ProxyHandshake,
                ErrorContext::ProxyHandshake,
            ),
            None => (
                self.endpoint.clone(),
                ErrorContext::Resolve,
                ErrorContext::Connect,
            ),
        };

        self.shared.set_phase(self.attempt, ConnectPhase::Resolving);
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((dial.host(), dial.port()))
            .await
            .map_err(|err| ErrorEvent::from_io(resolve_context, &err))?
            .collect();
        if addrs.is_empty() {
            return Err(match &self.proxy {
                Some(_) => ErrorEvent::proxy_protocol(format!(
                    "no addresses found for proxy {}",
                    dial.host()
                )),
                None => ErrorEvent::no_addresses(dial.host()),
            });
        }

        self.shared.set_phase(self.attempt, ConnectPhase::TcpConnecting);
        let mut stream = connect_any(&addrs)
            .await
            .map_err(|err| ErrorEvent::from_io(connect_context, &err))?;

        if self.config.nodelay {
            if let Err(err) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY on {}: {}", dial, err);
            }
        }

        if let Some(proxy) = &self.proxy {
            self.shared.set_phase(self.attempt, ConnectPhase::ProxyHandshake);
            proxy::negotiate(&mut stream, proxy, &self.endpoint)
                .await
                .map_err(ProxyError::into_event)?;
        }

        Ok(stream)
    }

    /// Move bytes until the connection fails, the peer closes, or the owner
    /// asks for shutdown
    async fn pump(&self, stream: TcpStream, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
        let (mut reader, mut writer) = stream.into_split();
        let mut chunk = vec![0u8; self.config.read_chunk_size];

        loop {
            let full = self.shared.inbound_len() >= self.config.max_inbound;
            tokio::select! {
                result = reader.read(&mut chunk), if !full => {
                    match result {
                        Ok(0) => {
                            debug!("Peer {} closed the connection", self.endpoint);
                            self.shared.peer_closed(self.attempt);
                            return;
                        }
                        Ok(n) => {
                            if !self.shared.push_inbound(self.attempt, &chunk[..n]) {
                                return;
                            }
                        }
                        Err(err) => {
                            self.shared
                                .handle_error(self.attempt, ErrorEvent::from_io(ErrorContext::Read, &err));
                            return;
                        }
                    }
                }

                _ = self.shared.drained.notified(), if full => {}

                command = outbound.recv() => {
                    match command {
                        Some(Outbound::Frame(frame)) => {
                            if let Err(err) = writer.write_all(&frame).await {
                                self.shared
                                    .handle_error(self.attempt, ErrorEvent::from_io(ErrorContext::Write, &err));
                                return;
                            }
                            self.shared.metrics.add_sent(frame.len());
                        }
                        Some(Outbound::Shutdown) => {
                            if let Err(err) = writer.shutdown().await {
                                debug!("Shutdown of write half failed: {}", err);
                            }
                            self.shared.finish_close(self.attempt);
                            return;
                        }
                        None => {
                            debug!("Outbound channel closed");
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Try each resolved address in order, keeping the last failure
async fn connect_any(addrs: &[SocketAddr]) -> io::Result<TcpStream> {
    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!("Connect to {} failed: {}", addr, err);
                last_error = Some(err);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses to connect to")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingLogger(Mutex<usize>);

    impl ErrorLogger for CountingLogger {
        fn log_error(&self, _code: i32, _text: &str) {
            *self.0.lock() += 1;
        }
    }

    fn shared() -> (Shared, Receiver<SocketEvent>, Arc<CountingLogger>) {
        let (tx, rx) = unbounded();
        let logger = Arc::new(CountingLogger::default());
        (Shared::new(tx, logger.clone()), rx, logger)
    }

    #[test]
    fn test_stale_attempt_cannot_report() {
        let (shared, events, logger) = shared();
        let stale = *shared.attempt.lock();
        shared.state.set(ConnectionState::Connecting);
        let current = shared.retire_attempt();
        assert_ne!(stale, current);

        assert!(!shared.handle_error(stale, ErrorEvent::peer_closed()));
        assert!(!shared.mark_connected(stale));
        assert!(!shared.push_inbound(stale, b"late"));
        assert!(!shared.set_phase(stale, ConnectPhase::TcpConnecting));

        assert_eq!(shared.state.get(), ConnectionState::Connecting);
        assert_eq!(*logger.0.lock(), 0);
        assert!(shared.inbound.lock().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_current_attempt_reports_once() {
        let (shared, events, logger) = shared();
        shared.state.set(ConnectionState::Connecting);
        let attempt = *shared.attempt.lock();

        assert!(shared.handle_error(attempt, ErrorEvent::peer_closed()));
        assert_eq!(shared.state.get(), ConnectionState::Error);
        assert_eq!(shared.last_error(), Some(ErrorKind::UnexpectedClose));
        assert_eq!(*logger.0.lock(), 1);
        assert!(matches!(events.try_recv(), Ok(SocketEvent::Error(_))));
    }

    #[test]
    fn test_expire_connect_invalidates_attempt() {
        let (shared, events, logger) = shared();
        shared.state.set(ConnectionState::Connecting);
        let attempt = *shared.attempt.lock();

        let next = shared
            .expire(
                attempt,
                ConnectionState::Connecting,
                ErrorEvent::connect_timeout(std::time::Duration::from_secs(8)),
            )
            .unwrap();
        assert_ne!(next, attempt);
        assert_eq!(shared.last_error(), Some(ErrorKind::Timeout));

        // The task's own failure after expiry is dropped
        assert!(!shared.handle_error(attempt, ErrorEvent::peer_closed()));
        assert!(shared
            .expire(attempt, ConnectionState::Connecting, ErrorEvent::peer_closed())
            .is_none());
        assert_eq!(*logger.0.lock(), 1);
        assert_eq!(events.try_iter().count(), 1);
    }

    #[test]
    fn test_expire_requires_stalled_state() {
        let (shared, events, logger) = shared();
        let attempt = *shared.attempt.lock();
        shared.state.set(ConnectionState::Connected);

        let close_timeout = ErrorEvent::close_timeout(std::time::Duration::from_secs(8));
        assert!(shared
            .expire(attempt, ConnectionState::Closing, close_timeout.clone())
            .is_none());
        assert!(shared.begin_close(attempt));
        assert!(shared
            .expire(attempt, ConnectionState::Closing, close_timeout)
            .is_some());

        assert_eq!(shared.state.get(), ConnectionState::Error);
        assert_eq!(shared.last_error(), Some(ErrorKind::Timeout));
        assert_eq!(*logger.0.lock(), 1);
        assert_eq!(events.try_iter().count(), 1);
    }

    #[test]
    fn test_take_inbound_drains_in_order() {
        let (shared, _events, _logger) = shared();
        let attempt = *shared.attempt.lock();
        shared.push_inbound(attempt, b"abc");
        shared.push_inbound(attempt, b"def");

        let mut buffer = [0u8; 4];
        assert_eq!(shared.take_inbound(&mut buffer), 4);
        assert_eq!(&buffer, b"abcd");
        assert_eq!(shared.take_inbound(&mut buffer), 2);
        assert_eq!(&buffer[..2], b"ef");
        assert_eq!(shared.metrics.bytes_received(), 6);
    }

    #[test]
    fn test_peer_close_while_closing_is_graceful() {
        let (shared, events, logger) = shared();
        let attempt = *shared.attempt.lock();
        shared.state.set(ConnectionState::Connected);

        assert!(shared.begin_close(attempt));
        shared.peer_closed(attempt);
        assert_eq!(shared.state.get(), ConnectionState::Closed);
        assert_eq!(events.try_recv().ok(), Some(SocketEvent::Disconnected));
        assert_eq!(*logger.0.lock(), 0);
    }
}
