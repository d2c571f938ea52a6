//! Common test utilities for WireSockets integration tests
//!
//! Mock TCP servers and proxies bound to ephemeral loopback ports, a
//! recording error logger, and polling helpers.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use wiresockets::{AbstractSocket, Endpoint, ErrorLogger, SocketEvent};

/// Logger that keeps every call for later assertions
#[derive(Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<(i32, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<(i32, String)> {
        self.entries.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }
}

impl ErrorLogger for RecordingLogger {
    fn log_error(&self, code: i32, text: &str) {
        self.entries.lock().push((code, text.to_string()));
    }
}

/// Poll `condition` every 5ms until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Drain every pending event from `socket`
pub fn drain_events(socket: &impl AbstractSocket) -> Vec<SocketEvent> {
    std::iter::from_fn(|| socket.try_recv_event()).collect()
}

/// Wait for the next event from `socket`
pub async fn next_event(socket: &impl AbstractSocket, timeout: Duration) -> Option<SocketEvent> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(event) = socket.try_recv_event() {
            return Some(event);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait for an event matching `predicate`, discarding the ones before it
pub async fn wait_for_event(
    socket: &impl AbstractSocket,
    timeout: Duration,
    predicate: impl Fn(&SocketEvent) -> bool,
) -> Option<SocketEvent> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let event = next_event(socket, remaining).await?;
        if predicate(&event) {
            return Some(event);
        }
    }
}

/// Read from `socket` until `expected` bytes have arrived or `timeout` elapses
pub async fn read_exactly(
    socket: &mut impl AbstractSocket,
    expected: usize,
    timeout: Duration,
) -> Vec<u8> {
    let mut received = Vec::with_capacity(expected);
    let mut buffer = [0u8; 1024];
    let deadline = tokio::time::Instant::now() + timeout;

    while received.len() < expected && tokio::time::Instant::now() < deadline {
        if socket.has_bytes_available() {
            let n = socket.read(&mut buffer).expect("read after has_bytes_available");
            assert!(n > 0, "has_bytes_available promised at least one byte");
            received.extend_from_slice(&buffer[..n]);
        } else {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
    received
}

/// An address nothing is listening on
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// What a [`MockTcpServer`] does with each accepted connection
#[derive(Debug, Clone)]
pub enum ServerMode {
    /// Write back everything received
    Echo,
    /// Record everything received, never reply
    Capture,
    /// Send a greeting, then close
    GreetAndClose(Vec<u8>),
    /// Keep the connection open but never read from it
    Stall,
    /// Send `n` bytes, then keep the connection open
    Flood(usize),
}

/// A simple mock TCP server for testing
pub struct MockTcpServer {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<u8>>>,
    connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
}

impl MockTcpServer {
    /// Create and start a new mock server
    pub async fn start(mode: ServerMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(Notify::new());

        let received_clone = Arc::clone(&received);
        let connections_clone = Arc::clone(&connections);
        let shutdown_clone = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                connections_clone.fetch_add(1, Ordering::SeqCst);
                                let mode = mode.clone();
                                let received = Arc::clone(&received_clone);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, mode, received).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            received,
            connections,
            shutdown,
        }
    }

    async fn handle_connection(mut stream: TcpStream, mode: ServerMode, received: Arc<Mutex<Vec<u8>>>) {
        if let ServerMode::GreetAndClose(greeting) = &mode {
            let _ = stream.write_all(greeting).await;
            let _ = stream.shutdown().await;
            return;
        }
        if let ServerMode::Stall = mode {
            tokio::time::sleep(Duration::from_secs(30)).await;
            return;
        }
        if let ServerMode::Flood(total) = mode {
            let block = vec![0xabu8; 8 * 1024];
            let mut sent = 0;
            while sent < total {
                let n = block.len().min(total - sent);
                if stream.write_all(&block[..n]).await.is_err() {
                    return;
                }
                sent += n;
            }
            tokio::time::sleep(Duration::from_secs(30)).await;
            return;
        }

        let mut buffer = [0u8; 4096];
        loop {
            match stream.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    received.lock().extend_from_slice(&buffer[..n]);
                    if matches!(mode, ServerMode::Echo) && stream.write_all(&buffer[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::from(self.addr)
    }

    /// Every byte received so far, across connections
    pub fn received(&self) -> Vec<u8> {
        self.received.lock().clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockTcpServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Behaviour of a [`MockProxy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// SOCKS5 without authentication, relaying to IPv4 targets
    Socks5,
    /// Like `Socks5`, but the first connection never gets a reply
    Socks5StallFirst,
    /// Accept and never answer anything
    Silent,
    /// HTTP CONNECT, relaying to the requested authority
    HttpConnect,
    /// HTTP CONNECT that always answers 407
    HttpRequireAuth,
    /// Not a proxy at all: greets with an SSH banner
    NotAProxy,
}

/// A mock proxy for testing
pub struct MockProxy {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    stalled_released: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl MockProxy {
    pub async fn start(mode: ProxyMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let stalled_released = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());

        let connections_clone = Arc::clone(&connections);
        let released_clone = Arc::clone(&stalled_released);
        let shutdown_clone = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        let index = connections_clone.fetch_add(1, Ordering::SeqCst);
                        let released = Arc::clone(&released_clone);
                        tokio::spawn(async move {
                            Self::handle_connection(stream, mode, index, released).await;
                        });
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            connections,
            stalled_released,
            shutdown,
        }
    }

    async fn handle_connection(
        mut stream: TcpStream,
        mode: ProxyMode,
        index: usize,
        released: Arc<AtomicBool>,
    ) {
        match mode {
            ProxyMode::Silent => hold_until_closed(stream).await,
            ProxyMode::Socks5StallFirst if index == 0 => {
                hold_until_closed(stream).await;
                released.store(true, Ordering::SeqCst);
            }
            ProxyMode::Socks5 | ProxyMode::Socks5StallFirst => {
                if let Some(target) = socks5_accept(&mut stream).await {
                    relay(stream, target).await;
                }
            }
            ProxyMode::HttpConnect => {
                let Some(head) = read_header(&mut stream).await else { return };
                let authority = head
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or_default()
                    .to_string();
                let Ok(target) = TcpStream::connect(authority.as_str()).await else {
                    let _ = stream.write_all(b"HTTP/1.1 502 Bad Gateway\r\n\r\n").await;
                    return;
                };
                let _ = stream
                    .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                    .await;
                relay(stream, target).await;
            }
            ProxyMode::HttpRequireAuth => {
                let _ = read_header(&mut stream).await;
                let _ = stream
                    .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
                    .await;
            }
            ProxyMode::NotAProxy => {
                let _ = stream.write_all(b"SSH-2.0-OpenSSH_9.6\r\n").await;
                hold_until_closed(stream).await;
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// True once the client dropped the stalled first connection
    pub fn stalled_released(&self) -> bool {
        self.stalled_released.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockProxy {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn hold_until_closed(mut stream: TcpStream) {
    let mut buffer = [0u8; 256];
    loop {
        match stream.read(&mut buffer).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

async fn socks5_accept(stream: &mut TcpStream) -> Option<TcpStream> {
    let mut head = [0u8; 2];
    stream.read_exact(&mut head).await.ok()?;
    let mut methods = vec![0u8; head[1] as usize];
    stream.read_exact(&mut methods).await.ok()?;
    stream.write_all(&[5, 0]).await.ok()?;

    let mut request = [0u8; 4];
    stream.read_exact(&mut request).await.ok()?;
    if request[3] != 1 {
        let _ = stream.write_all(&[5, 8, 0, 1, 0, 0, 0, 0, 0, 0]).await;
        return None;
    }
    let mut address = [0u8; 6];
    stream.read_exact(&mut address).await.ok()?;
    let ip = std::net::Ipv4Addr::new(address[0], address[1], address[2], address[3]);
    let port = u16::from_be_bytes([address[4], address[5]]);

    match TcpStream::connect((ip, port)).await {
        Ok(target) => {
            stream.write_all(&[5, 0, 0, 1, 127, 0, 0, 1, 0, 0]).await.ok()?;
            Some(target)
        }
        Err(_) => {
            let _ = stream.write_all(&[5, 5, 0, 1, 0, 0, 0, 0, 0, 0]).await;
            None
        }
    }
}

async fn read_header(stream: &mut TcpStream) -> Option<String> {
    let mut header = Vec::new();
    let mut byte = [0u8; 1];
    while !header.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).await.ok()?;
        header.push(byte[0]);
    }
    String::from_utf8(header).ok()
}

async fn relay(mut client: TcpStream, mut target: TcpStream) {
    let _ = tokio::io::copy_bidirectional(&mut client, &mut target).await;
}

/// Run `future` with a generous upper bound so a hung test fails instead of
/// blocking the suite
pub async fn bounded<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(10), future)
        .await
        .expect("test step timed out")
}
