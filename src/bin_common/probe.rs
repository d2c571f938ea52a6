//! Probe runner
//!
//! Plays the connection-manager role for one socket: connect, write the
//! configured payload once connected, read the reply, close, and summarise
//! everything in a [`ProbeReport`].

use crate::bin_common::config::ProbeConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use wiresockets::{AbstractSocket, ErrorEvent, Metrics, SocketEvent, Transport};

/// How the probe run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Payload sent, reply (if expected) received, connection closed
    Completed,
    /// The socket reported a classified error
    Failed,
    /// The run exceeded `probe.run_timeout_secs`
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub code: i32,
    pub text: String,
}

impl From<&ErrorEvent> for ErrorReport {
    fn from(event: &ErrorEvent) -> Self {
        Self {
            kind: event.kind.to_string(),
            code: event.code,
            text: event.text.clone(),
        }
    }
}

/// JSON-serialisable summary of one probe run
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub target: String,
    pub proxy: Option<String>,
    pub outcome: ProbeOutcome,
    pub connect_ms: Option<u64>,
    pub elapsed_ms: u64,
    pub bytes_written: usize,
    pub bytes_read: usize,
    /// Received bytes, lossily decoded and truncated
    pub response_preview: String,
    pub error: Option<ErrorReport>,
    pub debug_state: i32,
    pub metrics: Metrics,
}

const PREVIEW_LEN: usize = 256;

/// Drive one socket as described by `config`
///
/// The socket is bound to the runtime this future runs on. Only setup
/// failures are returned as `Err`; transport failures end up in the report.
pub async fn run_probe(config: &ProbeConfig) -> Result<ProbeReport> {
    let proxy = config.proxy_config().map(Arc::new);
    let proxy_label = proxy
        .as_ref()
        .map(|p| format!("{:?} {}:{}", p.kind, p.host, p.port));
    let mut socket = Transport::create(Handle::current(), proxy, config.socket.clone())
        .context("failed to create socket")?;

    let settings = &config.probe;
    let frame = settings.payload.as_bytes();
    let prefix = if settings.length_prefix {
        (frame.len() as u32).to_le_bytes().to_vec()
    } else {
        Vec::new()
    };

    let started = Instant::now();
    let deadline = started + Duration::from_secs(settings.run_timeout_secs);
    let mut ticker = tokio::time::interval(Duration::from_millis(settings.poll_interval_ms));

    let mut connect_ms = None;
    let mut bytes_written = 0;
    let mut received = Vec::new();
    let mut buffer = vec![0u8; 4096];
    let mut error = None;
    let mut closing = false;

    socket.connect_to_host(config.endpoint());

    let outcome = loop {
        ticker.tick().await;
        socket.timed_out();

        while let Some(event) = socket.try_recv_event() {
            match event {
                SocketEvent::Connected => {
                    let elapsed = started.elapsed();
                    info!("Connected after {:?}", elapsed);
                    connect_ms = Some(elapsed.as_millis() as u64);
                    // A failure here is followed by an Error event
                    match socket.write(&prefix, frame) {
                        Ok(()) => bytes_written = prefix.len() + frame.len(),
                        Err(e) => warn!("Failed to queue payload: {}", e),
                    }
                    if settings.expect_bytes == 0 {
                        socket.disconnect_from_host();
                        closing = true;
                    }
                }
                SocketEvent::ReadyRead(n) => debug!("{} bytes ready", n),
                SocketEvent::Disconnected => debug!("Disconnected"),
                SocketEvent::Error(event) => {
                    warn!("Socket error: {}", event);
                    error = Some(ErrorReport::from(&event));
                }
            }
        }

        drain(&mut socket, &mut buffer, &mut received);

        if error.is_some() {
            break ProbeOutcome::Failed;
        }
        if socket.state() == wiresockets::ConnectionState::Closed {
            break ProbeOutcome::Completed;
        }
        if !closing && settings.expect_bytes > 0 && received.len() >= settings.expect_bytes {
            info!("Received {} bytes, closing", received.len());
            socket.disconnect_from_host();
            closing = true;
        }
        if Instant::now() >= deadline {
            warn!("Probe run exceeded {}s", settings.run_timeout_secs);
            break ProbeOutcome::Expired;
        }
    };

    let report = ProbeReport {
        target: config.endpoint().to_string(),
        proxy: proxy_label,
        outcome,
        connect_ms,
        elapsed_ms: started.elapsed().as_millis() as u64,
        bytes_written,
        bytes_read: received.len(),
        response_preview: String::from_utf8_lossy(&received[..received.len().min(PREVIEW_LEN)])
            .into_owned(),
        error,
        debug_state: socket.debug_state(),
        metrics: socket.metrics(),
    };

    socket.disconnect_from_host();
    Ok(report)
}

/// Read everything currently buffered
fn drain(socket: &mut Transport, buffer: &mut [u8], received: &mut Vec<u8>) {
    while socket.has_bytes_available() {
        match socket.read(buffer) {
            Ok(0) => break,
            Ok(n) => received.extend_from_slice(&buffer[..n]),
            Err(e) => {
                debug!("Read stopped: {}", e);
                break;
            }
        }
    }
}
