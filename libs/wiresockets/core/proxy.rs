//! Proxy configuration and negotiation
//!
//! The socket connects to the proxy, then runs one of the handshakes below
//! over the raw stream before it reports `Connected`. Name resolution of the
//! target is left to the proxy.
//!
//! Handshake replies are read with exact lengths (SOCKS5) or byte by byte up
//! to the end of the header block (HTTP), so no tunnelled application byte is
//! ever consumed here.

use crate::core::classifier::{ErrorContext, ErrorEvent, PROXY_PROTOCOL_CODE};
use crate::core::endpoint::Endpoint;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::net::IpAddr;
use crate::traits::error::ErrorKind;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

const SOCKS_VERSION: u8 = 0x05;
const SOCKS_AUTH_NONE: u8 = 0x00;
const SOCKS_AUTH_USER_PASS: u8 = 0x02;
const SOCKS_AUTH_NO_ACCEPTABLE: u8 = 0xff;
const SOCKS_USER_PASS_VERSION: u8 = 0x01;
const SOCKS_CMD_CONNECT: u8 = 0x01;
const SOCKS_ATYP_IPV4: u8 = 0x01;
const SOCKS_ATYP_DOMAIN: u8 = 0x03;
const SOCKS_ATYP_IPV6: u8 = 0x04;

/// Upper bound on an HTTP CONNECT response header block
const MAX_HTTP_RESPONSE_HEADER: usize = 8 * 1024;

/// Proxy protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyKind {
    /// SOCKS5 with optional username/password authentication
    Socks5,
    /// HTTP `CONNECT` tunnel with optional Basic authentication
    HttpConnect,
}

/// Proxy credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: String,
}

impl ProxyCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Proxy a socket connects through
///
/// Passed at construction behind an `Arc` and never mutated by the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub credentials: Option<ProxyCredentials>,
}

impl ProxyConfig {
    pub fn new(kind: ProxyKind, host: impl Into<String>, port: u16) -> Self {
        Self {
            kind,
            host: host.into(),
            port,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: ProxyCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Address of the proxy itself
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }
}

/// Proxy negotiation failure
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("proxy I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("proxy protocol error: {0}")]
    Protocol(String),

    #[error("proxy rejected credentials")]
    AuthRejected,

    #[error("proxy refused request: {0}")]
    Rejected(String),

    /// The proxy is fine, but the target refused its connection
    #[error("target refused connection via proxy: {0}")]
    TargetRefused(String),

    /// The proxy is fine, but could not reach the target
    #[error("target unreachable via proxy: {0}")]
    TargetUnreachable(String),
}

impl ProxyError {
    /// Classify this failure for the socket's error path
    pub fn into_event(self) -> ErrorEvent {
        match self {
            ProxyError::Io(err) => ErrorEvent::from_io(ErrorContext::ProxyHandshake, &err),
            // Reported as if the target had been dialled directly
            ProxyError::TargetRefused(text) => {
                ErrorEvent::new(ErrorKind::ConnectionRefused, PROXY_PROTOCOL_CODE, text)
            }
            ProxyError::TargetUnreachable(text) => {
                ErrorEvent::new(ErrorKind::HostUnreachable, PROXY_PROTOCOL_CODE, text)
            }
            other => ErrorEvent::proxy_protocol(other.to_string()),
        }
    }
}

/// Run the handshake for `proxy` so that `stream` becomes a tunnel to `target`
pub async fn negotiate<S>(
    stream: &mut S,
    proxy: &ProxyConfig,
    target: &Endpoint,
) -> std::result::Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!("Negotiating {:?} proxy tunnel to {}", proxy.kind, target);
    match proxy.kind {
        ProxyKind::Socks5 => socks5_handshake(stream, proxy.credentials.as_ref(), target).await,
        ProxyKind::HttpConnect => {
            http_connect_handshake(stream, proxy.credentials.as_ref(), target).await
        }
    }
}

async fn socks5_handshake<S>(
    stream: &mut S,
    credentials: Option<&ProxyCredentials>,
    target: &Endpoint,
) -> std::result::Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Method selection
    let greeting: &[u8] = if credentials.is_some() {
        &[SOCKS_VERSION, 2, SOCKS_AUTH_NONE, SOCKS_AUTH_USER_PASS]
    } else {
        &[SOCKS_VERSION, 1, SOCKS_AUTH_NONE]
    };
    stream.write_all(greeting).await?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    if choice[0] != SOCKS_VERSION {
        return Err(ProxyError::Protocol(format!(
            "unexpected SOCKS version {:#04x}",
            choice[0]
        )));
    }

    match (choice[1], credentials) {
        (SOCKS_AUTH_NONE, _) => {}
        (SOCKS_AUTH_USER_PASS, Some(credentials)) => {
            socks5_authenticate(stream, credentials).await?;
        }
        (SOCKS_AUTH_NO_ACCEPTABLE, _) => {
            return Err(ProxyError::Protocol(
                "no acceptable authentication method".into(),
            ));
        }
        (method, _) => {
            return Err(ProxyError::Protocol(format!(
                "unsupported authentication method {:#04x}",
                method
            )));
        }
    }

    // Connect request
    let mut request = vec![SOCKS_VERSION, SOCKS_CMD_CONNECT, 0x00];
    match target.host().parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            request.push(SOCKS_ATYP_IPV4);
            request.extend_from_slice(&ip.octets());
        }
        Ok(IpAddr::V6(ip)) => {
            request.push(SOCKS_ATYP_IPV6);
            request.extend_from_slice(&ip.octets());
        }
        Err(_) => {
            let host = target.host().as_bytes();
            if host.is_empty() || host.len() > u8::MAX as usize {
                return Err(ProxyError::Protocol(format!(
                    "host name length {} not representable in SOCKS5",
                    host.len()
                )));
            }
            request.push(SOCKS_ATYP_DOMAIN);
            request.push(host.len() as u8);
            request.extend_from_slice(host);
        }
    }
    request.extend_from_slice(&target.port().to_be_bytes());
    stream.write_all(&request).await?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await?;
    if reply[0] != SOCKS_VERSION {
        return Err(ProxyError::Protocol(format!(
            "unexpected SOCKS version {:#04x} in reply",
            reply[0]
        )));
    }
    match reply[1] {
        0x00 => {}
        0x05 => {
            return Err(ProxyError::TargetRefused(format!(
                "{}: {}",
                target,
                socks5_reply_text(reply[1])
            )));
        }
        0x03 | 0x04 => {
            return Err(ProxyError::TargetUnreachable(format!(
                "{}: {}",
                target,
                socks5_reply_text(reply[1])
            )));
        }
        code => return Err(ProxyError::Rejected(socks5_reply_text(code).into())),
    }

    // Drain the bound address so the tunnel starts clean
    let address_len = match reply[3] {
        SOCKS_ATYP_IPV4 => 4,
        SOCKS_ATYP_IPV6 => 16,
        SOCKS_ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            len[0] as usize
        }
        other => {
            return Err(ProxyError::Protocol(format!(
                "unknown address type {:#04x} in reply",
                other
            )));
        }
    };
    let mut bound = vec![0u8; address_len + 2];
    stream.read_exact(&mut bound).await?;

    debug!("SOCKS5 tunnel to {} established", target);
    Ok(())
}

async fn socks5_authenticate<S>(
    stream: &mut S,
    credentials: &ProxyCredentials,
) -> std::result::Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let username = credentials.username.as_bytes();
    let password = credentials.password.as_bytes();
    if username.len() > u8::MAX as usize || password.len() > u8::MAX as usize {
        return Err(ProxyError::Protocol(
            "credentials longer than 255 bytes".into(),
        ));
    }

    let mut request = Vec::with_capacity(3 + username.len() + password.len());
    request.push(SOCKS_USER_PASS_VERSION);
    request.push(username.len() as u8);
    request.extend_from_slice(username);
    request.push(password.len() as u8);
    request.extend_from_slice(password);
    stream.write_all(&request).await?;

    let mut status = [0u8; 2];
    stream.read_exact(&mut status).await?;
    if status[1] != 0x00 {
        return Err(ProxyError::AuthRejected);
    }
    Ok(())
}

fn socks5_reply_text(code: u8) -> &'static str {
    match code {
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unassigned reply code",
    }
}

async fn http_connect_handshake<S>(
    stream: &mut S,
    credentials: Option<&ProxyCredentials>,
    target: &Endpoint,
) -> std::result::Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let authority = target.to_string();
    let mut request = format!(
        "CONNECT {} HTTP/1.1\r\nHost: {}\r\n",
        authority, authority
    );
    if let Some(credentials) = credentials {
        let token = STANDARD.encode(format!("{}:{}", credentials.username, credentials.password));
        request.push_str(&format!("Proxy-Authorization: Basic {}\r\n", token));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).await?;

    let header = read_http_header(stream).await?;
    let status_line = header.lines().next().unwrap_or_default();
    let mut parts = status_line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(ProxyError::Protocol(format!(
            "unexpected CONNECT response: {}",
            status_line
        )));
    }

    match parts.next().and_then(|code| code.parse::<u16>().ok()) {
        Some(code) if (200..300).contains(&code) => {
            debug!("HTTP CONNECT tunnel to {} established", target);
            Ok(())
        }
        Some(407) => Err(ProxyError::AuthRejected),
        Some(_) => Err(ProxyError::Rejected(status_line.to_string())),
        None => Err(ProxyError::Protocol(format!(
            "malformed CONNECT status line: {}",
            status_line
        ))),
    }
}

/// Read up to and including the blank line ending the header block
async fn read_http_header<S>(stream: &mut S) -> std::result::Result<String, ProxyError>
where
    S: AsyncRead + Unpin,
{
    let mut header = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !header.ends_with(b"\r\n\r\n") {
        if header.len() >= MAX_HTTP_RESPONSE_HEADER {
            return Err(ProxyError::Protocol("CONNECT response header too large".into()));
        }
        stream.read_exact(&mut byte).await?;
        header.push(byte[0]);
    }
    String::from_utf8(header)
        .map_err(|_| ProxyError::Protocol("CONNECT response is not valid UTF-8".into()))
}
