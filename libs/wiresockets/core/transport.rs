use crate::core::config::{SocketConfig, TransportKind};
use crate::core::connection_state::{ConnectionState, Metrics};
use crate::core::endpoint::Endpoint;
use crate::core::events::SocketEvent;
use crate::core::proxy::ProxyConfig;
use crate::core::tcp_socket::TcpSocket;
use crate::traits::*;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Closed set of transport variants behind [`AbstractSocket`]
///
/// The variant is chosen once, at construction, from [`TransportKind`].
/// Callers that don't care which transport they have hold a `Transport`
/// (or a `Box<dyn AbstractSocket>`) and only use the trait.
pub enum Transport {
    Tcp(TcpSocket),
}

impl Transport {
    /// Build the transport selected by `config.transport`
    pub fn create(
        runtime: Handle,
        proxy: Option<Arc<ProxyConfig>>,
        config: SocketConfig,
    ) -> Result<Self> {
        Self::create_with_logger(runtime, proxy, config, Arc::new(TracingErrorLogger))
    }

    pub fn create_with_logger(
        runtime: Handle,
        proxy: Option<Arc<ProxyConfig>>,
        config: SocketConfig,
        logger: Arc<dyn ErrorLogger>,
    ) -> Result<Self> {
        match config.transport {
            TransportKind::Tcp => Ok(Transport::Tcp(TcpSocket::with_logger(
                runtime, proxy, config, logger,
            )?)),
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Tcp(_) => TransportKind::Tcp,
        }
    }

    fn inner(&self) -> &dyn AbstractSocket {
        match self {
            Transport::Tcp(socket) => socket,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn AbstractSocket {
        match self {
            Transport::Tcp(socket) => socket,
        }
    }
}

impl AbstractSocket for Transport {
    fn connect_to_host(&mut self, endpoint: Endpoint) {
        self.inner_mut().connect_to_host(endpoint)
    }

    fn timed_out(&mut self) {
        self.inner_mut().timed_out()
    }

    fn is_connected(&self) -> bool {
        self.inner().is_connected()
    }

    fn has_bytes_available(&self) -> bool {
        self.inner().has_bytes_available()
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        self.inner_mut().read(buffer)
    }

    fn write(&mut self, prefix: &[u8], buffer: &[u8]) -> Result<()> {
        self.inner_mut().write(prefix, buffer)
    }

    fn debug_state(&self) -> i32 {
        self.inner().debug_state()
    }

    fn disconnect_from_host(&mut self) {
        self.inner_mut().disconnect_from_host()
    }

    fn state(&self) -> ConnectionState {
        self.inner().state()
    }

    fn try_recv_event(&self) -> Option<SocketEvent> {
        self.inner().try_recv_event()
    }

    fn metrics(&self) -> Metrics {
        self.inner().metrics()
    }
}
