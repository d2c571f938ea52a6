use std::fmt;

/// Remote host and port a socket connects to
///
/// The fields are private: once handed to `connect_to_host` an endpoint is
/// never changed, and a new attempt takes a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP literal
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<std::net::SocketAddr> for Endpoint {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Endpoint::new("example.org", 443).to_string(), "example.org:443");
        assert_eq!(Endpoint::new("::1", 80).to_string(), "[::1]:80");
    }

    #[test]
    fn test_from_socket_addr() {
        let addr: std::net::SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let endpoint = Endpoint::from(addr);
        assert_eq!(endpoint.host(), "127.0.0.1");
        assert_eq!(endpoint.port(), 8080);
    }
}
