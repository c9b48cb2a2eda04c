//! Connection configuration (L6).

use std::time::Duration;

/// Parameters for [`crate::connector::Connector::connect`].
///
/// `Default` gives plain TCP on the standard API port with a 10 second
/// connect timeout and no idle timeout.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Router hostname or IP address.
    pub host: String,
    /// Router API port. Defaults to 8728 (plain) or 8729 (TLS) via
    /// [`ConnectConfig::new`]/[`ConnectConfig::with_tls`].
    pub port: u16,
    /// TLS parameters; `enabled: false` uses plain TCP.
    pub tls: TlsConfig,
    /// Maximum time to spend establishing the TCP/TLS connection.
    pub connect_timeout: Duration,
    /// Close the connection if no bytes are read for this long. `None`
    /// disables idle timeout enforcement.
    pub idle_timeout: Option<Duration>,
    /// Enable TCP keepalive probes on the socket.
    pub keepalive: bool,
}

impl ConnectConfig {
    /// Plain TCP configuration on port 8728.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 8728,
            tls: TlsConfig::disabled(),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: None,
            keepalive: true,
        }
    }

    /// TLS configuration on port 8729 with hostname verification enabled.
    pub fn with_tls(host: impl Into<String>) -> Self {
        Self {
            port: 8729,
            tls: TlsConfig::enabled(),
            ..Self::new(host)
        }
    }
}

/// TLS parameters for a [`ConnectConfig`].
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Whether to negotiate TLS at all.
    pub enabled: bool,
    /// PEM-encoded CA bundle trusted in addition to the platform's native
    /// roots. `None` trusts only the native root store.
    pub ca_bundle: Option<Vec<u8>>,
    /// PEM-encoded client certificate and private key, for mutual TLS.
    pub client_cert: Option<(Vec<u8>, Vec<u8>)>,
    /// Verify the server's certificate matches `host`. Disabling this is a
    /// deliberate footgun for lab environments with self-signed certs and
    /// no SAN; it is `true` by default.
    pub verify_hostname: bool,
}

impl TlsConfig {
    /// TLS disabled.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// TLS enabled with hostname verification and the platform's native
    /// root store.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ca_bundle: None,
            client_cert: None,
            verify_hostname: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_to_plain_tcp_on_8728() {
        let cfg = ConnectConfig::new("10.0.0.1");
        assert_eq!(cfg.port, 8728);
        assert!(!cfg.tls.enabled);
        assert!(cfg.keepalive);
        assert_eq!(cfg.idle_timeout, None);
    }

    #[test]
    fn with_tls_defaults_to_8729_with_hostname_verification() {
        let cfg = ConnectConfig::with_tls("router.example.com");
        assert_eq!(cfg.port, 8729);
        assert!(cfg.tls.enabled);
        assert!(cfg.tls.verify_hostname);
    }
}
