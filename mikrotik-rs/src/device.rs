use std::time::Duration;

use mikrotik_proto::Command;
use mikrotik_tokio::{Channel, ConnectConfig, Connector, DeviceResult, RequestFactory, Stream};

/// A client for interacting with MikroTik devices.
///
/// `MikrotikDevice` owns a [`Connector`] — a single connection driven by one
/// background actor task — and hands out [`Channel`]s and [`Stream`]s for
/// individual commands. Cheaply `Clone`-able: every clone shares the same
/// connection.
#[derive(Clone)]
pub struct MikrotikDevice {
    connector: Connector,
}

impl MikrotikDevice {
    /// Establishes a plain-TCP connection to `addr` (`host` or `host:port`,
    /// defaulting to port 8728) and completes the `/login` handshake.
    ///
    /// This is a convenience constructor; [`MikrotikDevice::connect_with`]
    /// exposes the full [`ConnectConfig`] surface (TLS, timeouts,
    /// keepalive).
    pub async fn connect(addr: &str, username: &str, password: Option<&str>) -> DeviceResult<Self> {
        let (host, port) = split_host_port(addr);
        let mut config = ConnectConfig::new(host);
        if let Some(port) = port {
            config.port = port;
        }
        Self::connect_with(config, username, password).await
    }

    /// Establishes a connection per `config` and completes the `/login`
    /// handshake.
    pub async fn connect_with(config: ConnectConfig, username: &str, password: Option<&str>) -> DeviceResult<Self> {
        let connector = Connector::connect(config, username, password).await?;
        Ok(Self { connector })
    }

    /// Sends a one-shot command and returns a [`Channel`] for its replies.
    ///
    /// `build_request` receives the tag the connection assigned this
    /// command and must produce the finished [`Command`] carrying it, e.g.
    /// `|tag| CommandBuilder::with_tag(tag).command("/interface/print")?.build()`.
    pub async fn send_command(&self, build_request: impl FnOnce(u16) -> Command) -> DeviceResult<Channel> {
        Channel::open(&self.connector, build_request).await
    }

    /// Opens a long-lived [`Stream`] for a streaming command (e.g.
    /// `/tool/torch`, `/ip/address/listen`).
    ///
    /// `empty_data_interval` should be `Some(d)` when the request carries
    /// `=interval=<seconds>`, enabling the empty-data debounce described in
    /// [`mikrotik_tokio::stream`]; otherwise pass `None`.
    pub async fn stream_command(
        &self,
        empty_data_interval: Option<Duration>,
        build_request: RequestFactory,
    ) -> DeviceResult<Stream> {
        Stream::open(&self.connector, empty_data_interval, build_request).await
    }

    /// Drops this handle's reference to the connection. The underlying
    /// actor task shuts down once every clone has been dropped.
    pub fn close(self) {
        drop(self.connector);
    }
}

fn split_host_port(addr: &str) -> (&str, Option<u16>) {
    match addr.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (addr, None),
        },
        None => (addr, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_host_port_extracts_explicit_port() {
        assert_eq!(split_host_port("192.168.88.1:8728"), ("192.168.88.1", Some(8728)));
    }

    #[test]
    fn split_host_port_defaults_when_no_colon() {
        assert_eq!(split_host_port("192.168.88.1"), ("192.168.88.1", None));
    }

    #[test]
    fn split_host_port_treats_ipv6_without_brackets_as_hostless_port() {
        // No bracket-aware parsing: a bare `host:port` convention is all the
        // convenience constructor supports.
        assert_eq!(split_host_port("not-a-port:nope"), ("not-a-port:nope", None));
    }
}
