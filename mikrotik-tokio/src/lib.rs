//! Tokio transport for the MikroTik RouterOS Binary API: drives a
//! `TcpStream` (or, under the `tls` feature, a `rustls` session) through
//! [`mikrotik_proto`]'s sans-IO protocol engine behind a single
//! per-connection actor task.

pub mod channel;
pub mod config;
pub mod connector;
pub mod error;
pub mod stream;
pub mod tag_router;
pub mod transmitter;

mod login;

#[cfg(feature = "tls")]
mod tls;

pub use channel::Channel;
pub use config::{ConnectConfig, TlsConfig};
pub use connector::Connector;
pub use error::{DeviceError, DeviceResult};
pub use stream::{RequestFactory, Stream, StreamEvent};
