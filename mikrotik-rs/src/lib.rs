#![warn(missing_docs)]
//! # mikrotik-rs
//!
//! An asynchronous Rust client for the MikroTik RouterOS Binary API.
//!
//! This crate is a thin, ergonomic facade over [`mikrotik_tokio`]: it
//! re-exports the wire-protocol types from [`mikrotik_proto`] and wraps
//! [`mikrotik_tokio::Connector`] in [`MikrotikDevice`], the entry point most
//! applications use.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mikrotik_rs::{protocol::CommandBuilder, MikrotikDevice};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = MikrotikDevice::connect("192.168.88.1:8728", "admin", Some("password")).await?;
//!
//!     let channel = device
//!         .send_command(|tag| CommandBuilder::with_tag(tag).command("/interface/print").unwrap().build())
//!         .await?;
//!     let rows = channel.wait().await?;
//!     for row in rows {
//!         println!("{row}");
//!     }
//!     Ok(())
//! }
//! ```

mod device;

/// Wire-protocol types (commands, responses, errors), re-exported from
/// `mikrotik-proto` for convenience.
pub mod protocol {
    pub use mikrotik_proto::{
        Command, CommandBuilder, CommandError, CommandResponse, DoneResponse, FatalResponse,
        ProtocolError, QueryOperator, ReceiverError, ReplyResponse, TrapCategory, TrapResponse,
    };
}

pub use mikrotik_tokio::{ConnectConfig, DeviceError, DeviceResult, Stream, StreamEvent, TlsConfig};

pub use device::MikrotikDevice;
