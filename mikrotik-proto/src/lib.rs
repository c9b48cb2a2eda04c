//! Sans-IO implementation of the MikroTik RouterOS API wire protocol.
//!
//! This crate owns no socket and spawns no task: it only encodes
//! [`Command`](command::Command)s to bytes and decodes bytes back into
//! [`CommandResponse`](response::CommandResponse)s. A transport crate (such
//! as `mikrotik-tokio`) drives the actual I/O and feeds bytes to a
//! [`Receiver`](receiver::Receiver).

pub mod command;
pub mod error;
pub mod length;
pub mod receiver;
pub mod response;
pub mod sentence;
pub mod word;

pub use command::{Command, CommandBuilder, QueryOperator};
pub use error::{CommandError, ProtocolError, ReceiverError};
pub use receiver::Receiver;
pub use response::{CommandResponse, DoneResponse, FatalResponse, ReplyResponse, TrapCategory, TrapResponse};
pub use sentence::Sentence;
pub use word::{Word, WordCategory};
