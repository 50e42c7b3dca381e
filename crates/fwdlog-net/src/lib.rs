//! fwdlog-net: forward-protocol networking for fwdlog.
//!
//! - [`client`]: one-shot, fire-and-forget [`send`](client::send).
//! - [`sender`]: persistent [`Sender`](sender::Sender) with a pending
//!   buffer, and the tag-prefixing [`Logger`](sender::Logger).
//! - [`receiver`]: the [`Receiver`](receiver::Receiver) that decodes
//!   incoming frames into an in-memory log.
//! - [`port`]: stateless free-port search.

pub mod client;
pub mod port;
pub mod receiver;
pub mod sender;

pub use client::{send, Client, ClientError};
pub use port::{find_free_port, PortError, DEFAULT_PORT_RANGE};
pub use receiver::{Fault, FaultKind, Receiver, ReceiverError};
pub use sender::{Logger, Sender};
