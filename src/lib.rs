//! fwdlog: Fluentd forward-protocol client and receiver.
//!
//! This crate re-exports the core and networking crates so that integration
//! tests and the binary can import everything from one place.
//!
//! # Architecture
//!
//! ```text
//! Client / Sender ──► [tag, ts, payload] frames ──► Receiver ──► received log
//!        │                                              │
//!        └──────────── fwdlog-core::codec ──────────────┘
//! ```
//!
//! The receiver runs its accept loop and one task per connection on the
//! `tokio` runtime; callers read snapshots of the received log at any time.

pub use fwdlog_core::{codec, config, types};
pub use fwdlog_core::{decode, encode, encode_into, record, unix_now, EventRecord, FieldValue, FrameError, Record};
pub use fwdlog_net::{client, port, receiver, sender};
pub use fwdlog_net::{
    find_free_port, send, Client, ClientError, Fault, FaultKind, Logger, PortError, Receiver,
    ReceiverError, Sender, DEFAULT_PORT_RANGE,
};
