//! Persistent sender and tagged logger.
//!
//! Unlike [`Client`](crate::client::Client), a [`Sender`] keeps its
//! connection open between emits and reconnects lazily. Frames that could not
//! be written stay in an in-memory pending buffer and are written ahead of
//! the next frame the caller emits. A failure while the earlier pending
//! bytes already exceed `buffer_max_bytes` drops the whole buffer.

use bytes::BytesMut;
use fwdlog_core::config::ClientConfig;
use fwdlog_core::{unix_now, EventRecord, Record};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::{connect, write_frame, ClientError};

#[derive(Debug, Default)]
struct SenderState {
    stream: Option<TcpStream>,
    pending: BytesMut,
}

/// Long-lived, thread-safe connection to one receiver.
#[derive(Debug)]
pub struct Sender {
    addr: String,
    config: ClientConfig,
    state: Mutex<SenderState>,
}

impl Sender {
    /// Create a sender for `config.host:config.port`. No connection is made
    /// until the first emit.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            addr: format!("{}:{}", config.host, config.port),
            config,
            state: Mutex::new(SenderState::default()),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Write `event`, preceded by anything left pending from earlier failures.
    ///
    /// On failure the connection is dropped and the error returned; the
    /// frame stays pending unless what was pending before it is already
    /// over the limit.
    pub async fn emit(&self, event: &EventRecord) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        let SenderState { stream, pending } = &mut *state;
        let earlier = pending.len();
        event.encode_into(pending);

        let mut conn = match stream.take() {
            Some(conn) => conn,
            None => match connect(&self.addr, self.config.connect_timeout()).await {
                Ok(conn) => conn,
                Err(e) => {
                    self.trim_pending(pending, earlier);
                    return Err(e);
                }
            },
        };

        let written = write_frame(
            &mut conn,
            &pending[..],
            self.config.write_timeout(),
            self.config.write_retries,
        )
        .await;

        match written {
            Ok(()) => {
                debug!(addr = %self.addr, tag = %event.tag, bytes = pending.len(), "flushed");
                pending.clear();
                *stream = Some(conn);
                Ok(())
            }
            Err(source) => {
                // conn is dropped here; the next emit reconnects.
                self.trim_pending(pending, earlier);
                Err(ClientError::Send {
                    addr: self.addr.clone(),
                    source,
                })
            }
        }
    }

    /// Bytes waiting to be written on the next emit.
    pub async fn pending_bytes(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Whether a connection is currently held open.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.stream.is_some()
    }

    /// Shut down the held connection, if any. Pending bytes are kept.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut conn) = state.stream.take() {
            if let Err(e) = conn.shutdown().await {
                debug!(addr = %self.addr, error = %e, "shutdown failed");
            }
        }
    }

    fn trim_pending(&self, pending: &mut BytesMut, earlier: usize) {
        if earlier > self.config.buffer_max_bytes {
            warn!(
                addr = %self.addr,
                dropped = pending.len(),
                limit = self.config.buffer_max_bytes,
                "pending buffer over limit, dropping"
            );
            pending.clear();
        } else {
            warn!(addr = %self.addr, pending = pending.len(), "send failed, keeping frame pending");
        }
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

/// Tag-prefixing front end over a [`Sender`].
#[derive(Debug)]
pub struct Logger {
    prefix: String,
    sender: Sender,
}

impl Logger {
    pub fn new(prefix: impl Into<String>, sender: Sender) -> Self {
        Self {
            prefix: prefix.into(),
            sender,
        }
    }

    /// `prefix.label`, or whichever of the two is non-empty.
    pub fn tag_for(&self, label: &str) -> String {
        match (self.prefix.is_empty(), label.is_empty()) {
            (false, false) => format!("{}.{}", self.prefix, label),
            (false, true) => self.prefix.clone(),
            (true, _) => label.to_string(),
        }
    }

    /// Log `payload` under `label`, stamped with the current time.
    pub async fn log(&self, label: &str, payload: Record) -> Result<(), ClientError> {
        self.log_at(label, unix_now(), payload).await
    }

    /// Log `payload` under `label` with an explicit timestamp.
    pub async fn log_at(&self, label: &str, timestamp: u64, payload: Record) -> Result<(), ClientError> {
        let event = EventRecord::new(self.tag_for(label), timestamp, payload)?;
        self.sender.emit(&event).await
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
