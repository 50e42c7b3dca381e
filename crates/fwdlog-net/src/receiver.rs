//! Forward receiver: accepts connections and decodes frames into an
//! in-memory event log.
//!
//! # Lifecycle
//!
//! ```text
//! bind ──► Listening ──► Accepting (one task per connection)
//!                              │
//!                              └──► Draining (decode until EOF) ──► Idle
//! stop / drop ──► cancel token ──► listener and every connection closed
//! ```
//!
//! Decoded records are appended to the received log in arrival order. A
//! connection that sends a bad frame is dropped and recorded as a [`Fault`];
//! nothing else is affected.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use fwdlog_core::codec::{FrameDecoder, FrameError};
use fwdlog_core::config::ReceiverConfig;
use fwdlog_core::EventRecord;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors surfaced to the receiver's owner.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// The address could not be bound, usually because the port is taken.
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// [`Receiver::wait_for`] gave up.
    #[error("timed out after {waited:?} with {received} of {expected} events")]
    Timeout {
        expected: usize,
        received: usize,
        waited: Duration,
    },
}

/// What went wrong on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    MalformedFrame,
    TypeMismatch,
    /// Trailing partial frame dropped at EOF. Non-fatal.
    IncompleteFrame,
    Io,
}

/// A per-connection problem recorded by the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub peer: SocketAddr,
    pub kind: FaultKind,
    pub detail: String,
}

impl Fault {
    fn from_frame_error(peer: SocketAddr, err: &FrameError) -> Self {
        let kind = match err {
            FrameError::MalformedFrame(_) => FaultKind::MalformedFrame,
            FrameError::TypeMismatch { .. } => FaultKind::TypeMismatch,
            FrameError::Io(_) => FaultKind::Io,
        };
        Self {
            peer,
            kind,
            detail: err.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    events: Mutex<Vec<EventRecord>>,
    faults: Mutex<Vec<Fault>>,
    arrived: Notify,
}

impl Shared {
    fn push_event(&self, event: EventRecord) {
        lock(&self.events).push(event);
        self.arrived.notify_waiters();
    }

    fn push_fault(&self, fault: Fault) {
        lock(&self.faults).push(fault);
    }
}

// A panicking connection task must not take the logs down with it.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A running forward receiver.
///
/// Dropping the receiver cancels the accept loop and every open connection.
#[derive(Debug)]
pub struct Receiver {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    accept_task: Option<JoinHandle<()>>,
}

impl Receiver {
    /// Bind `127.0.0.1:port` with default settings and start accepting.
    /// Port 0 picks an ephemeral port; see [`Receiver::local_addr`].
    pub async fn start(port: u16) -> Result<Self, ReceiverError> {
        Self::bind(&ReceiverConfig::default(), port).await
    }

    /// Bind `config.bind_host:port` and start accepting.
    pub async fn bind(config: &ReceiverConfig, port: u16) -> Result<Self, ReceiverError> {
        let addr = format!("{}:{}", config.bind_host, port);
        let bind_err = |source| ReceiverError::Bind {
            addr: addr.clone(),
            source,
        };
        let listener = TcpListener::bind(&addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        info!(%local_addr, "receiver listening");

        let shared = Arc::new(Shared::default());
        let cancel = CancellationToken::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            shared.clone(),
            cancel.clone(),
            config.max_frame_bytes,
        ));

        Ok(Self {
            local_addr,
            shared,
            cancel,
            accept_task: Some(accept_task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Snapshot of every record received so far, in arrival order.
    pub fn get_received(&self) -> Vec<EventRecord> {
        lock(&self.shared.events).clone()
    }

    /// Snapshot of every fault recorded so far.
    pub fn faults(&self) -> Vec<Fault> {
        lock(&self.shared.faults).clone()
    }

    /// Records from position `start` onwards, in arrival order.
    pub fn received_since(&self, start: usize) -> Vec<EventRecord> {
        lock(&self.shared.events)
            .get(start..)
            .map(<[EventRecord]>::to_vec)
            .unwrap_or_default()
    }

    /// Number of records received so far.
    pub fn received_count(&self) -> usize {
        lock(&self.shared.events).len()
    }

    /// Wait until at least `count` records have arrived.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Result<Vec<EventRecord>, ReceiverError> {
        self.wait_for_count(count, timeout).await?;
        Ok(self.get_received())
    }

    /// Like [`Receiver::wait_for`] but returns only how many records have
    /// arrived, without copying the log.
    pub async fn wait_for_count(&self, count: usize, timeout: Duration) -> Result<usize, ReceiverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.shared.arrived.notified();
            tokio::pin!(notified);
            // Register before checking so an arrival in between is not missed.
            notified.as_mut().enable();

            let received = self.received_count();
            if received >= count {
                return Ok(received);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(ReceiverError::Timeout {
                    expected: count,
                    received: self.received_count(),
                    waited: timeout,
                });
            }
        }
    }

    /// Whether the accept loop is still running.
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .accept_task
                .as_ref()
                .is_some_and(|task| !task.is_finished())
    }

    /// Close the listener and every open connection, then wait for the
    /// tasks to exit. Received records and faults stay readable.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "accept task ended abnormally");
            }
        }
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    max_frame_bytes: usize,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted connection");
                    connections.spawn(drain_connection(
                        stream,
                        peer,
                        shared.clone(),
                        cancel.clone(),
                        max_frame_bytes,
                    ));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "connection task ended abnormally");
                }
            }
        }
    }

    drop(listener);
    // Every connection task watches the same token.
    while connections.join_next().await.is_some() {}
    info!("receiver stopped");
}

async fn drain_connection(
    stream: TcpStream,
    peer: SocketAddr,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    max_frame_bytes: usize,
) {
    let mut frames = FramedRead::new(stream, FrameDecoder::with_max_frame_bytes(max_frame_bytes));
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(%peer, "connection closed by shutdown");
                return;
            }
            next = frames.next() => next,
        };
        match next {
            Some(Ok(event)) => {
                debug!(%peer, tag = %event.tag, timestamp = event.timestamp, "decoded frame");
                shared.push_event(event);
            }
            Some(Err(e)) => {
                warn!(%peer, error = %e, "dropping connection");
                shared.push_fault(Fault::from_frame_error(peer, &e));
                return;
            }
            None => break,
        }
    }

    let discarded = frames.decoder().discarded();
    if discarded > 0 {
        shared.push_fault(Fault {
            peer,
            kind: FaultKind::IncompleteFrame,
            detail: format!("{discarded} trailing bytes dropped at end of stream"),
        });
    }
    debug!(%peer, "connection drained");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
