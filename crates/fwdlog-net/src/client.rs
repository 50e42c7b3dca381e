//! Forward client: one connection per send, fire-and-forget.
//!
//! [`Client::send`] connects with a bounded timeout, writes the encoded frame
//! until every byte is flushed, and closes the connection. Nothing is read
//! back from the receiver.

use std::io;
use std::time::Duration;

use fwdlog_core::config::ClientConfig;
use fwdlog_core::{EventRecord, FrameError, Record};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Failure of a single send attempt. Never retried automatically.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The destination refused, could not be resolved, or timed out.
    #[error("could not connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// The frame could not be written in full.
    #[error("could not send to {addr}: {source}")]
    Send {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// The event itself is invalid (e.g. empty tag).
    #[error(transparent)]
    InvalidEvent(#[from] FrameError),
}

/// Stateless forward client.
#[derive(Debug, Clone, Default)]
pub struct Client {
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send one `[tag, timestamp, payload]` frame to `host:port`.
    pub async fn send(
        &self,
        host: &str,
        port: u16,
        tag: &str,
        timestamp: u64,
        payload: Record,
    ) -> Result<(), ClientError> {
        let event = EventRecord::new(tag, timestamp, payload)?;
        self.send_all(host, port, std::slice::from_ref(&event)).await
    }

    /// Send an already-built record.
    pub async fn send_record(&self, host: &str, port: u16, event: &EventRecord) -> Result<(), ClientError> {
        self.send_all(host, port, std::slice::from_ref(event)).await
    }

    /// Send several records, in order, over a single connection.
    pub async fn send_all(&self, host: &str, port: u16, events: &[EventRecord]) -> Result<(), ClientError> {
        let addr = format!("{host}:{port}");
        let mut stream = connect(&addr, self.config.connect_timeout()).await?;

        for event in events {
            let frame = event.encode();
            write_frame(
                &mut stream,
                &frame,
                self.config.write_timeout(),
                self.config.write_retries,
            )
            .await
            .map_err(|source| ClientError::Send {
                addr: addr.clone(),
                source,
            })?;
            debug!(%addr, tag = %event.tag, bytes = frame.len(), "sent frame");
        }

        stream
            .shutdown()
            .await
            .map_err(|source| ClientError::Send { addr, source })
    }
}

/// Send one frame with default client settings.
pub async fn send(host: &str, port: u16, tag: &str, timestamp: u64, payload: Record) -> Result<(), ClientError> {
    Client::default().send(host, port, tag, timestamp, payload).await
}

// ---------------------------------------------------------------------------
// Socket helpers (shared with the persistent sender)
// ---------------------------------------------------------------------------

pub(crate) async fn connect(addr: &str, timeout: Duration) -> Result<TcpStream, ClientError> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(ClientError::Connection {
            addr: addr.to_string(),
            source,
        }),
        Err(_) => Err(ClientError::Connection {
            addr: addr.to_string(),
            source: io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timed out after {timeout:?}"),
            ),
        }),
    }
}

/// Write `bytes` in full, resuming after short writes.
///
/// A write that makes no progress (zero bytes or `Interrupted`) counts
/// against `retries`; any progress resets the count. Each individual write
/// is bounded by `timeout`.
pub(crate) async fn write_frame<W>(writer: &mut W, mut bytes: &[u8], timeout: Duration, retries: u32) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut stalls = 0u32;
    while !bytes.is_empty() {
        match tokio::time::timeout(timeout, writer.write(bytes)).await {
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("write timed out after {timeout:?}"),
                ))
            }
            Ok(Ok(n)) if n > 0 => {
                bytes = &bytes[n..];
                stalls = 0;
            }
            Ok(Ok(_)) => stall(&mut stalls, retries, "write accepted zero bytes")?,
            Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {
                stall(&mut stalls, retries, "write interrupted")?
            }
            Ok(Err(e)) => return Err(e),
        }
        if stalls > 0 {
            tokio::task::yield_now().await;
        }
    }
    writer.flush().await
}

fn stall(stalls: &mut u32, retries: u32, what: &str) -> io::Result<()> {
    *stalls += 1;
    if *stalls > retries {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("{what}; gave up after {retries} retries"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
