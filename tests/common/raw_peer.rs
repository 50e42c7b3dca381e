//! RawPeer: a bare TCP peer that writes arbitrary bytes to a receiver.
//!
//! Useful for simulating slow networks, partial frames, and foreign or
//! broken encoders without going through the client.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

pub struct RawPeer {
    stream: TcpStream,
}

impl RawPeer {
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Write everything in one call.
    pub async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Write `bytes` as two separate writes split at `at`, pausing between.
    pub async fn write_split(&mut self, bytes: &[u8], at: usize, pause: Duration) -> io::Result<()> {
        let (head, tail) = bytes.split_at(at);
        self.write(head).await?;
        tokio::time::sleep(pause).await;
        self.write(tail).await
    }

    /// Drip `bytes` out `chunk` bytes at a time.
    pub async fn write_chunks(&mut self, bytes: &[u8], chunk: usize, pause: Duration) -> io::Result<()> {
        for piece in bytes.chunks(chunk) {
            self.write(piece).await?;
            tokio::time::sleep(pause).await;
        }
        Ok(())
    }

    /// Half-close so the receiver sees EOF.
    pub async fn close(mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
