//! Shared test doubles and helpers for integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;

use http_exchange::context::Connection;

/// Observes what happened to a [`ScriptedStream`] after it was moved into a context.
#[derive(Debug, Clone)]
pub struct Probe {
    written: Arc<Mutex<Vec<u8>>>,
    shutdowns: Arc<AtomicUsize>,
    write_attempts: Arc<AtomicUsize>,
    connected: Arc<AtomicBool>,
}

impl Probe {
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Simulate the peer going away without us noticing through a write.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// In-memory connection double: serves `input` to reads, records writes,
/// and optionally starts failing writes and shutdown after a byte budget.
#[derive(Debug)]
pub struct ScriptedStream {
    probe: Probe,
    input: Vec<u8>,
    read_pos: usize,
    /// Bytes accepted before every further write fails.
    fail_after: Option<usize>,
}

impl ScriptedStream {
    fn build(input: &[u8], fail_after: Option<usize>) -> (Self, Probe) {
        let probe = Probe {
            written: Arc::new(Mutex::new(Vec::new())),
            shutdowns: Arc::new(AtomicUsize::new(0)),
            write_attempts: Arc::new(AtomicUsize::new(0)),
            connected: Arc::new(AtomicBool::new(true)),
        };
        let stream = Self {
            probe: probe.clone(),
            input: input.to_vec(),
            read_pos: 0,
            fail_after,
        };
        (stream, probe)
    }

    pub fn recording() -> (Self, Probe) {
        Self::build(b"", None)
    }

    pub fn with_input(input: &[u8]) -> (Self, Probe) {
        Self::build(input, None)
    }

    /// Every write fails with `BrokenPipe`, as after a client reset.
    pub fn failing() -> (Self, Probe) {
        Self::build(b"", Some(0))
    }

    /// Accepts `limit` bytes, then behaves like [`failing`](Self::failing).
    pub fn failing_after(limit: usize) -> (Self, Probe) {
        Self::build(b"", Some(limit))
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let remaining = &this.input[this.read_pos..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        this.read_pos += n;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.probe.write_attempts.fetch_add(1, Ordering::SeqCst);
        let mut written = this.probe.written.lock().unwrap();
        let n = match this.fail_after {
            Some(limit) if written.len() >= limit => {
                return Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
            }
            Some(limit) => buf.len().min(limit - written.len()),
            None => buf.len(),
        };
        written.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.probe.shutdowns.fetch_add(1, Ordering::SeqCst);
        if this.fail_after.is_some() {
            return Poll::Ready(Err(io::Error::from(io::ErrorKind::NotConnected)));
        }
        Poll::Ready(Ok(()))
    }
}

impl Connection for ScriptedStream {
    fn is_connected(&self) -> bool {
        self.probe.connected.load(Ordering::SeqCst)
    }
}

/// Send `request` over a fresh TCP connection and read until the server closes.
pub async fn roundtrip(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut response = Vec::new();
    // A reset after the response has been read still counts as a full response.
    let _ = stream.read_to_end(&mut response).await;
    response
}
