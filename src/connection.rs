//! # Connection Module
//!
//! The transport seam between the request parser, the response writer and
//! whatever carries the bytes.
//!
//! ## Overview
//!
//! Parsing and writing never touch sockets directly. They talk to a
//! [`Connection`], a small capability trait that mirrors what a cooperative,
//! single-connection server needs:
//!
//! - "is the peer still there" ([`Connection::is_connected`])
//! - "is a byte ready right now" ([`Connection::available`])
//! - "give me one byte" ([`Connection::read_byte`])
//! - write / flush / close
//!
//! New connections come from a [`Listener`], whose `accept` never blocks.
//!
//! ## Implementations
//!
//! - [`TcpConnection`] / [`TcpListener`] - non-blocking `std::net` sockets
//! - [`MemoryConnection`] - scripted input and captured output, for driving
//!   the parser and response writer without a socket
//!
//! Reads never block. When nothing is buffered the caller is expected to yield
//! (see [`yield_now`]) and poll again.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use tracing::{debug, trace};

/// Bytes pulled from the socket per non-blocking read.
const READ_CHUNK: usize = 1024;

/// A single, already-accepted byte stream.
pub trait Connection {
    /// `true` while the peer is connected or unread bytes remain buffered.
    ///
    /// A peer that half-closes its side (sends its request, then shuts down
    /// writing) is reported as disconnected as soon as those bytes have been
    /// read, even though it could still receive a response. Responses to such
    /// a peer fail with [`SendError::Disconnected`](crate::server::SendError).
    fn is_connected(&mut self) -> bool;

    /// Number of bytes that can be read right now without blocking.
    fn available(&mut self) -> usize;

    /// Read one byte if one is ready.
    fn read_byte(&mut self) -> Option<u8>;

    /// Write all of `bytes`.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Block until everything written so far has been handed to the transport.
    fn flush(&mut self) -> io::Result<()>;

    /// Close the connection. Idempotent.
    fn close(&mut self);

    /// Remote address, when the transport has one.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// A source of new connections.
pub trait Listener {
    type Conn: Connection;

    /// Accept a connection if one is waiting. Returns `Ok(None)` otherwise.
    fn accept(&mut self) -> io::Result<Option<Self::Conn>>;

    /// Address the listener is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Give up the current time slice.
///
/// Inside a `may` coroutine this yields to the coroutine scheduler; on a plain
/// thread it yields to the OS scheduler.
pub fn yield_now() {
    if may::coroutine::is_coroutine() {
        may::coroutine::yield_now();
    } else {
        std::thread::yield_now();
    }
}

/// Non-blocking TCP connection with an internal read buffer.
///
/// End of stream is only reported as "disconnected" once every buffered byte
/// has been consumed.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    peer: Option<SocketAddr>,
    buf: VecDeque<u8>,
    eof: bool,
    closed: bool,
}

impl TcpConnection {
    /// Wrap an accepted stream, switching it to non-blocking mode.
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        let peer = stream.peer_addr().ok();
        Ok(Self {
            stream,
            peer,
            buf: VecDeque::with_capacity(READ_CHUNK),
            eof: false,
            closed: false,
        })
    }

    fn fill(&mut self) {
        if self.eof || self.closed || !self.buf.is_empty() {
            return;
        }
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    trace!(peer = ?self.peer, "peer closed its side");
                    self.eof = true;
                    return;
                }
                Ok(n) => {
                    self.buf.extend(&chunk[..n]);
                    return;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(peer = ?self.peer, error = %e, "read failed, treating as disconnect");
                    self.eof = true;
                    return;
                }
            }
        }
    }
}

impl Connection for TcpConnection {
    /// End of stream on the read side counts as a disconnect once the buffer
    /// is drained; a half-closed peer is not distinguished from a gone one.
    fn is_connected(&mut self) -> bool {
        self.fill();
        !self.closed && (!self.buf.is_empty() || !self.eof)
    }

    fn available(&mut self) -> usize {
        self.fill();
        self.buf.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.fill();
        self.buf.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection closed",
            ));
        }
        let mut rest = bytes;
        while !rest.is_empty() {
            match self.stream.write(rest) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => rest = &rest[n..],
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => yield_now(),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        loop {
            match self.stream.flush() {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => yield_now(),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.buf.clear();
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            trace!(peer = ?self.peer, error = %e, "shutdown after close");
        }
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

/// Non-blocking TCP listener producing [`TcpConnection`]s.
#[derive(Debug)]
pub struct TcpListener {
    inner: std::net::TcpListener,
}

impl TcpListener {
    /// Bind to `addr` in non-blocking mode.
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        Self::from_std(std::net::TcpListener::bind(addr)?)
    }

    /// Adopt an already-bound standard listener.
    pub fn from_std(inner: std::net::TcpListener) -> io::Result<Self> {
        inner.set_nonblocking(true)?;
        Ok(Self { inner })
    }
}

impl Listener for TcpListener {
    type Conn = TcpConnection;

    fn accept(&mut self) -> io::Result<Option<TcpConnection>> {
        match self.inner.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "accepted connection");
                TcpConnection::new(stream).map(Some)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

/// In-memory connection: scripted input, captured output.
///
/// Stays connected after its input is drained unless built with
/// [`MemoryConnection::hang_up_when_drained`], in which case it behaves like a
/// peer that sent its bytes and went away.
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    input: VecDeque<u8>,
    output: Vec<u8>,
    connected: bool,
    hang_up_when_drained: bool,
    flushes: usize,
    peer: Option<SocketAddr>,
}

impl MemoryConnection {
    pub fn new(input: impl AsRef<[u8]>) -> Self {
        Self {
            input: input.as_ref().iter().copied().collect(),
            output: Vec::new(),
            connected: true,
            hang_up_when_drained: false,
            flushes: 0,
            peer: None,
        }
    }

    /// A connection that is already closed.
    pub fn closed() -> Self {
        let mut conn = Self::new(b"");
        conn.connected = false;
        conn
    }

    /// Report "disconnected" as soon as the scripted input runs out.
    #[must_use]
    pub fn hang_up_when_drained(mut self) -> Self {
        self.hang_up_when_drained = true;
        self
    }

    #[must_use]
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Append more input, as if the peer sent another segment.
    pub fn push_input(&mut self, bytes: impl AsRef<[u8]>) {
        self.input.extend(bytes.as_ref());
    }

    /// Bytes the peer has sent that nobody has read yet.
    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }

    /// Everything written to the connection so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output decoded as UTF-8, lossily.
    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl Connection for MemoryConnection {
    fn is_connected(&mut self) -> bool {
        self.connected && !(self.hang_up_when_drained && self.input.is_empty())
    }

    fn available(&mut self) -> usize {
        if self.connected {
            self.input.len()
        } else {
            0
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.connected {
            self.input.pop_front()
        } else {
            None
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.connected {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection closed",
            ));
        }
        self.output.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.connected = false;
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}
