//! # Response Module
//!
//! Writes HTTP/1.1 responses straight onto a [`Connection`].
//!
//! Nothing is retained between calls: each operation serializes the status
//! line, its headers, a blank line and the body in one synchronous pass and
//! flushes before returning.
//!
//! ## Operations
//!
//! - [`Response::send`] - in-memory body, any status
//! - [`Response::ok`], [`Response::text`], [`Response::html`] - `200 OK` shortcuts
//! - [`Response::send_stream`] - copy a [`ByteSource`] through a
//!   [`STREAM_BLOCK_SIZE`] buffer, `Content-Length` taken from what the source
//!   reports up front
//! - [`Response::redirect`] - `303 See Other` with a `Location` header
//!
//! Every operation checks that the connection is still open first. If it is
//! not, [`SendError::Disconnected`] is returned and nothing is written.
//!
//! Calling an operation twice writes two responses back to back. Sending
//! exactly one is the handler's job.
//!
//! ## Wire format
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: text/plain\r\n
//! Content-Length: 2\r\n
//! \r\n
//! ok
//! ```

use crate::connection::Connection;
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::str::FromStr;
use tracing::{debug, warn};

/// Size of the intermediate buffer used by [`Response::send_stream`].
pub const STREAM_BLOCK_SIZE: usize = 512;

/// Reason phrase for `status`.
///
/// Codes without a registered phrase get a generic one for their class.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        413 => "Content Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        418 => "I'm a teapot",
        422 => "Unprocessable Content",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        100..=199 => "Informational",
        200..=299 => "Success",
        300..=399 => "Redirection",
        400..=499 => "Client Error",
        500..=599 => "Server Error",
        _ => "Unknown",
    }
}

/// Why a response could not be written.
#[derive(Debug)]
pub enum SendError {
    /// The connection was already closed; nothing was written.
    Disconnected,
    /// Writing or flushing failed part-way through.
    Io(io::Error),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Disconnected => write!(f, "connection is not open"),
            SendError::Io(e) => write!(f, "failed to write response: {e}"),
        }
    }
}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SendError::Disconnected => None,
            SendError::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for SendError {
    fn from(e: io::Error) -> Self {
        SendError::Io(e)
    }
}

/// Optional header telling the client the connection will not be reused.
///
/// Only emitted on buffered and streamed sends, never on redirects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionHint {
    /// No extra header.
    #[default]
    None,
    /// `Connection: close`
    Close,
    /// `Keep-Alive: timeout=1, max=1`, nudging the client to close first.
    #[serde(rename = "keep-alive")]
    KeepAliveOnce,
}

impl ConnectionHint {
    pub fn header(self) -> Option<&'static str> {
        match self {
            ConnectionHint::None => None,
            ConnectionHint::Close => Some("Connection: close"),
            ConnectionHint::KeepAliveOnce => Some("Keep-Alive: timeout=1, max=1"),
        }
    }
}

impl FromStr for ConnectionHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(ConnectionHint::None),
            "close" => Ok(ConnectionHint::Close),
            "keep-alive" | "keep_alive" | "keepalive" => Ok(ConnectionHint::KeepAliveOnce),
            other => Err(format!("unknown connection hint '{other}'")),
        }
    }
}

/// A readable body source that knows how many bytes it can hand out now.
pub trait ByteSource: Read {
    /// Bytes currently available. Read once, before the headers are written.
    fn available(&mut self) -> usize;
}

impl ByteSource for &[u8] {
    fn available(&mut self) -> usize {
        self.len()
    }
}

impl<T: AsRef<[u8]>> ByteSource for io::Cursor<T> {
    fn available(&mut self) -> usize {
        let len = self.get_ref().as_ref().len() as u64;
        len.saturating_sub(self.position()) as usize
    }
}

impl ByteSource for File {
    fn available(&mut self) -> usize {
        let len = self.metadata().map(|m| m.len()).unwrap_or(0);
        let pos = self.stream_position().unwrap_or(0);
        len.saturating_sub(pos) as usize
    }
}

/// Response writer bound to one connection.
pub struct Response<'c> {
    conn: &'c mut dyn Connection,
    hint: ConnectionHint,
}

impl<'c> Response<'c> {
    pub fn new(conn: &'c mut dyn Connection) -> Self {
        Self {
            conn,
            hint: ConnectionHint::None,
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: ConnectionHint) -> Self {
        self.hint = hint;
        self
    }

    /// `true` while the underlying connection is open.
    pub fn is_connected(&mut self) -> bool {
        self.conn.is_connected()
    }

    /// Write a complete response with an in-memory body.
    pub fn send(
        &mut self,
        body: impl AsRef<[u8]>,
        content_type: &str,
        status: u16,
        status_text: &str,
    ) -> Result<(), SendError> {
        self.ensure_connected()?;
        let body = body.as_ref();
        let head = self.head(status, status_text, content_type, body.len());
        self.conn.write(head.as_bytes())?;
        self.conn.write(body)?;
        self.conn.flush()?;
        debug!(status, content_type, content_length = body.len(), "response sent");
        Ok(())
    }

    /// [`send`](Self::send) with `200 OK`.
    pub fn ok(&mut self, body: impl AsRef<[u8]>, content_type: &str) -> Result<(), SendError> {
        self.send(body, content_type, 200, "OK")
    }

    /// [`send`](Self::send) with the standard reason phrase for `status`.
    pub fn status(
        &mut self,
        status: u16,
        body: impl AsRef<[u8]>,
        content_type: &str,
    ) -> Result<(), SendError> {
        self.send(body, content_type, status, reason_phrase(status))
    }

    pub fn text(&mut self, body: impl AsRef<[u8]>) -> Result<(), SendError> {
        self.ok(body, "text/plain")
    }

    pub fn html(&mut self, body: impl AsRef<[u8]>) -> Result<(), SendError> {
        self.ok(body, "text/html")
    }

    /// Stream `source` as a `200 OK` body.
    ///
    /// `Content-Length` is whatever `source` reports as available before any
    /// byte is copied. The copy then runs until the source is exhausted.
    pub fn send_stream<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        content_type: &str,
    ) -> Result<(), SendError> {
        self.ensure_connected()?;
        let declared = source.available();
        let head = self.head(200, "OK", content_type, declared);
        self.conn.write(head.as_bytes())?;

        let mut block = [0u8; STREAM_BLOCK_SIZE];
        let mut copied = 0usize;
        loop {
            let n = match source.read(&mut block) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.conn.write(&block[..n])?;
            copied += n;
        }
        self.conn.flush()?;

        if copied != declared {
            warn!(declared, copied, "streamed body length differs from Content-Length");
        }
        debug!(content_type, content_length = declared, "stream sent");
        Ok(())
    }

    /// `303 See Other` to `dest`, no body.
    pub fn redirect(&mut self, dest: &str) -> Result<(), SendError> {
        self.ensure_connected()?;
        let head = format!("HTTP/1.1 303 See Other\r\nLocation: {dest}\r\n\r\n");
        self.conn.write(head.as_bytes())?;
        self.conn.flush()?;
        debug!(location = dest, "redirect sent");
        Ok(())
    }

    fn ensure_connected(&mut self) -> Result<(), SendError> {
        if self.conn.is_connected() {
            Ok(())
        } else {
            debug!("response dropped, connection is not open");
            Err(SendError::Disconnected)
        }
    }

    fn head(&self, status: u16, status_text: &str, content_type: &str, len: usize) -> String {
        let mut head = format!(
            "HTTP/1.1 {status} {status_text}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\n"
        );
        if let Some(line) = self.hint.header() {
            head.push_str(line);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        head
    }
}
