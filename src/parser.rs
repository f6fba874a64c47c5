//! # Parser Module
//!
//! A byte-at-a-time HTTP/1.1 request parser.
//!
//! ## Overview
//!
//! [`RequestParser`] is a push-based finite state machine. Bytes go in one at
//! a time through [`RequestParser::push`] (or a slice at a time through
//! [`RequestParser::feed`]) and the parser moves through its phases:
//!
//! ```text
//! Method -> Path -> [QueryString] -> Version -> EmptyLine
//!                                                 |  ^
//!                                                 v  |
//!                                  HeaderName -> HeaderValue
//! EmptyLine --(blank line)--> [Body] -> Finished
//! ```
//!
//! Transitions only move forward, except for the header loop between
//! `EmptyLine`, `HeaderName` and `HeaderValue`.
//!
//! ## What is kept
//!
//! - method, path and raw query string, in that order
//! - the `Content-Length` value (header name compared case-insensitively)
//! - exactly `Content-Length` body bytes
//!
//! The HTTP version token and every other header are scanned and thrown away.
//!
//! ## Degrading instead of failing
//!
//! The parser has no error state. A `Content-Length` that does not start with
//! a decimal digit counts as zero, so the blank line ends the request. There
//! is no size limit on any field and no timeout; a peer that stops sending
//! keeps the parser waiting until the connection drops.
//!
//! ## Driving it from a connection
//!
//! [`read_request`] is the cooperative poll loop: while the connection stays
//! up it drains whatever bytes are available into the parser and yields when
//! none are. A connection that drops before [`ParseState::Finished`] yields no
//! request at all.

use crate::connection::{yield_now, Connection};
use crate::query::QueryString;
use crate::server::Request;
use serde::Serialize;
use tracing::{debug, trace};

/// Parsing phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ParseState {
    #[default]
    Method,
    Path,
    QueryString,
    Version,
    HeaderName,
    HeaderValue,
    EmptyLine,
    Body,
    Finished,
}

/// Incremental request parser. One instance per request.
#[derive(Debug, Default)]
pub struct RequestParser {
    state: ParseState,
    method: Vec<u8>,
    path: Vec<u8>,
    query: Vec<u8>,
    header_name: Vec<u8>,
    header_value: Vec<u8>,
    content_length: usize,
    remaining: usize,
    body: Vec<u8>,
    consumed: usize,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == ParseState::Finished
    }

    /// Body length declared by the last `Content-Length` header seen so far.
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Body bytes still expected.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Total bytes accepted so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Feed one byte and return the state after it.
    ///
    /// Once [`ParseState::Finished`] is reached further bytes are ignored.
    pub fn push(&mut self, byte: u8) -> ParseState {
        if self.state == ParseState::Finished {
            return ParseState::Finished;
        }
        self.consumed += 1;

        let next = match self.state {
            ParseState::Method => match byte {
                b' ' => ParseState::Path,
                b => {
                    self.method.push(b);
                    ParseState::Method
                }
            },
            ParseState::Path => match byte {
                b' ' => ParseState::Version,
                b'?' => ParseState::QueryString,
                b => {
                    self.path.push(b);
                    ParseState::Path
                }
            },
            ParseState::QueryString => match byte {
                b' ' => ParseState::Version,
                b => {
                    self.query.push(b);
                    ParseState::QueryString
                }
            },
            ParseState::Version => match byte {
                b'\n' => ParseState::EmptyLine,
                _ => ParseState::Version,
            },
            ParseState::EmptyLine => match byte {
                b'\r' => ParseState::EmptyLine,
                b'\n' if self.remaining == 0 => ParseState::Finished,
                b'\n' => ParseState::Body,
                b => {
                    self.header_name.clear();
                    self.header_value.clear();
                    self.header_name.push(b);
                    ParseState::HeaderName
                }
            },
            ParseState::HeaderName => match byte {
                b' ' => ParseState::HeaderName,
                b':' => ParseState::HeaderValue,
                b => {
                    self.header_name.push(b);
                    ParseState::HeaderName
                }
            },
            ParseState::HeaderValue => match byte {
                b'\r' | b' ' => ParseState::HeaderValue,
                b'\n' => {
                    self.end_header();
                    ParseState::EmptyLine
                }
                b => {
                    self.header_value.push(b);
                    ParseState::HeaderValue
                }
            },
            ParseState::Body => {
                self.body.push(byte);
                self.remaining -= 1;
                if self.remaining == 0 {
                    ParseState::Finished
                } else {
                    ParseState::Body
                }
            }
            ParseState::Finished => ParseState::Finished,
        };

        if next != self.state {
            trace!(from = ?self.state, to = ?next, consumed = self.consumed, "parse state transition");
            self.state = next;
        }
        next
    }

    /// Feed a slice, stopping as soon as the request is complete.
    ///
    /// Returns how many bytes were consumed; anything after the end of the
    /// request is left to the caller.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        for (i, &b) in bytes.iter().enumerate() {
            if self.is_finished() {
                return i;
            }
            self.push(b);
        }
        bytes.len()
    }

    /// The completed request, or `None` if the parser has not finished.
    pub fn finish(self) -> Option<Request> {
        if !self.is_finished() {
            return None;
        }
        Some(Request {
            method: lossy(self.method),
            path: lossy(self.path),
            query: QueryString::new(lossy(self.query)),
            body: self.body,
            peer: None,
        })
    }

    fn end_header(&mut self) {
        if self.header_name.eq_ignore_ascii_case(b"Content-Length") {
            let value = String::from_utf8_lossy(&self.header_value);
            self.content_length = parse_content_length(&value);
            self.remaining = self.content_length;
            trace!(raw = %value, content_length = self.content_length, "content length declared");
        }
    }
}

fn lossy(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Interpret a `Content-Length` value.
///
/// Takes the leading run of decimal digits (after an optional `+`), so
/// `"12abc"` is 12. Anything without leading digits, a negative number or a
/// value that overflows `usize` is 0.
pub fn parse_content_length(value: &str) -> usize {
    let digits = value.strip_prefix('+').unwrap_or(value);
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().unwrap_or(0)
}

/// Read one request from `conn`.
///
/// Polls the connection until the parser finishes, yielding whenever no byte
/// is ready. Returns `None` if the connection drops first; partial requests
/// are discarded.
pub fn read_request<C: Connection + ?Sized>(conn: &mut C) -> Option<Request> {
    let mut parser = RequestParser::new();
    while !parser.is_finished() {
        if !conn.is_connected() {
            debug!(
                state = ?parser.state(),
                consumed = parser.consumed(),
                "connection lost before request completed"
            );
            return None;
        }
        if conn.available() == 0 {
            yield_now();
            continue;
        }
        while !parser.is_finished() {
            match conn.read_byte() {
                Some(b) => {
                    parser.push(b);
                }
                None => break,
            }
        }
    }
    let peer = conn.peer_addr();
    parser.finish().map(|req| req.with_peer(peer))
}
