//! # brrtlite
//!
//! **brrtlite** is a deliberately small HTTP/1.1 server core: a byte-at-a-time
//! request parser, a response writer and a driver that serves exactly one
//! request per connection, one connection at a time, inside a `may` coroutine.
//!
//! ## Overview
//!
//! - **[`parser`]** - push-based finite state machine that turns bytes into a
//!   [`Request`] (method, path, raw query string, `Content-Length` body)
//! - **[`query`]** - lazy query-string accessor with a fixed escape table
//! - **[`server`]** - [`Response`] writer, [`Handler`] trait, [`Service`] and
//!   the coroutine-hosted [`HttpServer`]
//! - **[`connection`]** - the transport seam: [`Connection`] / [`Listener`]
//!   traits with TCP and in-memory implementations
//! - **[`config`]**, **[`logging`]**, **[`cli`]** - the `brrtlite` binary
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as Server<br/>(accept loop)
//!     participant Parser as RequestParser
//!     participant Handler
//!     participant Response
//!
//!     Client->>Server: connect
//!     Server->>Server: accept (non-blocking)
//!     loop until Finished or disconnected
//!         Server->>Parser: push(byte)
//!     end
//!     alt connection dropped
//!         Server->>Client: close (handler not called)
//!     else request complete
//!         Server->>Handler: handle(&Request, &mut Response)
//!         Handler->>Response: send / send_stream / redirect
//!         Response->>Client: status line, headers, body
//!         Server->>Client: close
//!     end
//! ```
//!
//! ## What it does not do
//!
//! No chunked transfer encoding, no pipelining or keep-alive reuse, no header
//! map, no form-body decoding and no concurrent connections. Only
//! `Content-Length` is read from the headers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use brrtlite::server::{HttpServer, Request, Response, Service};
//!
//! let service = Service::from_fn(|req: &Request, res: &mut Response<'_>| {
//!     let name = req.param("name");
//!     if let Err(e) = res.text(format!("hello {name}")) {
//!         eprintln!("client went away: {e}");
//!     }
//! });
//!
//! let handle = HttpServer(service).start("127.0.0.1:8080", 0x4000).unwrap();
//! handle.join().unwrap();
//! ```
//!
//! ## Parsing without a socket
//!
//! ```rust
//! use brrtlite::parser::RequestParser;
//!
//! let mut parser = RequestParser::new();
//! parser.feed(b"POST /items?id=3 HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");
//! let req = parser.finish().unwrap();
//! assert_eq!(req.method, "POST");
//! assert_eq!(req.path, "/items");
//! assert_eq!(req.param("id"), "3");
//! assert_eq!(req.body, b"hello");
//! ```
//!
//! ## Runtime Considerations
//!
//! The server runs on the `may` coroutine runtime, not tokio. The parse loop
//! never blocks: when no byte is ready it yields to the coroutine scheduler.
//! The serving coroutine's stack size is configurable via
//! `BRRTLITE_STACK_SIZE`.

pub mod cli;
pub mod config;
pub mod connection;
mod echo;
pub mod logging;
pub mod parser;
pub mod query;
pub mod server;
pub mod static_files;

pub use connection::{Connection, Listener, MemoryConnection, TcpConnection, TcpListener};
pub use parser::{read_request, ParseState, RequestParser};
pub use query::QueryString;
pub use server::{Handler, HttpServer, Outcome, Request, Response, SendError, Server, Service};
