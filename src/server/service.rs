use super::request::Request;
use super::response::{ConnectionHint, Response};
use crate::connection::{yield_now, Connection, Listener};
use crate::parser::read_request;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Application callback, invoked once per fully parsed request.
///
/// The handler owns the response: it decides what to send and whether to
/// send at all. The connection is closed after it returns.
pub trait Handler {
    fn handle(&mut self, req: &Request, res: &mut Response<'_>);
}

impl<F> Handler for F
where
    F: FnMut(&Request, &mut Response<'_>),
{
    fn handle(&mut self, req: &Request, res: &mut Response<'_>) {
        self(req, res)
    }
}

/// How a single connection cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A request was parsed and the handler ran.
    Handled,
    /// A request was parsed but no handler is configured.
    Unhandled,
    /// The handler panicked; the connection was closed anyway.
    Panicked,
    /// The connection dropped before the request was complete.
    Aborted,
}

/// Parse-then-handle-then-close for one connection at a time.
pub struct Service {
    handler: Option<Box<dyn Handler + Send>>,
    hint: ConnectionHint,
}

impl Service {
    /// A service dispatching to `handler`.
    pub fn new<H: Handler + Send + 'static>(handler: H) -> Self {
        Self {
            handler: Some(Box::new(handler)),
            hint: ConnectionHint::None,
        }
    }

    /// Same as [`Service::new`], with closure signature inference.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnMut(&Request, &mut Response<'_>) + Send + 'static,
    {
        Self::new(f)
    }

    /// A service with no handler: requests are parsed and dropped.
    pub fn unconfigured() -> Self {
        Self {
            handler: None,
            hint: ConnectionHint::None,
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: ConnectionHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Run one full cycle on `conn` and close it.
    pub fn serve_connection(&mut self, conn: &mut dyn Connection) -> Outcome {
        let started = Instant::now();
        let outcome = match read_request(conn) {
            None => {
                warn!(peer = ?conn.peer_addr(), "request aborted, connection dropped mid-parse");
                Outcome::Aborted
            }
            Some(req) => self.dispatch(&req, conn, started),
        };
        conn.close();
        outcome
    }

    fn dispatch(&mut self, req: &Request, conn: &mut dyn Connection, started: Instant) -> Outcome {
        let Some(handler) = self.handler.as_mut() else {
            debug!(method = %req.method, path = %req.path, "no handler configured, request dropped");
            return Outcome::Unhandled;
        };

        let mut res = Response::new(conn).with_hint(self.hint);
        let result = catch_unwind(AssertUnwindSafe(|| handler.handle(req, &mut res)));
        let elapsed_us = started.elapsed().as_micros() as u64;

        match result {
            Ok(()) => {
                info!(
                    method = %req.method,
                    path = %req.path,
                    query = %req.query,
                    body_bytes = req.body.len(),
                    peer = ?req.peer,
                    elapsed_us,
                    "request handled"
                );
                Outcome::Handled
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(
                    method = %req.method,
                    path = %req.path,
                    panic = %message,
                    elapsed_us,
                    "handler panicked"
                );
                Outcome::Panicked
            }
        }
    }
}

/// Accept loop around a [`Service`].
pub struct Server<L: Listener> {
    listener: L,
    service: Service,
    accepted: u64,
}

impl<L: Listener> Server<L> {
    pub fn new(listener: L, service: Service) -> Self {
        Self {
            listener,
            service,
            accepted: 0,
        }
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Serve at most one waiting connection.
    ///
    /// Returns `Ok(None)` when nobody is waiting.
    pub fn poll(&mut self) -> io::Result<Option<Outcome>> {
        let Some(mut conn) = self.listener.accept()? else {
            return Ok(None);
        };
        self.accepted += 1;
        debug!(connection = self.accepted, peer = ?conn.peer_addr(), "serving connection");
        Ok(Some(self.service.serve_connection(&mut conn)))
    }

    /// Poll until `shutdown` is set, yielding between idle polls.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!(addr = ?self.listener.local_addr().ok(), "accept loop started");
        while !shutdown.load(Ordering::Acquire) {
            match self.poll() {
                Ok(Some(_)) => {}
                Ok(None) => yield_now(),
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    yield_now();
                }
            }
        }
        info!(accepted = self.accepted, "accept loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemoryConnection;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_handler_sees_request_and_connection_is_closed() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let mut service = Service::from_fn(move |req, res| {
            *sink.lock().unwrap() = Some(req.clone());
            res.text("hi").unwrap();
        });

        let mut conn = MemoryConnection::new(b"GET /x?a=1 HTTP/1.1\r\n\r\n");
        assert_eq!(service.serve_connection(&mut conn), Outcome::Handled);
        assert!(!conn.is_connected());
        assert!(conn.output_str().ends_with("\r\n\r\nhi"));

        let req = seen.lock().unwrap().clone().unwrap();
        assert_eq!(req.path, "/x");
        assert_eq!(req.param("a"), "1");
    }

    #[test]
    fn test_unconfigured_service_drops_request() {
        let mut service = Service::unconfigured();
        assert!(!service.has_handler());
        let mut conn = MemoryConnection::new(b"GET / HTTP/1.1\r\n\r\n");
        assert_eq!(service.serve_connection(&mut conn), Outcome::Unhandled);
        assert!(conn.output().is_empty());
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_handler_not_called_when_connection_drops() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let mut service = Service::from_fn(move |_req, _res| {
            *counter.lock().unwrap() += 1;
        });
        let mut conn = MemoryConnection::new(b"GET / HTTP/1.1\r\nHost: x\r\n").hang_up_when_drained();
        assert_eq!(service.serve_connection(&mut conn), Outcome::Aborted);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_handler_panic_is_contained() {
        let mut service = Service::from_fn(|_req, _res| panic!("boom"));
        let mut conn = MemoryConnection::new(b"GET / HTTP/1.1\r\n\r\n");
        assert_eq!(service.serve_connection(&mut conn), Outcome::Panicked);
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_hint_reaches_response() {
        let mut service =
            Service::from_fn(|_req, res| res.text("ok").unwrap()).with_hint(ConnectionHint::Close);
        let mut conn = MemoryConnection::new(b"GET / HTTP/1.1\r\n\r\n");
        service.serve_connection(&mut conn);
        assert!(conn.output_str().contains("Connection: close\r\n"));
    }

    #[test]
    fn test_half_closed_peer_gets_disconnected_response() {
        let result = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&result);
        let mut service = Service::from_fn(move |_req, res| {
            *sink.lock().unwrap() = Some(res.text("late"));
        });
        let mut conn = MemoryConnection::new(b"GET / HTTP/1.1\r\n\r\n").hang_up_when_drained();

        assert_eq!(service.serve_connection(&mut conn), Outcome::Handled);
        let result = result.lock().unwrap().take().unwrap();
        assert!(matches!(result, Err(crate::server::SendError::Disconnected)));
        assert!(conn.output().is_empty());
    }

    struct QueueListener {
        pending: VecDeque<MemoryConnection>,
    }

    impl Listener for QueueListener {
        type Conn = MemoryConnection;

        fn accept(&mut self) -> io::Result<Option<MemoryConnection>> {
            Ok(self.pending.pop_front())
        }

        fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
            Ok(std::net::SocketAddr::from(([127, 0, 0, 1], 0)))
        }
    }

    #[test]
    fn test_poll_serves_one_connection_at_a_time() {
        let listener = QueueListener {
            pending: VecDeque::from(vec![
                MemoryConnection::new(b"GET /a HTTP/1.1\r\n\r\n"),
                MemoryConnection::new(b"GET /b HTTP/1.1\r\nHo").hang_up_when_drained(),
            ]),
        };
        let mut server = Server::new(listener, Service::from_fn(|_req, res| res.text("ok").unwrap()));

        assert_eq!(server.poll().unwrap(), Some(Outcome::Handled));
        assert_eq!(server.accepted(), 1);
        assert_eq!(server.poll().unwrap(), Some(Outcome::Aborted));
        assert_eq!(server.poll().unwrap(), None);
        assert_eq!(server.accepted(), 2);
    }

    #[test]
    fn test_run_stops_when_flag_is_set() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let listener = QueueListener {
            pending: VecDeque::from(vec![
                MemoryConnection::new(b"GET /1 HTTP/1.1\r\n\r\n"),
                MemoryConnection::new(b"GET /stop HTTP/1.1\r\n\r\n"),
                MemoryConnection::new(b"GET /never HTTP/1.1\r\n\r\n"),
            ]),
        };
        let mut server = Server::new(
            listener,
            Service::from_fn(move |req, _res| {
                if req.path == "/stop" {
                    flag.store(true, Ordering::Release);
                }
            }),
        );

        server.run(&shutdown);
        assert_eq!(server.accepted(), 2);
    }
}
