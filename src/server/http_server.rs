use super::service::{Server, Service};
use crate::connection::{Listener, TcpListener};
use may::coroutine::JoinHandle;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

/// Hosts a [`Service`] behind a TCP listener inside a `may` coroutine.
///
/// Connections are served strictly one after another: the coroutine accepts,
/// parses, dispatches and closes before it looks at the listener again.
pub struct HttpServer(pub Service);

/// Handle to a running HTTP server
///
/// Provides methods for waiting until the server is ready, stopping it,
/// or joining the server coroutine.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server to be ready to accept connections
    ///
    /// Polls the server address by attempting TCP connections until successful.
    /// The probe connection closes without sending anything, so the server logs
    /// it as an aborted request.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` error if the server doesn't become ready within ~250ms (50 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting and wait for the loop to exit.
    ///
    /// A connection that is mid-parse is served to completion first; a peer
    /// that never finishes its request keeps the loop alive until it hangs up.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::Release);
        if self.handle.join().is_err() {
            tracing::warn!(addr = %self.addr, "server coroutine panicked");
        }
    }

    /// Wait for the server coroutine to complete
    ///
    /// Blocks until the accept loop finishes, which only happens after
    /// [`ServerHandle::stop`] is requested from elsewhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the server coroutine panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl HttpServer {
    /// Start the HTTP server on the given address
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to bind to (e.g., `"0.0.0.0:8080"` or `"127.0.0.1:0"`)
    /// * `stack_size` - Stack size of the serving coroutine, in bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the port cannot be bound or
    /// the coroutine cannot be spawned.
    pub fn start<A: ToSocketAddrs>(self, addr: A, stack_size: usize) -> io::Result<ServerHandle> {
        let listener = TcpListener::bind(addr)?;
        let addr = listener.local_addr()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let mut server = Server::new(listener, self.0);

        info!(%addr, stack_size, "starting http server");

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure owns everything it touches (listener, service, shutdown flag),
        // and the service never blocks the worker thread: reads and accepts are
        // non-blocking and idle polls yield to the scheduler.
        let handle = unsafe {
            may::coroutine::Builder::new()
                .name(format!("brrtlite-{addr}"))
                .stack_size(stack_size)
                .spawn(move || server.run(&flag))?
        };

        Ok(ServerHandle {
            addr,
            shutdown,
            handle,
        })
    }
}
