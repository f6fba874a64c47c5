#![allow(dead_code)]

pub mod test_server {
    use brrtlite::server::{HttpServer, ServerHandle, Service};
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    /// Start `service` on an ephemeral loopback port and wait until it accepts.
    pub fn start(service: Service) -> ServerHandle {
        setup_may_runtime();
        let handle = HttpServer(service).start("127.0.0.1:0", 0x8000).unwrap();
        handle.wait_ready().unwrap();
        handle
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    /// Write `raw` to the server and read until it closes the connection.
    pub fn send_raw(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream.write_all(raw).unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Split a response into its head and body.
    pub fn split(resp: &str) -> (&str, &str) {
        resp.split_once("\r\n\r\n").unwrap_or((resp, ""))
    }
}
