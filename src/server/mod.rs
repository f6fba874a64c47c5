pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::Request;
pub use response::{reason_phrase, ByteSource, ConnectionHint, Response, SendError, STREAM_BLOCK_SIZE};
pub use service::{Handler, Outcome, Server, Service};
