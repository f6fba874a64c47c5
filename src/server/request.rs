use crate::query::QueryString;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::net::SocketAddr;

/// A fully parsed request, handed to the handler once the parser reaches
/// its terminal state.
///
/// Only the request line, the declared `Content-Length` and the body survive
/// parsing. Every other header is scanned and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Request {
    /// Request method token, unvalidated (`GET`, `POST`, `BREW`, ...)
    pub method: String,
    /// Path as sent, not percent-decoded, without the query string
    pub path: String,
    /// Raw query string, everything between `?` and the next space
    pub query: QueryString,
    /// Exactly `Content-Length` bytes, or empty
    #[serde(serialize_with = "serialize_body")]
    pub body: Vec<u8>,
    /// Remote address of the connection the request arrived on
    pub peer: Option<SocketAddr>,
}

fn serialize_body<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(body))
}

impl Request {
    /// Decoded value of query parameter `name`, or `""` when absent.
    pub fn param(&self, name: &str) -> String {
        self.query.value(name)
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    #[must_use]
    pub fn with_peer(mut self, peer: Option<SocketAddr>) -> Self {
        self.peer = peer;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_delegates_to_query() {
        let req = Request {
            query: QueryString::new("q=a%20b"),
            ..Default::default()
        };
        assert_eq!(req.param("q"), "a b");
        assert_eq!(req.param("missing"), "");
    }

    #[test]
    fn test_serializes_body_as_text() {
        let req = Request {
            method: "POST".into(),
            path: "/echo".into(),
            query: QueryString::new("x=1"),
            body: b"hello".to_vec(),
            peer: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "method": "POST",
                "path": "/echo",
                "query": "x=1",
                "body": "hello",
                "peer": null,
            })
        );
    }
}
