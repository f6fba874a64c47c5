use crate::server::{Handler, Request, Response, SendError};
use crate::static_files::StaticFiles;
use serde_json::json;
use tracing::warn;

/// Demo handler used by `brrtlite serve`.
///
/// - `/redirect?to=<dest>` answers `303 See Other`
/// - `/file?name=<path>` streams a file from the static root
/// - anything else echoes the parsed request back as JSON
pub struct EchoHandler {
    files: Option<StaticFiles>,
}

impl EchoHandler {
    pub fn new(files: Option<StaticFiles>) -> Self {
        Self { files }
    }

    fn respond(&self, req: &Request, res: &mut Response<'_>) -> Result<(), SendError> {
        match req.path.as_str() {
            "/redirect" => {
                let to = req.param("to");
                if to.is_empty() {
                    res.status(400, "missing 'to' parameter", "text/plain")
                } else if to.chars().any(|c| c.is_ascii_control()) {
                    res.status(400, "invalid 'to' parameter", "text/plain")
                } else {
                    res.redirect(&to)
                }
            }
            "/file" => self.send_file(req, res),
            _ => {
                let body = json!({
                    "method": req.method,
                    "path": req.path,
                    "query": req.query,
                    "body": req.body_str(),
                    "peer": req.peer.map(|p| p.to_string()),
                });
                res.ok(body.to_string(), "application/json")
            }
        }
    }

    fn send_file(&self, req: &Request, res: &mut Response<'_>) -> Result<(), SendError> {
        let Some(files) = &self.files else {
            return res.status(404, "no static root configured", "text/plain");
        };
        match files.open(&req.param("name")) {
            Ok((mut file, content_type)) => res.send_stream(&mut file, content_type),
            Err(_) => res.status(404, "not found", "text/plain"),
        }
    }
}

impl Handler for EchoHandler {
    fn handle(&mut self, req: &Request, res: &mut Response<'_>) {
        if let Err(e) = self.respond(req, res) {
            warn!(method = %req.method, path = %req.path, error = %e, "response not delivered");
        }
    }
}
