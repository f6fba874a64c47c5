use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Files under a base directory, opened for streaming.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base_dir: base.into() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve `url_path` below the base directory. `..`, absolute paths and
    /// prefixes are rejected.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    pub fn content_type(path: &Path) -> &'static str {
        match path.extension().and_then(|s| s.to_str()).unwrap_or("").to_lowercase().as_str() {
            "html" | "htm" => "text/html",
            "css" => "text/css",
            "js" => "application/javascript",
            "json" => "application/json",
            "txt" => "text/plain",
            "png" => "image/png",
            _ => "application/octet-stream",
        }
    }

    /// Open a file for [`Response::send_stream`](crate::server::Response::send_stream).
    pub fn open(&self, url_path: &str) -> io::Result<(File, &'static str)> {
        let path = self
            .map_path(url_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "invalid path"))?;
        if !path.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        }
        let file = File::open(&path)?;
        Ok((file, Self::content_type(&path)))
    }
}
