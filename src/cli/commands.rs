use crate::config::ServerConfig;
use crate::echo::EchoHandler;
use crate::parser::RequestParser;
use crate::server::{HttpServer, Service};
use crate::static_files::StaticFiles;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

/// Command-line interface for brrtlite
#[derive(Parser)]
#[command(name = "brrtlite")]
#[command(about = "Single-connection HTTP/1.1 server and request parser", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the echo handler, one connection at a time
    Serve {
        /// Listen address, e.g. 0.0.0.0:8080
        #[arg(long)]
        addr: Option<String>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory served by /file?name=...
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Parse a raw HTTP request stored in a file and print it as JSON
    Parse {
        /// File holding the request bytes exactly as sent on the wire
        file: PathBuf,
    },
}

pub fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { addr, config, root } => {
            let mut config = ServerConfig::load(config.as_deref())?;
            if let Some(addr) = addr {
                config.addr = addr;
            }

            let service = Service::new(EchoHandler::new(root.map(StaticFiles::new)))
                .with_hint(config.connection_hint);
            let handle = HttpServer(service)
                .start(config.addr.as_str(), config.stack_size)
                .with_context(|| format!("failed to start server on {}", config.addr))?;
            info!(addr = %handle.addr(), "listening");

            handle
                .join()
                .map_err(|e| anyhow!("server coroutine panicked: {e:?}"))
        }
        Commands::Parse { file } => {
            let report = parse_file(&file)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

/// Parse the request stored in `path`.
///
/// Fails if the bytes end before the request is complete.
pub fn parse_file(path: &Path) -> Result<Value> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let mut parser = RequestParser::new();
    let consumed = parser.feed(&bytes);
    let state = parser.state();
    let content_length = parser.content_length();

    let Some(request) = parser.finish() else {
        bail!(
            "request incomplete after {} bytes (parser stopped in {:?} state)",
            consumed,
            state
        );
    };

    Ok(json!({
        "request": request,
        "content_length": content_length,
        "consumed": consumed,
        "trailing": bytes.len() - consumed,
    }))
}
