//! # CLI Module
//!
//! Command-line front end for the `brrtlite` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Run the demo echo handler on a TCP port:
//!
//! ```bash
//! brrtlite serve --addr 127.0.0.1:8080 --root ./public
//! ```
//!
//! Options:
//! - `--addr <ADDR>` - Listen address (overrides config file and `BRRTLITE_ADDR`)
//! - `--config <FILE>` - TOML config file
//! - `--root <DIR>` - Directory served by `/file?name=...`
//!
//! ### `parse`
//!
//! Feed a raw request captured to a file through the parser and print the
//! result as JSON:
//!
//! ```bash
//! printf 'GET /a?x=1 HTTP/1.1\r\n\r\n' > req.txt
//! brrtlite parse req.txt
//! ```
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use brrtlite::cli::{run_cli, Cli};
//! use clap::Parser;
//!
//! run_cli(Cli::parse())?;
//! ```

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{parse_file, run_cli, Cli, Commands};
