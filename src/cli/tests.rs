//! Unit tests for CLI commands

use crate::cli::{parse_file, Cli, Commands};
use clap::Parser;

#[test]
fn test_serve_command_with_flags() {
    let cli = Cli::try_parse_from([
        "brrtlite",
        "serve",
        "--addr",
        "127.0.0.1:8080",
        "--config",
        "brrtlite.toml",
        "--root",
        "public",
    ])
    .unwrap();

    match cli.command {
        Commands::Serve { addr, config, root } => {
            assert_eq!(addr.as_deref(), Some("127.0.0.1:8080"));
            assert_eq!(config.unwrap().to_string_lossy(), "brrtlite.toml");
            assert_eq!(root.unwrap().to_string_lossy(), "public");
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_serve_defaults() {
    let cli = Cli::try_parse_from(["brrtlite", "serve"]).unwrap();
    match cli.command {
        Commands::Serve { addr, config, root } => {
            assert!(addr.is_none());
            assert!(config.is_none());
            assert!(root.is_none());
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_parse_requires_file() {
    assert!(Cli::try_parse_from(["brrtlite", "parse"]).is_err());
    assert!(Cli::try_parse_from(["brrtlite", "parse", "req.txt"]).is_ok());
}

#[test]
fn test_parse_file_reports_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("req.txt");
    std::fs::write(&path, b"POST /a?x=1 HTTP/1.1\r\nContent-Length: 2\r\n\r\nhiEXTRA").unwrap();

    let report = parse_file(&path).unwrap();
    assert_eq!(report["request"]["method"], "POST");
    assert_eq!(report["request"]["path"], "/a");
    assert_eq!(report["request"]["query"], "x=1");
    assert_eq!(report["request"]["body"], "hi");
    assert_eq!(report["content_length"], 2);
    assert_eq!(report["trailing"], 5);
}

#[test]
fn test_parse_file_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("req.txt");
    std::fs::write(&path, b"GET / HTTP/1.1\r\nHost: x\r\n").unwrap();

    let err = parse_file(&path).unwrap_err();
    assert!(err.to_string().contains("EmptyLine"));
}
