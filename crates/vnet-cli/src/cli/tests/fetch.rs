//! Tests for `vnet fetch` argument parsing.

use std::path::PathBuf;

use super::parse;
use crate::cli::CliCommand;

#[test]
fn cli_parse_fetch_defaults() {
    match parse(&["vnet", "fetch"]) {
        CliCommand::Fetch(args) => {
            assert_eq!(args.regular, 3);
            assert_eq!(args.fallback, 1);
            assert_eq!(args.size, 4_000_000);
            assert_eq!(args.deadline_ms, 5000);
            assert_eq!(args.content, "movie0000000000000000001");
            assert!(!args.json);
            assert!(args.out.is_none());
        }
        _ => panic!("expected Fetch"),
    }
}

#[test]
fn cli_parse_fetch_network_shape() {
    match parse(&[
        "vnet",
        "fetch",
        "--regular",
        "5",
        "--fallback",
        "0",
        "--silent",
        "2",
        "--busy",
        "1",
        "--deadline-ms",
        "800",
        "--json",
        "--out",
        "/tmp/slice.bin",
    ]) {
        CliCommand::Fetch(args) => {
            assert_eq!(args.regular, 5);
            assert_eq!(args.fallback, 0);
            assert_eq!(args.silent, 2);
            assert_eq!(args.busy, 1);
            assert_eq!(args.deadline_ms, 800);
            assert!(args.json);
            assert_eq!(args.out, Some(PathBuf::from("/tmp/slice.bin")));
        }
        _ => panic!("expected Fetch"),
    }
}

#[test]
fn cli_parse_fetch_rejects_bad_number() {
    use clap::Parser;
    assert!(crate::cli::Cli::try_parse_from(["vnet", "fetch", "--size", "-1"]).is_err());
}
