use bench_config::{AssignmentMode, BenchConfig, LoadFence, StoreFence, TestId};
use ccbench::args::{Args, ArgsError};
use ccbench::report::{notes, write_catalogue, write_header};
use clap::Parser;

fn config(argv: &[&str]) -> Result<BenchConfig, ArgsError> {
    let args = Args::try_parse_from(std::iter::once("ccbench").chain(argv.iter().copied()))
        .expect("arguments parse");
    BenchConfig::try_from(&args)
}

#[test]
fn test_defaults() {
    let config = config(&[]).unwrap();
    assert_eq!(config.repetitions, BenchConfig::DEFAULT_REPETITIONS);
    assert_eq!(config.num_threads(), 2);
    assert_eq!(config.roles.mode(), AssignmentMode::Implicit);
    assert_eq!(config.roles.tests(), vec![TestId::StoreOnModified]);
    assert_eq!(config.cache_lines, BenchConfig::DEFAULT_CACHE_LINES);
    assert!(config.numa);
    assert!(!config.backoff.enabled);
}

#[test]
fn test_full_command_line() {
    let config = config(&[
        "-r", "500", "-t", "[12]", "-x", "[0,1][4...6]", "-s", "3", "-e", "7", "-m", "1M", "-p",
        "5", "-b", "9", "-n", "-K", "-R", "-u",
    ])
    .unwrap();

    assert_eq!(config.repetitions, 500);
    assert_eq!(config.stride, 4);
    assert_eq!(config.fence.load, LoadFence::Full);
    assert_eq!(config.fence.store, StoreFence::Store);
    assert_eq!(config.cache_lines, (1 << 20) / 64);
    assert!(config.verbose);
    assert_eq!(config.print, 5);
    assert_eq!(config.seed_core, Some(9));
    assert!(config.needs_seed_helper());
    assert!(!config.numa && config.lock_memory && config.trace_winners && config.force_success);
    assert_eq!(config.roles.num_groups(), 2);
    assert_eq!(config.roles.rank(4).core, 6);
    assert!(config.roles.ranks().iter().all(|info| info.test == TestId::Cas));
}

#[test]
fn test_backoff_caps_enable_backoff() {
    let config = config(&["-x", "[0...3]", "-t", "[34]", "-a", "[8,16,32,64]"]).unwrap();
    assert!(config.backoff.enabled);
    assert_eq!(config.backoff.cap_for(2), Some(32));

    assert!(matches!(
        config_err(&["-x", "[0,1]", "-t", "[34]", "-a", "[8]"]),
        ArgsError::Config(_)
    ));
}

fn config_err(argv: &[&str]) -> ArgsError {
    match config(argv) {
        Ok(_) => panic!("{argv:?} should be rejected"),
        Err(err) => err,
    }
}

#[test]
fn test_invalid_shapes_are_rejected() {
    config_err(&["-x", "[0,1][2,3]", "-t", "[1,2,3]"]);
    config_err(&["-t", "[99]"]);
    config_err(&["-r", "100", "-t", "[2]", "-m", "4K"]);
    // the same run is fine when every repetition flushes instead of moving on
    assert!(config(&["-r", "100", "-t", "[2]", "-m", "4K", "-f"]).is_ok());
}

#[test]
fn test_bad_literal_fails_parsing() {
    assert!(Args::try_parse_from(["ccbench", "-x", "[0..3]"]).is_err());
    assert!(Args::try_parse_from(["ccbench", "-m", "12Q"]).is_err());
}

#[test]
fn test_header_and_catalogue() {
    let config = config(&["-x", "[0,1,2]", "-t", "[3,7,12]"]).unwrap();
    let mut header = Vec::new();
    write_header(&mut header, &config, "2024-01-01 00:00:00").unwrap();
    let header = String::from_utf8(header).unwrap();
    assert!(header.contains("Per-thread ops in group 0:"));
    assert!(header.contains("  Test 12 on core 2"));

    let mut catalogue = Vec::new();
    write_catalogue(&mut catalogue).unwrap();
    let catalogue = String::from_utf8(catalogue).unwrap();
    assert_eq!(catalogue.lines().count(), TestId::COUNT + 1);
    assert!(catalogue.contains("CAS_UNTIL_SUCCESS"));
}

#[test]
fn test_notes_mention_missing_third_role() {
    let config = config(&["-x", "[0,1]", "-t", "[3]"]).unwrap();
    let lines = notes(TestId::StoreOnShared, &config, 2);
    assert!(lines
        .iter()
        .any(|line| line == "Need >=3 processes to achieve STORE_ON_SHARED"));
    assert!(!notes(TestId::StoreOnShared, &config, 3)
        .iter()
        .any(|line| line.starts_with("Need")));
}
