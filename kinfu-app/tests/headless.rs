//! Whole-program runs without windows

use clap::Parser;
use kinfu_app::{run_app, Cli};
use kinfu_core::Error;
use tempfile::TempDir;

#[test]
fn test_synthetic_run_exports_model() {
    let dir = TempDir::new().unwrap();
    let export = dir.path().join("room.ply");
    let cli = Cli::try_parse_from([
        "kinfu",
        "--headless",
        "--preset",
        "coarse",
        "--frames",
        "3",
        "--synthetic-width",
        "160",
        "--synthetic-height",
        "120",
        "--export",
        export.to_str().unwrap(),
    ])
    .unwrap();

    let stats = run_app(&cli).unwrap();
    assert_eq!(stats.fused, 3);
    assert_eq!(stats.skipped, 0);

    let cloud = kinfu_io::read_point_cloud(&export).unwrap();
    assert!(cloud.len() > 500, "only {} points exported", cloud.len());
}

#[test]
fn test_missing_sequence_fails_to_open() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("no-such-dir");
    let cli = Cli::try_parse_from(["kinfu", "--headless", "--source", "sequence", "--input", missing.to_str().unwrap()])
        .unwrap();

    let err = run_app(&cli).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DeviceOpen(_))));
}
