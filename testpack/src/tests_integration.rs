// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests driving [`crate::orchestrator::run`] through parsed CLI arguments, rather
//! than calling `testpack-core` directly. Colocated in `src` rather than a top-level `tests/`
//! directory, since a `tests/` integration binary would rebuild this crate's own binary target.

use crate::cli::Cli;
use crate::errors::CliError;
use crate::orchestrator;
use camino_tempfile::Utf8TempDir;
use clap::Parser;

fn write_manifest(dir: &camino::Utf8Path, contents: &str) -> camino::Utf8PathBuf {
    let path = dir.join("tests.manifest");
    std::fs::write(path.as_std_path(), contents).unwrap();
    path
}

#[test]
fn quiet_and_verbose_together_is_a_configuration_error() {
    let dir = Utf8TempDir::new().unwrap();
    let manifest = write_manifest(dir.path(), "org.example.A:t1\n");

    let cli = Cli::parse_from([
        "testpack",
        "org.example",
        "--quiet",
        "--verbose",
        "--manifest",
        manifest.as_str(),
        "--store-dir",
        dir.path().join("store").as_str(),
    ]);

    let err = orchestrator::run(&cli).unwrap_err();
    assert!(matches!(err, CliError::QuietAndVerbose));
    assert_eq!(err.process_exit_code(), 1);
    assert_eq!(err.to_string(), "Quiet and Verbose flags cannot be used simultaneously");
}

#[test]
fn invalid_shard_spec_is_a_configuration_error() {
    let dir = Utf8TempDir::new().unwrap();
    let manifest = write_manifest(dir.path(), "org.example.A:t1\n");

    let cli = Cli::parse_from([
        "testpack",
        "org.example",
        "--shard",
        "5/2",
        "--manifest",
        manifest.as_str(),
        "--store-dir",
        dir.path().join("store").as_str(),
    ]);

    let err = orchestrator::run(&cli).unwrap_err();
    assert!(matches!(err, CliError::Shard { .. }));
    assert_eq!(err.process_exit_code(), 2);
}

#[test]
fn full_run_discovers_tests_and_persists_store() {
    let dir = Utf8TempDir::new().unwrap();
    let manifest = write_manifest(
        dir.path(),
        "org.example.simpletests.SimpleTest:testTrue1,testTrue2\n",
    );
    let store_dir = dir.path().join("store");

    let cli = Cli::parse_from([
        "testpack",
        "org.example.simpletests",
        "--manifest",
        manifest.as_str(),
        "--store-dir",
        store_dir.as_str(),
    ]);

    let code = orchestrator::run(&cli).unwrap();
    assert_eq!(code, 0, "the in-process runner defaults every test to pass");

    // The run has no prior CoverageStore entries for these tests, so `save` only ever writes the
    // (empty) probes file; there's nothing in `costs`/`failures` to persist for unknown tests.
    assert!(store_dir.join("probes").exists());
}

#[test]
fn missing_manifest_runs_as_an_empty_request() {
    let dir = Utf8TempDir::new().unwrap();
    let cli = Cli::parse_from([
        "testpack",
        "org.example",
        "--manifest",
        dir.path().join("does-not-exist.manifest").as_str(),
        "--store-dir",
        dir.path().join("store").as_str(),
    ]);

    let code = orchestrator::run(&cli).unwrap();
    assert_eq!(code, 0);
}

#[test]
fn package_env_var_fallback_is_honored_over_positional() {
    let dir = Utf8TempDir::new().unwrap();
    let manifest = write_manifest(dir.path(), "org.example.A:t1\n");

    let cli = Cli::parse_from([
        "testpack",
        "--manifest",
        manifest.as_str(),
        "--store-dir",
        dir.path().join("store").as_str(),
    ]);
    assert_eq!(cli.selector_pattern(), None);

    let code = orchestrator::run(&cli).unwrap();
    assert_eq!(code, 0, "an absent selector falls back to '*', matching everything");
}
