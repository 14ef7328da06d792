// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires the CLI's configuration into the Selector → Sequencer → Optimizer → Runner/Listener
//! pipeline, and persists the coverage store's updated run/failure history on completion.

use crate::cli::Cli;
use crate::errors::{CliError, Result};
use camino::Utf8Path;
use std::io::Write;
use std::str::FromStr;
use testpack_core::{
    coverage_store::CoverageStore,
    optimizer::{self, Target},
    partition::ShardAssignment,
    reporter::{Colorize, ListenerConfig, RunListener},
    runner::{InProcessRunner, UnderlyingRunner},
    selector::{TestClassEntry, TestIndex, TestSelector},
    sequencer::{self, FailureHistory},
};

/// Runs one end-to-end invocation, returning the process exit code on success.
///
/// `0` if every selected test passed (or none were selected), `1` if at least one failed.
/// Configuration problems are reported as a [`CliError`] instead, before any test runs.
pub fn run(cli: &Cli) -> Result<i32> {
    if cli.quiet && cli.verbose {
        return Err(CliError::QuietAndVerbose);
    }
    if cli.optimize_coverage.is_some() && cli.optimize_runtime.is_some() {
        return Err(CliError::ConflictingOptimizerTargets);
    }

    let pattern = cli.selector_pattern().unwrap_or("*");
    let selector = TestSelector::parse(pattern).map_err(|source| CliError::Selector {
        pattern: pattern.to_owned(),
        source,
    })?;

    let shard = cli
        .shard
        .as_deref()
        .map(|s| {
            ShardAssignment::from_str(s).map_err(|source| CliError::Shard {
                spec: s.to_owned(),
                source,
            })
        })
        .transpose()?;

    let index = load_manifest(&cli.manifest)?;

    let mut store = CoverageStore::load(&cli.store_dir).map_err(|source| CliError::Store {
        dir: cli.store_dir.clone(),
        source,
    })?;

    let mut history = FailureHistory::new();
    for test in store.tests() {
        if let Some(runs) = store.runs_since_last_failure(&test.id) {
            history.record(test.id.clone(), runs);
        }
    }

    let mut request = sequencer::sequence(&index, &selector, shard, Some(&history));

    if request.is_empty() {
        tracing::warn!("selector `{pattern}` matched zero tests; proceeding with an empty run");
    }

    let target = if let Some(fraction) = cli.optimize_coverage {
        Some(Target::Coverage(fraction))
    } else {
        cli.optimize_runtime.map(Target::Cost)
    };

    if let Some(target) = target {
        let plan = optimizer::optimize(&store, request.tests(), target);
        if cli.verbose {
            tracing::info!("{}", plan.describe());
        }
        request.retain(|id| plan.contains(id));
    }

    let test_package_prefixes = pattern
        .trim_end_matches('*')
        .trim_end_matches('.')
        .to_owned();
    let listener_config = ListenerConfig {
        quiet: cli.quiet,
        verbose: cli.verbose,
        fail_fast: cli.fail_fast,
        test_package_prefixes: if test_package_prefixes.is_empty() {
            Vec::new()
        } else {
            vec![test_package_prefixes]
        },
        colorize: Colorize::for_stream(supports_color::Stream::Stdout, None),
    };

    let stdout = std::io::stdout();
    let mut listener = RunListener::new(listener_config, stdout.lock());

    let runner = InProcessRunner::new(Default::default());
    runner.execute(&request, &mut |event| {
        listener.on_event(event).expect("writing to stdout failed");
        listener.aborted()
    });

    let failed_ids = listener.failed_test_ids();
    let failed_count = listener.failed_count();
    let _ = listener.into_inner().flush();

    store.apply_run_result(&failed_ids);
    store.save(&cli.store_dir).map_err(|source| CliError::Store {
        dir: cli.store_dir.clone(),
        source,
    })?;

    Ok(if failed_count > 0 { 1 } else { 0 })
}

/// Loads a flat test manifest: one line per class, `full.Class.Name:method1,method2`.
///
/// Stands in for a build step that would otherwise populate a [`TestIndex`] from the test
/// framework's own compiled-class registry.
fn load_manifest(path: &Utf8Path) -> Result<TestIndex> {
    let contents = match std::fs::read_to_string(path.as_std_path()) {
        Ok(contents) => contents,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(CliError::ManifestRead {
                path: path.to_owned(),
                source,
            });
        }
    };

    let mut entries = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (class_name, methods) = line.split_once(':').ok_or_else(|| CliError::ManifestMalformed {
            path: path.to_owned(),
            reason: "line missing ':' between class name and method list",
        })?;
        let methods: Vec<String> = methods.split(',').map(|m| m.trim().to_owned()).collect();
        if methods.iter().any(|m| m.is_empty()) {
            return Err(CliError::ManifestMalformed {
                path: path.to_owned(),
                reason: "empty method name in method list",
            });
        }
        entries.push(TestClassEntry {
            class_name: class_name.trim().to_owned(),
            runnable: true,
            methods,
        });
    }

    Ok(TestIndex::new(entries))
}
