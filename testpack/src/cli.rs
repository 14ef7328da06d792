// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line argument parsing.

use camino::Utf8PathBuf;
use clap::Parser;

/// A coverage-guided test-selection runner.
#[derive(Debug, Parser)]
#[command(version, about, max_term_width = 100)]
pub struct Cli {
    /// Package selector pattern, e.g. `org.example.wildcards.include*`.
    ///
    /// Falls back to `--package`, then to the `TESTPACK_PACKAGE` environment variable.
    pub pattern: Option<String>,

    /// Package selector pattern; overrides the positional argument if both are given.
    #[arg(long, env = "TESTPACK_PACKAGE")]
    pub package: Option<String>,

    /// Suppress progress lines and the failures section; only the summary is shown.
    ///
    /// Mutually exclusive with `--verbose`; checked explicitly rather than via clap's
    /// `conflicts_with`, since violating it exits with code 1 and a specific message rather
    /// than clap's own usage-error exit code.
    #[arg(long)]
    pub quiet: bool,

    /// Show every captured stdout/stderr stream, even for passing tests.
    #[arg(long)]
    pub verbose: bool,

    /// Stop after the first failing test.
    #[arg(long)]
    pub fail_fast: bool,

    /// Shard assignment as `index/total`, e.g. `0/3`.
    #[arg(long, value_name = "INDEX/TOTAL")]
    pub shard: Option<String>,

    /// Run the smallest-cost subset of tests reaching this coverage fraction (0.0-1.0).
    #[arg(long, value_name = "FRACTION", conflicts_with = "optimize_runtime")]
    pub optimize_coverage: Option<f64>,

    /// Run the coverage-maximising subset of tests within this wall-clock budget, in ms.
    #[arg(long, value_name = "MILLISECONDS")]
    pub optimize_runtime: Option<u64>,

    /// Directory holding the persisted coverage store.
    #[arg(long, default_value = ".testpackage")]
    pub store_dir: Utf8PathBuf,

    /// Path to a test manifest file: one line per class, `full.Class.Name:method1,method2`.
    ///
    /// A real integration would populate the equivalent table from the build's own test
    /// discovery rather than a flat file; this is the stand-in used by the bundled binary.
    #[arg(long, default_value = "tests.manifest")]
    pub manifest: Utf8PathBuf,
}

impl Cli {
    /// The effective selector pattern: `--package`, then the positional argument.
    pub fn selector_pattern(&self) -> Option<&str> {
        self.package.as_deref().or(self.pattern.as_deref())
    }
}
