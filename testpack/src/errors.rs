// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI-level errors and their exit codes.

use camino::Utf8PathBuf;
use thiserror::Error;

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// An error that aborts the CLI before (or without) running any tests.
#[derive(Debug, Error)]
pub enum CliError {
    /// `--quiet` and `--verbose` given together. Exits 1 rather than the usual 2, per the CLI
    /// contract's specific wording for this case.
    #[error("Quiet and Verbose flags cannot be used simultaneously")]
    QuietAndVerbose,

    #[error("--optimize-coverage and --optimize-runtime cannot be used simultaneously")]
    ConflictingOptimizerTargets,

    #[error("invalid test selector pattern `{pattern}`")]
    Selector {
        pattern: String,
        #[source]
        source: testpack_core::errors::SelectorParseError,
    },

    #[error("invalid shard spec `{spec}`")]
    Shard {
        spec: String,
        #[source]
        source: testpack_core::errors::ShardParseError,
    },

    #[error("coverage store error at `{dir}`")]
    Store {
        dir: Utf8PathBuf,
        #[source]
        source: testpack_core::errors::StoreError,
    },

    #[error("failed to read test manifest at `{path}`")]
    ManifestRead {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed test manifest at `{path}`: {reason}")]
    ManifestMalformed { path: Utf8PathBuf, reason: &'static str },
}

impl CliError {
    /// `1` for the quiet/verbose conflict (matching the CLI contract's exact wording), `2` for
    /// every other configuration error.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            CliError::QuietAndVerbose => 1,
            _ => 2,
        }
    }

    pub fn display_to_stderr(&self) {
        eprintln!("error: {self}");
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            eprintln!("  caused by: {err}");
            source = err.source();
        }
    }
}
