// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by testpack-core.
//!
//! One small, specific error type per fallible boundary, rather than a single catch-all.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Error parsing a [`crate::selector::TestSelector`] pattern.
#[derive(Clone, Debug, Error)]
#[error("invalid test selector pattern `{pattern}`: {reason}")]
pub struct SelectorParseError {
    pub(crate) pattern: String,
    pub(crate) reason: &'static str,
}

impl SelectorParseError {
    pub(crate) fn new(pattern: impl Into<String>, reason: &'static str) -> Self {
        Self {
            pattern: pattern.into(),
            reason,
        }
    }
}

/// Error parsing a `--shard i/n` argument into a [`crate::sequencer::ShardAssignment`].
#[derive(Clone, Debug, Error)]
#[error("invalid shard spec `{input}`: expected `index/total` with 0 <= index < total, {reason}")]
pub struct ShardParseError {
    pub(crate) input: String,
    pub(crate) reason: &'static str,
}

impl ShardParseError {
    pub(crate) fn new(input: impl Into<String>, reason: &'static str) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }
}

/// A persisted coverage bitmap's width didn't match the store's global probe-point count.
///
/// Fatal: aborts the load.
#[derive(Debug, Error)]
#[error(
    "coverage store integrity error in `{path}`: bitmap for test `{test_id}` has width {actual}, expected {expected}"
)]
pub struct StoreIntegrityError {
    pub(crate) path: Utf8PathBuf,
    pub(crate) test_id: String,
    pub(crate) expected: usize,
    pub(crate) actual: usize,
}

/// I/O and parsing failures while loading or saving a [`crate::coverage_store::CoverageStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A bitmap's width didn't match the store's global probe-point count.
    #[error(transparent)]
    Integrity(#[from] StoreIntegrityError),

    /// A `probes`/`costs`/`failures` record was malformed.
    #[error("malformed record in `{path}`: {reason}")]
    MalformedRecord {
        path: Utf8PathBuf,
        reason: &'static str,
    },

    /// Underlying I/O failure reading or writing a store file.
    #[error("I/O error accessing `{path}`")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A nested [`crate::stream_capture::StreamCapture::grab`] without an intervening `restore`.
///
/// Indicates a programming bug; fatal.
#[derive(Clone, Debug, Error)]
#[error("stream capture is already active; nested grab() without restore() is a bug")]
pub struct CaptureError;
