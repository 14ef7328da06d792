// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted, file-based store of per-test coverage bitmaps and cost/failure history.
//!
//! On-disk layout, inside a directory (default `.testpackage/`):
//! - `probes`: first record is `N` (probe-point count, little-endian `u32`), then per-test
//!   records of `{testId (length-prefixed UTF-8), bitWidth (little-endian `u32`),
//!   bitmap (ceil(bitWidth/8) bytes)}`. Each record's own `bitWidth` is persisted
//!   independently of the global `N` so a width mismatch is a distinct, detectable integrity
//!   error rather than indistinguishable from a truncated file.
//! - `costs`: lines `testId=milliseconds`.
//! - `failures`: lines `testId=runsSinceLastFailure`.
//!
//! A small struct wrapping a directory path, with `load`/`save` methods and one `thiserror` enum
//! for I/O failures. The wire format here is a fixed byte layout rather than JSON, so no `serde`
//! is involved (see `DESIGN.md`).

use crate::{
    bitset::Bitset,
    errors::{StoreError, StoreIntegrityError},
    test_id::TestId,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    collections::HashMap,
    fs,
    io::{self, Read},
};

const PROBES_FILE: &str = "probes";
const COSTS_FILE: &str = "costs";
const FAILURES_FILE: &str = "failures";

/// Immutable once loaded: `{id, coverage, cost}`.
#[derive(Clone, Debug)]
pub struct TestWithCoverage {
    pub id: TestId,
    pub coverage: Bitset,
    pub cost_ms: u64,
}

impl TestWithCoverage {
    /// `popcount(coverage) / N`.
    pub fn coverage_fraction(&self, n: usize) -> f64 {
        if n == 0 {
            0.0
        } else {
            self.coverage.cardinality() as f64 / n as f64
        }
    }
}

/// A persisted mapping `test-id -> {bitmap, cost-ms, runs-since-last-failure}` plus the global
/// probe-point count.
#[derive(Clone, Debug, Default)]
pub struct CoverageStore {
    probe_count: usize,
    tests: HashMap<TestId, TestWithCoverage>,
    /// Missing entry means "no failure observed yet", i.e. the `+∞` sentinel is "absent key".
    runs_since_last_failure: HashMap<TestId, u64>,
}

impl CoverageStore {
    /// An empty store with `N` probe points.
    pub fn new(probe_count: usize) -> Self {
        Self {
            probe_count,
            tests: HashMap::new(),
            runs_since_last_failure: HashMap::new(),
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probe_count
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn get(&self, id: &TestId) -> Option<&TestWithCoverage> {
        self.tests.get(id)
    }

    pub fn tests(&self) -> impl Iterator<Item = &TestWithCoverage> {
        self.tests.values()
    }

    pub fn runs_since_last_failure(&self, id: &TestId) -> Option<u64> {
        self.runs_since_last_failure.get(id).copied()
    }

    /// Records (or replaces) a test's coverage bitmap and cost.
    ///
    /// Panics if `coverage.len() != probe_count()`; callers build bitmaps against
    /// [`CoverageStore::probe_count`] precisely so this is a programming error, not a runtime
    /// integrity concern (that check is reserved for data loaded from disk, see `load`).
    pub fn record(&mut self, id: TestId, coverage: Bitset, cost_ms: u64) {
        assert_eq!(coverage.len(), self.probe_count, "coverage width must match store width");
        let cost_ms = if cost_ms == 0 { 1 } else { cost_ms };
        self.tests.insert(id.clone(), TestWithCoverage { id, coverage, cost_ms });
    }

    /// Applies the result of a completed run: every test observed in `failed_this_run` resets to
    /// zero, every other previously-known test's counter increments by one, and new tests are
    /// left unset (the `+∞` sentinel).
    pub fn apply_run_result(&mut self, failed_this_run: &[TestId]) {
        for id in self.tests.keys() {
            self.runs_since_last_failure
                .entry(id.clone())
                .and_modify(|v| *v += 1)
                .or_insert(1);
        }
        for id in failed_this_run {
            self.runs_since_last_failure.insert(id.clone(), 0);
        }
    }

    /// Loads a store from `dir`. If any of the three files is absent, the store is treated as
    /// empty (not an error)
    pub fn load(dir: &Utf8Path) -> Result<Self, StoreError> {
        let probes_path = dir.join(PROBES_FILE);
        let (probe_count, tests) = match read_file(&probes_path)? {
            Some(bytes) => parse_probes(&probes_path, &bytes)?,
            None => (0, HashMap::new()),
        };

        let costs_path = dir.join(COSTS_FILE);
        let costs = match read_to_string(&costs_path)? {
            Some(contents) => parse_kv_lines::<u64>(&costs_path, &contents)?,
            None => HashMap::new(),
        };

        let failures_path = dir.join(FAILURES_FILE);
        let runs_since_last_failure = match read_to_string(&failures_path)? {
            Some(contents) => parse_kv_lines::<u64>(&failures_path, &contents)?,
            None => HashMap::new(),
        };

        let mut tests = tests;
        for (id, with_coverage) in tests.iter_mut() {
            if let Some(cost_ms) = costs.get(id) {
                with_coverage.cost_ms = *cost_ms;
            }
        }

        Ok(Self {
            probe_count,
            tests,
            runs_since_last_failure,
        })
    }

    /// Writes the store to `dir`, creating it if it doesn't already exist.
    pub fn save(&self, dir: &Utf8Path) -> Result<(), StoreError> {
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_owned(),
            source,
        })?;

        let probes_path = dir.join(PROBES_FILE);
        write_probes(&probes_path, self)?;

        let costs_path = dir.join(COSTS_FILE);
        let costs_contents: String = self
            .tests
            .values()
            .map(|t| format!("{}={}\n", t.id.canonical(), t.cost_ms))
            .collect();
        write_file(&costs_path, costs_contents.as_bytes())?;

        let failures_path = dir.join(FAILURES_FILE);
        let failures_contents: String = self
            .runs_since_last_failure
            .iter()
            .map(|(id, runs)| format!("{}={}\n", id.canonical(), runs))
            .collect();
        write_file(&failures_path, failures_contents.as_bytes())?;

        Ok(())
    }
}

fn read_file(path: &Utf8Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path.as_std_path()) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_owned(),
            source,
        }),
    }
}

fn read_to_string(path: &Utf8Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path.as_std_path()) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_owned(),
            source,
        }),
    }
}

fn write_file(path: &Utf8Path, contents: &[u8]) -> Result<(), StoreError> {
    fs::write(path.as_std_path(), contents).map_err(|source| StoreError::Io {
        path: path.to_owned(),
        source,
    })
}

fn parse_probes(
    path: &Utf8Path,
    bytes: &[u8],
) -> Result<(usize, HashMap<TestId, TestWithCoverage>), StoreError> {
    let mut cursor = io::Cursor::new(bytes);

    let mut n_buf = [0u8; 4];
    cursor.read_exact(&mut n_buf).map_err(|_| StoreError::MalformedRecord {
        path: path.to_owned(),
        reason: "truncated probe-point count",
    })?;
    let n = u32::from_le_bytes(n_buf) as usize;

    let mut tests = HashMap::new();
    loop {
        let mut len_buf = [0u8; 4];
        match cursor.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(_) => {
                return Err(StoreError::MalformedRecord {
                    path: path.to_owned(),
                    reason: "truncated test-id length prefix",
                });
            }
        }
        let id_len = u32::from_le_bytes(len_buf) as usize;

        let mut id_buf = vec![0u8; id_len];
        cursor.read_exact(&mut id_buf).map_err(|_| StoreError::MalformedRecord {
            path: path.to_owned(),
            reason: "truncated test id",
        })?;
        let id_str = String::from_utf8(id_buf).map_err(|_| StoreError::MalformedRecord {
            path: path.to_owned(),
            reason: "test id is not valid UTF-8",
        })?;
        let id = parse_canonical_id(path, &id_str)?;

        // The record's own bit width is persisted alongside its bitmap, independently of the
        // global `n`, so a genuine width mismatch (as opposed to a truncated file) is
        // distinguishable and can surface as `StoreError::Integrity` rather than always reading
        // as a truncation.
        let mut width_buf = [0u8; 4];
        cursor.read_exact(&mut width_buf).map_err(|_| StoreError::MalformedRecord {
            path: path.to_owned(),
            reason: "truncated record bit-width",
        })?;
        let record_width = u32::from_le_bytes(width_buf) as usize;

        let byte_len = record_width.div_ceil(8);
        let mut bitmap_buf = vec![0u8; byte_len];
        cursor.read_exact(&mut bitmap_buf).map_err(|_| StoreError::MalformedRecord {
            path: path.to_owned(),
            reason: "truncated bitmap",
        })?;

        if record_width != n {
            return Err(StoreError::Integrity(StoreIntegrityError {
                path: path.to_owned(),
                test_id: id_str,
                expected: n,
                actual: record_width,
            }));
        }

        let coverage = match Bitset::from_bytes(n, &bitmap_buf) {
            Some(b) => b,
            None => {
                return Err(StoreError::Integrity(StoreIntegrityError {
                    path: path.to_owned(),
                    test_id: id_str,
                    expected: n,
                    actual: bitmap_buf.len() * 8,
                }));
            }
        };

        tests.insert(
            id.clone(),
            TestWithCoverage {
                id,
                coverage,
                cost_ms: 1,
            },
        );
    }

    Ok((n, tests))
}

fn write_probes(path: &Utf8Path, store: &CoverageStore) -> Result<(), StoreError> {
    let mut out = Vec::new();
    out.extend_from_slice(&(store.probe_count as u32).to_le_bytes());

    // Sorted for a byte-stable save/load round trip.
    let mut tests: Vec<&TestWithCoverage> = store.tests.values().collect();
    tests.sort_by(|a, b| a.id.sort_key().cmp(&b.id.sort_key()));

    for test in tests {
        let id_bytes = test.id.canonical().into_bytes();
        out.extend_from_slice(&(id_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&id_bytes);
        out.extend_from_slice(&(test.coverage.len() as u32).to_le_bytes());
        out.extend_from_slice(&test.coverage.to_bytes());
    }

    write_file(path, &out)
}

fn parse_canonical_id(path: &Utf8Path, s: &str) -> Result<TestId, StoreError> {
    // `method(Class)`.
    let open = s.find('(').ok_or(StoreError::MalformedRecord {
        path: path.to_owned(),
        reason: "test id missing '('",
    })?;
    if !s.ends_with(')') {
        return Err(StoreError::MalformedRecord {
            path: path.to_owned(),
            reason: "test id missing trailing ')'",
        });
    }
    let method = &s[..open];
    let class = &s[open + 1..s.len() - 1];
    Ok(TestId::new(class, method))
}

fn parse_kv_lines<T: std::str::FromStr>(
    path: &Utf8Path,
    contents: &str,
) -> Result<HashMap<TestId, T>, StoreError> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        if line.is_empty() {
            continue;
        }
        let (id_str, value_str) = line.split_once('=').ok_or(StoreError::MalformedRecord {
            path: path.to_owned(),
            reason: "line missing '='",
        })?;
        let id = parse_canonical_id(path, id_str)?;
        let value = value_str.parse::<T>().map_err(|_| StoreError::MalformedRecord {
            path: path.to_owned(),
            reason: "value is not a valid number",
        })?;
        map.insert(id, value);
    }
    Ok(map)
}
