// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test lifecycle event state machine.
//!
//! States per test: `Idle -> Started -> (Running) -> Finished`, with side-transitions to `Failed`
//! (on a failure event before `Finished`) and `Ignored` (standalone, never `Started`).
//! Assumption-failure is a non-failing terminal tag on an already-started test.

use super::events::{Failure, RunResult, TestEvent};
use super::failure::format_failure;
use super::styles::{render_markup, right_align, terminal_width, Colorize};
use crate::stream_capture::{CapturedStreams, Handle, StreamCapture};
use crate::test_id::TestId;
use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Instant;
use tracing::debug;

/// Configuration the listener is built with; orthogonal to the event stream itself.
#[derive(Clone, Debug)]
pub struct ListenerConfig {
    pub quiet: bool,
    pub verbose: bool,
    pub fail_fast: bool,
    /// Package prefixes considered "test code", for the suspect-frame heuristic.
    pub test_package_prefixes: Vec<String>,
    pub colorize: Colorize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            quiet: false,
            verbose: false,
            fail_fast: false,
            test_package_prefixes: Vec::new(),
            colorize: Colorize::No,
        }
    }
}

/// Drives the reporter's side effects (printing, stream capture) in response to lifecycle events.
///
/// Generic over the output destination so tests can assert against an in-memory buffer instead
/// of the process's real stdout.
pub struct RunListener<W: Write> {
    config: ListenerConfig,
    out: W,
    run_count: u64,
    failed_count: u64,
    ignored_count: u64,
    assumption_failed_count: u64,
    total: usize,
    current: Option<TestId>,
    current_start: Option<Instant>,
    current_did_fail: bool,
    aborted: bool,
    failures: Vec<Failure>,
    captured_by_class: HashMap<String, CapturedStreams>,
    active_capture: Option<Handle>,
}

impl<W: Write> RunListener<W> {
    pub fn new(config: ListenerConfig, out: W) -> Self {
        Self {
            config,
            out,
            run_count: 0,
            failed_count: 0,
            ignored_count: 0,
            assumption_failed_count: 0,
            total: 0,
            current: None,
            current_start: None,
            current_did_fail: false,
            aborted: false,
            failures: Vec::new(),
            captured_by_class: HashMap::new(),
            active_capture: None,
        }
    }

    /// Whether a fail-fast abort has been signalled; the orchestrator should stop driving the
    /// underlying runner once this returns `true`.
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Total failures recorded so far.
    pub fn failed_count(&self) -> u64 {
        self.failed_count
    }

    /// The ids of every test that failed this run, in the order they failed.
    pub fn failed_test_ids(&self) -> Vec<TestId> {
        self.failures.iter().map(|f| f.description.clone()).collect()
    }

    /// Consumes the listener, returning its output destination.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// The bytes captured for `class`, or an empty buffer if none were recorded.
    pub fn read_out(&self, class: &str) -> &[u8] {
        self.captured_by_class.get(class).map(|c| c.stdout.as_slice()).unwrap_or(&[])
    }

    pub fn read_err(&self, class: &str) -> &[u8] {
        self.captured_by_class.get(class).map(|c| c.stderr.as_slice()).unwrap_or(&[])
    }

    pub fn on_event(&mut self, event: TestEvent) -> io::Result<()> {
        match event {
            TestEvent::RunStarted(total) => self.on_run_started(total),
            TestEvent::TestStarted(id) => self.on_test_started(id),
            TestEvent::TestFailure(failure) => self.on_test_failure(failure),
            TestEvent::TestAssumptionFailure(id) => self.on_test_assumption_failure(id),
            TestEvent::TestIgnored(id) => self.on_test_ignored(id),
            TestEvent::TestFinished(id) => self.on_test_finished(id),
            TestEvent::RunFinished(result) => self.on_run_finished(result),
        }
    }

    fn on_run_started(&mut self, total: usize) -> io::Result<()> {
        self.total = total;
        self.current_did_fail = false;
        Ok(())
    }

    fn on_test_started(&mut self, id: TestId) -> io::Result<()> {
        if !self.config.quiet {
            let left = format!(">>  {}  ...", id.canonical());
            let right = format!(
                "[ {}/{} tests run, {} ignored, {} failed ]",
                self.run_count, self.total, self.ignored_count, self.failed_count
            );
            let line = right_align(&left, &right, terminal_width());
            writeln!(self.out, "{line}")?;
        }

        let tee = self.config.verbose && !self.config.quiet;
        match StreamCapture::grab(tee, id.canonical()) {
            Ok(handle) => self.active_capture = Some(handle),
            Err(error) => debug!("failed to start capture for {}: {}", id.canonical(), error),
        }

        self.current = Some(id);
        self.current_start = Some(Instant::now());
        Ok(())
    }

    fn on_test_failure(&mut self, failure: Failure) -> io::Result<()> {
        self.current_did_fail = true;
        self.failed_count += 1;
        self.failures.push(failure.clone());

        if self.config.fail_fast {
            self.out.flush()?;
            writeln!(self.out, "{}", render_markup("@|bg_red,bold TESTS ABORTED|@", self.config.colorize))?;
            let report = format_failure(&failure, &self.config.test_package_prefixes, self.config.colorize);
            write!(self.out, "{report}")?;
            self.aborted = true;
        }
        Ok(())
    }

    fn on_test_assumption_failure(&mut self, _id: TestId) -> io::Result<()> {
        self.assumption_failed_count += 1;
        self.current_did_fail = false;
        Ok(())
    }

    fn on_test_ignored(&mut self, _id: TestId) -> io::Result<()> {
        self.ignored_count += 1;
        Ok(())
    }

    fn on_test_finished(&mut self, id: TestId) -> io::Result<()> {
        let elapsed_ms = self
            .current_start
            .map(|start| start.elapsed().as_millis())
            .unwrap_or(0);

        let captured = self
            .active_capture
            .take()
            .map(|mut handle| handle.restore())
            .unwrap_or_default();
        self.captured_by_class.insert(id.class_name().to_owned(), captured.clone());

        if !self.current_did_fail {
            self.run_count += 1;
        }

        if !self.config.quiet {
            let mark = if self.current_did_fail {
                render_markup("@|red \u{2718}|@", self.config.colorize)
            } else {
                render_markup("@|green \u{2714}|@", self.config.colorize)
            };
            writeln!(self.out, "{mark}  {}  ({elapsed_ms} ms)", id.canonical())?;

            // Non-verbose runs only surface a captured stream when it has content; verbose runs
            // show the header for every test, captured output or not, matching passing tests too.
            if self.config.verbose || !captured.stdout.is_empty() {
                writeln!(self.out, "STDOUT:")?;
                self.out.write_all(&captured.stdout)?;
                writeln!(self.out)?;
            }
            if self.config.verbose || !captured.stderr.is_empty() {
                writeln!(self.out, "STDERR:")?;
                self.out.write_all(&captured.stderr)?;
                writeln!(self.out)?;
            }
        }

        self.current = None;
        self.current_start = None;
        self.current_did_fail = false;
        Ok(())
    }

    fn on_run_finished(&mut self, result: RunResult) -> io::Result<()> {
        writeln!(self.out, "*** TESTS COMPLETE")?;

        let passed = result.passed_count();
        let mut parts = Vec::new();

        let passed_style = if passed > 0 && result.failed_count == 0 {
            "bg_green"
        } else {
            "green"
        };
        parts.push(render_markup(&format!("@|{passed_style} {passed} passed|@"), self.config.colorize));

        if result.failed_count > 0 {
            parts.push(render_markup(&format!("@|bg_red {} failed|@", result.failed_count), self.config.colorize));
        }

        if result.ignored_count > 0 {
            let ignored_style = if result.ignored_count > passed { "bg_red" } else { "yellow" };
            parts.push(render_markup(
                &format!("@|{ignored_style} {} ignored|@", result.ignored_count),
                self.config.colorize,
            ));
        }

        if result.assumption_failed_count > 0 {
            parts.push(render_markup(
                &format!("@|blue {} assumption(s) failed|@", result.assumption_failed_count),
                self.config.colorize,
            ));
        }

        writeln!(self.out, "{}", parts.join(", "))?;

        if !self.config.quiet && !self.failures.is_empty() {
            writeln!(self.out, "Failures:")?;
            for failure in &self.failures {
                let report = format_failure(failure, &self.config.test_package_prefixes, self.config.colorize);
                write!(self.out, "{report}")?;
            }
        }

        Ok(())
    }
}
