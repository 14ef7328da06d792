// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle events fired by the underlying test framework, consumed by [`super::RunListener`].

use crate::test_id::TestId;

/// One frame of a captured stack trace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackFrame {
    /// Fully qualified class owning this frame, if known (native/foreign frames may lack one).
    pub class_name: Option<String>,
    /// The frame's full textual rendering, e.g. `at pkg.Class.method(Class.java:42)`.
    pub text: String,
}

/// A reported test failure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Failure {
    pub description: TestId,
    pub exception_class: String,
    pub message: Option<String>,
    pub stack: Vec<StackFrame>,
    /// The failure's root cause, if the exception has one distinct from itself.
    pub root_cause: Option<Box<Failure>>,
}

/// One lifecycle event, delivered serially on a single thread.
#[derive(Clone, Debug)]
pub enum TestEvent {
    /// Carries the total number of tests about to run, for the `run/total` progress line.
    RunStarted(usize),
    TestStarted(TestId),
    TestFailure(Failure),
    TestAssumptionFailure(TestId),
    TestIgnored(TestId),
    TestFinished(TestId),
    RunFinished(RunResult),
}

/// Final counters for a completed run.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RunResult {
    pub run_count: u64,
    pub failed_count: u64,
    pub ignored_count: u64,
    pub assumption_failed_count: u64,
}

impl RunResult {
    /// `run_count - assumption_failed_count`; never negative.
    pub fn passed_count(&self) -> u64 {
        self.run_count.saturating_sub(self.assumption_failed_count)
    }
}
