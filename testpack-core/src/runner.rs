// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The boundary to the underlying test-execution framework.
//!
//! The framework that actually executes test methods is out of scope and modeled here as a
//! trait: something that accepts a sequenced [`Request`] plus an event sink and drives it to
//! completion.

use crate::reporter::{RunResult, TestEvent};
use crate::sequencer::Request;
use crate::test_id::TestId;

/// Drives a sequenced [`Request`] to completion, firing [`TestEvent`]s as it goes.
///
/// Implementations own the actual mechanics of invoking a test method; this crate only consumes
/// the event stream they produce.
pub trait UnderlyingRunner {
    /// Runs every test in `request` in order, calling `on_event` for each lifecycle event.
    ///
    /// `on_event` returning `true` signals "stop now" (the listener has latched fail-fast);
    /// implementations should honor this by skipping any tests not yet started and still firing
    /// a final [`TestEvent::RunFinished`].
    fn execute(&self, request: &Request, on_event: &mut dyn FnMut(TestEvent) -> bool);
}

/// What a single test should do when run by [`InProcessRunner`] — a reference implementation
/// used by this crate's own scenario tests, standing in for a real framework integration.
pub enum Outcome {
    Pass,
    Fail {
        exception_class: &'static str,
        message: Option<&'static str>,
        stdout: Option<&'static str>,
        stderr: Option<&'static str>,
    },
    AssumptionFailed,
    Ignored,
}

/// A minimal in-process [`UnderlyingRunner`] that looks up each test's outcome from a fixed table,
/// for use in end-to-end scenario tests where spinning up a real external test
/// framework isn't available.
pub struct InProcessRunner {
    outcomes: std::collections::HashMap<TestId, Outcome>,
}

impl InProcessRunner {
    pub fn new(outcomes: std::collections::HashMap<TestId, Outcome>) -> Self {
        Self { outcomes }
    }

    /// Every test not explicitly listed passes.
    fn outcome_for(&self, id: &TestId) -> &Outcome {
        self.outcomes.get(id).unwrap_or(&Outcome::Pass)
    }
}

impl UnderlyingRunner for InProcessRunner {
    fn execute(&self, request: &Request, on_event: &mut dyn FnMut(TestEvent) -> bool) {
        if on_event(TestEvent::RunStarted(request.len())) {
            return;
        }

        let mut run_count = 0u64;
        let mut failed_count = 0u64;
        let mut ignored_count = 0u64;
        let mut assumption_failed_count = 0u64;

        for id in request.tests() {
            match self.outcome_for(id) {
                Outcome::Ignored => {
                    ignored_count += 1;
                    if on_event(TestEvent::TestIgnored(id.clone())) {
                        break;
                    }
                    continue;
                }
                _ => {}
            }

            if on_event(TestEvent::TestStarted(id.clone())) {
                break;
            }

            let mut aborted = false;
            match self.outcome_for(id) {
                Outcome::Pass => {
                    run_count += 1;
                }
                Outcome::AssumptionFailed => {
                    assumption_failed_count += 1;
                }
                Outcome::Fail {
                    exception_class,
                    message,
                    stdout,
                    stderr,
                } => {
                    failed_count += 1;
                    if let Some(stdout) = stdout {
                        crate::stream_capture::write_active_stdout(stdout.as_bytes());
                    }
                    if let Some(stderr) = stderr {
                        crate::stream_capture::write_active_stderr(stderr.as_bytes());
                    }
                    let failure = crate::reporter::Failure {
                        description: id.clone(),
                        exception_class: (*exception_class).to_owned(),
                        message: message.map(|m| m.to_owned()),
                        stack: vec![crate::reporter::StackFrame {
                            class_name: Some(id.class_name().to_owned()),
                            text: format!("{}({}.java)", id.canonical(), id.class_name()),
                        }],
                        root_cause: None,
                    };
                    aborted = on_event(TestEvent::TestFailure(failure));
                }
                Outcome::Ignored => unreachable!("handled above"),
            }

            if on_event(TestEvent::TestFinished(id.clone())) || aborted {
                break;
            }
        }

        on_event(TestEvent::RunFinished(RunResult {
            run_count,
            failed_count,
            ignored_count,
            assumption_failed_count,
        }));
    }
}
