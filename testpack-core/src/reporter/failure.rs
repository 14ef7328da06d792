// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Formatting a [`Failure`] into a human-readable report block.

use super::events::Failure;
use super::styles::{render_markup, Colorize};

/// Re-indents embedded newlines in a failure message to six spaces, so multi-line exception
/// messages nest visually under the line that introduces them.
fn reindent_message(message: &str) -> String {
    message.replace('\n', "\n      ")
}

/// The deepest stack frame whose class belongs to one of `test_package_prefixes`, used to point
/// at the line in the *test's own* code most likely responsible for the failure, as opposed to
/// framework or library internals. `None` if no frame matches, or no prefixes were configured.
fn suspect_frame<'a>(failure: &'a Failure, test_package_prefixes: &[String]) -> Option<&'a str> {
    if test_package_prefixes.is_empty() {
        return None;
    }
    failure
        .stack
        .iter()
        .rev()
        .find(|frame| {
            frame.class_name.as_deref().is_some_and(|class| {
                test_package_prefixes.iter().any(|prefix| class.starts_with(prefix.as_str()))
            })
        })
        .map(|frame| frame.text.as_str())
}

/// Renders one failure report block.
///
/// `test_package_prefixes` drives the "Suspect" line; an empty slice omits it entirely.
pub fn format_failure(failure: &Failure, test_package_prefixes: &[String], colorize: Colorize) -> String {
    let mut out = String::new();

    out.push_str(&render_markup(
        &format!("@|red {}|@", failure.description.canonical()),
        colorize,
    ));
    out.push('\n');

    let simple_name = failure
        .exception_class
        .rsplit('.')
        .next()
        .unwrap_or(&failure.exception_class);
    let header = match &failure.message {
        Some(message) => format!("{simple_name}: {}", reindent_message(message)),
        None => simple_name.to_owned(),
    };
    out.push_str(&render_markup(&format!("@|yellow {header}|@"), colorize));
    out.push('\n');

    if let Some(top) = failure.stack.first() {
        out.push_str(&format!("At {}\n", top.text));
    }

    if let Some(root_cause) = &failure.root_cause {
        if root_cause.exception_class != failure.exception_class || root_cause.message != failure.message {
            out.push_str("Root cause:\n");
            if let Some(top) = root_cause.stack.first() {
                out.push_str(&format!("At {}\n", top.text));
            }
        }
    }

    if let Some(suspect) = suspect_frame(failure, test_package_prefixes) {
        out.push_str(&format!("Suspect {suspect}\n"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::events::StackFrame;
    use crate::test_id::TestId;

    fn frame(class: &str, text: &str) -> StackFrame {
        StackFrame {
            class_name: Some(class.to_owned()),
            text: text.to_owned(),
        }
    }

    #[test]
    fn formats_basic_failure() {
        let failure = Failure {
            description: TestId::new("pkg.MyTest", "testThing"),
            exception_class: "java.lang.AssertionError".to_owned(),
            message: Some("expected true".to_owned()),
            stack: vec![frame("pkg.MyTest", "pkg.MyTest.testThing(MyTest.java:10)")],
            root_cause: None,
        };
        let report = format_failure(&failure, &[], Colorize::No);
        assert!(report.contains("testThing(pkg.MyTest)"));
        assert!(report.contains("AssertionError: expected true"));
        assert!(report.contains("At pkg.MyTest.testThing(MyTest.java:10)"));
        assert!(!report.contains("Suspect"));
    }

    #[test]
    fn suspect_frame_picks_deepest_test_package_frame() {
        let failure = Failure {
            description: TestId::new("pkg.MyTest", "testThing"),
            exception_class: "java.lang.RuntimeException".to_owned(),
            message: None,
            stack: vec![
                frame("pkg.MyTest", "pkg.MyTest.testThing(MyTest.java:5)"),
                frame("some.lib.Internal", "some.lib.Internal.doWork(Internal.java:99)"),
            ],
            root_cause: None,
        };
        let report = format_failure(&failure, &["pkg.".to_owned()], Colorize::No);
        assert!(report.contains("Suspect pkg.MyTest.testThing(MyTest.java:5)"));
    }

    #[test]
    fn distinct_root_cause_is_reported() {
        let failure = Failure {
            description: TestId::new("pkg.MyTest", "testThing"),
            exception_class: "java.lang.RuntimeException".to_owned(),
            message: Some("wrapped".to_owned()),
            stack: vec![frame("pkg.MyTest", "pkg.MyTest.testThing(MyTest.java:5)")],
            root_cause: Some(Box::new(Failure {
                description: TestId::new("pkg.MyTest", "testThing"),
                exception_class: "java.io.IOException".to_owned(),
                message: Some("disk full".to_owned()),
                stack: vec![frame("java.io.File", "java.io.File.write(File.java:1)")],
                root_cause: None,
            })),
        };
        let report = format_failure(&failure, &[], Colorize::No);
        assert!(report.contains("Root cause:"));
        assert!(report.contains("java.io.File.write(File.java:1)"));
    }

    #[test]
    fn message_newlines_are_reindented() {
        assert_eq!(reindent_message("a\nb"), "a\n      b");
    }
}
