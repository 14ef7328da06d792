// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical test identifiers.

use std::fmt;

/// Canonical identifier of a single test, of the form `methodName(fully.qualified.ClassName)`.
///
/// Unique within a run.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TestId {
    class_name: String,
    method_name: String,
}

impl TestId {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// The `(class, method)` lexicographic sort key used throughout discovery and sequencing.
    pub fn sort_key(&self) -> (&str, &str) {
        (&self.class_name, &self.method_name)
    }

    /// Renders the canonical string form, `method(Class)`.
    pub fn canonical(&self) -> String {
        format!("{}({})", self.method_name, self.class_name)
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}
