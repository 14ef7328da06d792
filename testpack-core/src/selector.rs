// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing wildcarded package selectors and discovering matching tests.
//!
//! Since this workspace has no runtime reflection, discovery is fed by a [`TestIndex`] — a
//! stand-in for "a build step enumerates compiled test classes into a static table". A real
//! integration would populate a `TestIndex` from a test-framework-provided registry; the matching
//! logic here is agnostic to where the table came from.

use crate::{errors::SelectorParseError, test_id::TestId};

#[derive(Clone, Debug, Eq, PartialEq)]
enum Segment {
    /// An exact segment, matched literally.
    Literal(String),
    /// A bare `*`, matching exactly one segment.
    Star,
    /// `prefix*`, matching any segment beginning with `prefix`.
    PrefixStar(String),
}

impl Segment {
    fn matches(&self, candidate: &str) -> bool {
        match self {
            Segment::Literal(s) => s == candidate,
            Segment::Star => true,
            Segment::PrefixStar(prefix) => candidate.starts_with(prefix.as_str()),
        }
    }

    /// Whether this segment's raw token ends in `*` (either form of wildcard).
    fn is_wildcard(&self) -> bool {
        !matches!(self, Segment::Literal(_))
    }
}

/// A dot-separated selector pattern with `*` permitted in any segment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestSelector {
    segments: Vec<Segment>,
}

impl TestSelector {
    /// Parses a dotted pattern such as `org.example.wildcards.include*`.
    pub fn parse(pattern: &str) -> Result<Self, SelectorParseError> {
        if pattern.is_empty() {
            return Err(SelectorParseError::new(pattern, "pattern must not be empty"));
        }

        let mut segments = Vec::new();
        for token in pattern.split('.') {
            if token.is_empty() {
                return Err(SelectorParseError::new(
                    pattern,
                    "pattern must not contain empty segments (leading/trailing/double dots)",
                ));
            }
            let segment = if token == "*" {
                Segment::Star
            } else if let Some(prefix) = token.strip_suffix('*') {
                if prefix.is_empty() {
                    Segment::Star
                } else {
                    Segment::PrefixStar(prefix.to_owned())
                }
            } else {
                Segment::Literal(token.to_owned())
            };
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    /// Whether the pattern's final segment is a wildcard that recurses into sub-packages.
    fn is_recursive(&self) -> bool {
        self.segments.last().is_some_and(Segment::is_wildcard)
    }

    /// Whether `full_class_name` (dot-separated, package + class) matches this selector.
    ///
    /// The pattern matches against the class's *package* (every segment but the last); the class
    /// name itself is unconstrained once the package matches.
    pub fn matches_class(&self, full_class_name: &str) -> bool {
        let all_segments: Vec<&str> = full_class_name.split('.').collect();
        if all_segments.len() < 2 {
            // No package at all; only an empty-package pattern could match, which we don't
            // support since patterns are always non-empty.
            return false;
        }
        let package = &all_segments[..all_segments.len() - 1];

        if self.is_recursive() {
            let prefix_len = self.segments.len() - 1;
            if package.len() < self.segments.len() {
                return false;
            }
            for i in 0..prefix_len {
                if !self.segments[i].matches(package[i]) {
                    return false;
                }
            }
            self.segments[prefix_len].matches(package[prefix_len])
        } else {
            if package.len() != self.segments.len() {
                return false;
            }
            self.segments
                .iter()
                .zip(package.iter())
                .all(|(seg, cand)| seg.matches(cand))
        }
    }
}

/// One compiled test class in a [`TestIndex`].
#[derive(Clone, Debug)]
pub struct TestClassEntry {
    pub class_name: String,
    /// Whether the underlying framework considers this class an executable test class.
    /// Abstract, non-instantiable, or non-test classes are `false` and silently skipped.
    pub runnable: bool,
    pub methods: Vec<String>,
}

/// A pre-generated table of compiled test classes, standing in for the underlying framework's
/// own runtime discovery.
#[derive(Clone, Debug, Default)]
pub struct TestIndex {
    entries: Vec<TestClassEntry>,
}

impl TestIndex {
    pub fn new(entries: Vec<TestClassEntry>) -> Self {
        Self { entries }
    }

    /// Returns the ordered, de-duplicated list of tests matching `selector`, sorted
    /// lexicographically by `(className, methodName)`.
    pub fn discover(&self, selector: &TestSelector) -> Vec<TestId> {
        let mut found: Vec<TestId> = self
            .entries
            .iter()
            .filter(|entry| entry.runnable && selector.matches_class(&entry.class_name))
            .flat_map(|entry| {
                entry
                    .methods
                    .iter()
                    .map(|method| TestId::new(entry.class_name.clone(), method.clone()))
            })
            .collect();

        found.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        found.dedup_by(|a, b| a.sort_key() == b.sort_key());
        found
    }

    /// All distinct class names present in the index, runnable or not (used by the sequencer's
    /// shard partitioning, which operates on the full candidate class set).
    pub fn entries(&self) -> &[TestClassEntry] {
        &self.entries
    }
}
