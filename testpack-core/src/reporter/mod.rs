// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal-aware progress reporting: ANSI markup, lifecycle events, and the listener state
//! machine that ties them together.

pub mod events;
pub mod failure;
pub mod listener;
pub mod styles;

pub use events::{Failure, RunResult, StackFrame, TestEvent};
pub use listener::{ListenerConfig, RunListener};
pub use styles::Colorize;
