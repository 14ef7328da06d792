// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped capture of the tests' stdout/stderr streams.
//!
//! A single active scope guard held behind a mutex, with restoration guaranteed via `Drop` even
//! on a panic unwind, plus a belt-and-suspenders panic hook.
//!
//! The process's real stdout/stderr are deliberately out of scope here; this module instead
//! exposes the write path a driving [`crate::runner::UnderlyingRunner`] is expected to route test
//! output through, which is exactly the boundary the real process-wide stdout/stderr would sit
//! behind.

use crate::errors::CaptureError;
use std::io::Write;
use std::sync::{Mutex, OnceLock};

struct ActiveCapture {
    label: String,
    tee: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

fn slot() -> &'static Mutex<Option<ActiveCapture>> {
    static SLOT: OnceLock<Mutex<Option<ActiveCapture>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

/// Scoped stdout/stderr redirection
///
/// Exactly one capture may be active per process at a time; [`StreamCapture::grab`] returns
/// [`CaptureError`] if one is already active. Restoration happens automatically when the returned
/// [`Handle`] is dropped, or explicitly via [`Handle::restore`].
pub struct StreamCapture;

impl StreamCapture {
    /// Begins capturing. `label` identifies the owning test for diagnostics; `tee` additionally
    /// forwards every captured byte to the process's real stdout/stderr as it's written.
    pub fn grab(tee: bool, label: impl Into<String>) -> Result<Handle, CaptureError> {
        let mut guard = slot().lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_some() {
            return Err(CaptureError);
        }
        *guard = Some(ActiveCapture {
            label: label.into(),
            tee,
            stdout: Vec::new(),
            stderr: Vec::new(),
        });
        Ok(Handle { restored: false })
    }
}

/// The handle to an active capture, returned by [`StreamCapture::grab`].
///
/// Restoring consumes the captured bytes; call [`Handle::get_std_out`]/[`Handle::get_std_err`]
/// before (or instead of) calling [`Handle::restore`] if you still need them afterwards, or read
/// them off the [`CapturedStreams`] returned by `restore`.
pub struct Handle {
    restored: bool,
}

/// The bytes captured by one completed [`StreamCapture`] scope.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CapturedStreams {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Handle {
    /// Writes `bytes` into the active capture's stdout accumulator, teeing to the real stdout
    /// if this capture was started with `tee = true`.
    ///
    /// Panics if no capture is active, which would indicate a capture was already restored out
    /// from under its handle.
    pub fn write_stdout(&self, bytes: &[u8]) {
        let mut guard = slot().lock().unwrap_or_else(|p| p.into_inner());
        let active = guard.as_mut().expect("capture is active for the lifetime of this handle");
        active.stdout.extend_from_slice(bytes);
        if active.tee {
            let _ = std::io::stdout().write_all(bytes);
        }
    }

    /// As [`Handle::write_stdout`], but for stderr.
    pub fn write_stderr(&self, bytes: &[u8]) {
        let mut guard = slot().lock().unwrap_or_else(|p| p.into_inner());
        let active = guard.as_mut().expect("capture is active for the lifetime of this handle");
        active.stderr.extend_from_slice(bytes);
        if active.tee {
            let _ = std::io::stderr().write_all(bytes);
        }
    }

    /// A snapshot of the bytes captured on stdout so far.
    pub fn get_std_out(&self) -> Vec<u8> {
        let guard = slot().lock().unwrap_or_else(|p| p.into_inner());
        guard.as_ref().map(|a| a.stdout.clone()).unwrap_or_default()
    }

    /// A snapshot of the bytes captured on stderr so far.
    pub fn get_std_err(&self) -> Vec<u8> {
        let guard = slot().lock().unwrap_or_else(|p| p.into_inner());
        guard.as_ref().map(|a| a.stderr.clone()).unwrap_or_default()
    }

    pub fn label(&self) -> String {
        let guard = slot().lock().unwrap_or_else(|p| p.into_inner());
        guard.as_ref().map(|a| a.label.clone()).unwrap_or_default()
    }

    /// Ends the capture, returning the accumulated bytes. Idempotent: calling this twice, or
    /// letting `Drop` run afterwards, is a no-op the second time.
    pub fn restore(&mut self) -> CapturedStreams {
        if self.restored {
            return CapturedStreams::default();
        }
        self.restored = true;
        let mut guard = slot().lock().unwrap_or_else(|p| p.into_inner());
        match guard.take() {
            Some(active) => CapturedStreams {
                stdout: active.stdout,
                stderr: active.stderr,
            },
            None => CapturedStreams::default(),
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Writes `bytes` into whatever capture is currently active, teeing to the real stdout if that
/// capture was started with `tee = true`. A no-op if no capture is active.
///
/// For use by an [`crate::runner::UnderlyingRunner`] implementation that doesn't hold the
/// [`Handle`] itself (only whoever called [`StreamCapture::grab`] does) but still needs to route a
/// test's output into the active capture.
pub fn write_active_stdout(bytes: &[u8]) {
    let mut guard = slot().lock().unwrap_or_else(|p| p.into_inner());
    if let Some(active) = guard.as_mut() {
        active.stdout.extend_from_slice(bytes);
        if active.tee {
            let _ = std::io::stdout().write_all(bytes);
        }
    }
}

/// As [`write_active_stdout`], but for stderr.
pub fn write_active_stderr(bytes: &[u8]) {
    let mut guard = slot().lock().unwrap_or_else(|p| p.into_inner());
    if let Some(active) = guard.as_mut() {
        active.stderr.extend_from_slice(bytes);
        if active.tee {
            let _ = std::io::stderr().write_all(bytes);
        }
    }
}

/// Installs a panic hook that clears any still-active capture, so a captured test's stdout isn't
/// left permanently owned by a panicking worker thread.
///
/// Defense in depth alongside `Handle`'s `Drop` impl.
pub fn install_panic_restore_hook() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if let Ok(mut guard) = slot().lock() {
                *guard = None;
            }
            previous(info);
        }));
    });
}

/// Test-only escape hatch: forcibly clears any active capture left over from a previous test.
///
/// Capture state is process-global, so tests that call [`StreamCapture::grab`] must not run
/// concurrently with each other; this keeps failures from one test from cascading into the next.
#[cfg(test)]
pub(crate) fn reset_for_tests() {
    let mut guard = slot().lock().unwrap_or_else(|p| p.into_inner());
    *guard = None;
}

/// Serializes every test in the crate that touches the capture singleton, including tests in
/// other modules (e.g. the reporter's listener tests) that drive a real `grab`/`restore` cycle.
#[cfg(test)]
pub(crate) fn test_serialization_lock() -> std::sync::Arc<std::sync::Mutex<()>> {
    static LOCK: OnceLock<std::sync::Arc<std::sync::Mutex<()>>> = OnceLock::new();
    LOCK.get_or_init(|| std::sync::Arc::new(std::sync::Mutex::new(()))).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_lock() -> std::sync::Arc<std::sync::Mutex<()>> {
        test_serialization_lock()
    }

    #[test]
    fn grab_then_restore_round_trips_bytes() {
        let _g = test_lock();
        let _g = _g.lock().unwrap_or_else(|p| p.into_inner());
        reset_for_tests();

        let mut handle = StreamCapture::grab(false, "pkg.Test#method").unwrap();
        handle.write_stdout(b"hello");
        handle.write_stderr(b"oops");
        let captured = handle.restore();
        assert_eq!(captured.stdout, b"hello");
        assert_eq!(captured.stderr, b"oops");
    }

    #[test]
    fn nested_grab_without_restore_errors() {
        let _g = test_lock();
        let _g = _g.lock().unwrap_or_else(|p| p.into_inner());
        reset_for_tests();

        let _first = StreamCapture::grab(false, "a").unwrap();
        let second = StreamCapture::grab(false, "b");
        assert!(second.is_err());
    }

    #[test]
    fn drop_restores_even_without_explicit_call() {
        let _g = test_lock();
        let _g = _g.lock().unwrap_or_else(|p| p.into_inner());
        reset_for_tests();

        {
            let handle = StreamCapture::grab(false, "a").unwrap();
            handle.write_stdout(b"x");
        }
        // The previous handle's Drop should have released the slot.
        let handle = StreamCapture::grab(false, "b").unwrap();
        assert!(handle.get_std_out().is_empty());
    }

    #[test]
    fn restore_is_idempotent() {
        let _g = test_lock();
        let _g = _g.lock().unwrap_or_else(|p| p.into_inner());
        reset_for_tests();

        let mut handle = StreamCapture::grab(false, "a").unwrap();
        handle.write_stdout(b"x");
        let first = handle.restore();
        let second = handle.restore();
        assert_eq!(first.stdout, b"x");
        assert_eq!(second, CapturedStreams::default());
    }
}
