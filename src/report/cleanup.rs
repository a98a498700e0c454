// SPDX-License-Identifier: PMPL-1.0-or-later

//! Partial report files still being written by a live builder
//!
//! [`ReportBuilder`](super::ReportBuilder) tracks its `.partial` file here
//! until it is finalized or dropped. A signal handler can then remove what
//! `Drop` never gets to run for.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

static OPEN: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

fn open() -> MutexGuard<'static, Vec<PathBuf>> {
    OPEN.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn track(path: &Path) {
    open().push(path.to_path_buf());
}

pub(crate) fn untrack(path: &Path) {
    open().retain(|p| p != path);
}

/// Partial reports currently tracked
pub fn open_partials() -> Vec<PathBuf> {
    open().clone()
}

/// Delete every tracked partial report, returning the ones removed
pub fn remove_open_partials() -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for path in open().drain(..) {
        match fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "could not remove partial report")
            }
        }
    }
    removed
}
