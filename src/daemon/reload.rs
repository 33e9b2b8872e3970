// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration-file watcher
//!
//! Polls the configuration file's modification stamp on a fixed interval.
//! When the stamp changes the whole file is re-read and re-validated; a file
//! that fails to parse or validate is logged and skipped, keeping the last
//! good configuration in effect. The stamp is recorded even for a bad file so
//! a broken edit is reported once, not on every poll.

use log::{debug, warn};
use std::path::PathBuf;
use std::time::SystemTime;

use crate::config::Config;

/// Watches one configuration file for changes by modification stamp
pub struct ConfigWatcher {
    path: PathBuf,
    stamp: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Watch `path`, priming the stamp so only future edits fire
    ///
    /// The initial configuration was already loaded by the caller; the first
    /// poll must not re-apply it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stamp = Config::file_stamp(&path).ok();
        Self { path, stamp }
    }

    /// Check the file once; `Some` carries a freshly validated configuration
    ///
    /// Returns `None` when the stamp is unchanged or the changed file is
    /// invalid (logged and skipped).
    pub fn poll(&mut self) -> Option<Config> {
        let stamp = match Config::file_stamp(&self.path) {
            Ok(stamp) => stamp,
            Err(e) => {
                warn!("cannot stat configuration file {}: {e}", self.path.display());
                return None;
            }
        };

        if self.stamp == Some(stamp) {
            return None;
        }
        debug!(
            "configuration file {} changed ({stamp:?})",
            self.path.display()
        );
        self.stamp = Some(stamp);

        match Config::from_file(&self.path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(
                    "skipping reload, configuration file {} is invalid: {e}",
                    self.path.display()
                );
                None
            }
        }
    }
}
