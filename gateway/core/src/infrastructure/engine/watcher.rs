// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Policy hot-reload watcher
//!
//! Watches a file for write/create events, coalesces bursts within a 500 ms
//! quiescence window (editors and atomic-rename writers emit several events
//! per save), then invokes the reload callback. Reload failures are the
//! callback's concern; the watcher never stops on them.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::infrastructure::engine::PolicyEngine;

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Handle keeping the watcher thread alive. Dropping it stops watching.
pub struct PolicyWatcher {
    _watcher: notify::RecommendedWatcher,
}

/// Watch `path` and run `on_change` after each debounced change burst.
pub fn watch_file<F>(path: &Path, on_change: F) -> anyhow::Result<PolicyWatcher>
where
    F: Fn() + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<()>();

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    let _ = tx.send(());
                }
            }
            Err(e) => warn!(error = %e, "policy watcher error"),
        }
    })?;

    // Watch the parent directory: atomic-rename writers replace the inode,
    // which would otherwise silently detach the watch.
    let watch_target: PathBuf = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf());
    watcher.watch(&watch_target, RecursiveMode::NonRecursive)?;

    std::thread::Builder::new()
        .name("policy-watcher".to_string())
        .spawn(move || {
            while rx.recv().is_ok() {
                // Quiescence: keep draining until no event arrives for the
                // debounce window.
                while rx.recv_timeout(DEBOUNCE).is_ok() {}
                on_change();
            }
        })?;

    info!(path = %path.display(), "policy hot-reload watcher started");
    Ok(PolicyWatcher { _watcher: watcher })
}

/// Watch the engine's compiled-policy file and swap the snapshot on change.
pub fn watch_policy(engine: Arc<PolicyEngine>) -> anyhow::Result<PolicyWatcher> {
    let path = engine.policy_path().to_path_buf();
    watch_file(&path, move || engine.reload_keeping_previous())
}
