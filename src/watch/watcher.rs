// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::watch::patterns::{relative_str, SourcePatterns};

/// Default quiet period before a burst of events is acted upon.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Decides which changed paths matter, relative to a project root.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    root: PathBuf,
    patterns: SourcePatterns,
}

impl ChangeFilter {
    pub fn new(root: impl Into<PathBuf>, patterns: SourcePatterns) -> Self {
        Self {
            root: root.into(),
            patterns,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root-relative paths among `paths` that the patterns select.
    pub fn relevant_changes<'a>(
        &self,
        paths: impl IntoIterator<Item = &'a PathBuf>,
    ) -> BTreeSet<String> {
        paths
            .into_iter()
            .filter_map(|path| relative_str(&self.root, path))
            .filter(|rel| self.patterns.matches(rel))
            .collect()
    }
}

/// A recursive filesystem watcher on a project root.
///
/// Dropping it stops watching.
pub struct SourceWatcher {
    _inner: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    filter: ChangeFilter,
}

impl std::fmt::Debug for SourceWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceWatcher")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// Start watching `filter.root()` recursively.
pub fn spawn_watcher(filter: ChangeFilter) -> Result<SourceWatcher> {
    // Canonicalize once so we have a stable base path.
    let root = filter
        .root()
        .canonicalize()
        .unwrap_or_else(|_| filter.root().to_path_buf());
    let filter = ChangeFilter::new(root.clone(), filter.patterns);

    let (tx, rx) = mpsc::channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            // The receiver is gone only when the watcher is being dropped.
            let _ = tx.send(res);
        },
        Config::default(),
    )
    .context("creating file watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {}", root.display()))?;

    info!(root = ?root, "file watcher started");

    Ok(SourceWatcher {
        _inner: watcher,
        events: rx,
        filter,
    })
}

impl SourceWatcher {
    /// Block until at least one relevant path changed, then keep collecting
    /// until no event arrives for `debounce`.
    ///
    /// Returns `None` once the event channel is closed.
    pub fn wait_for_changes(&self, debounce: Duration) -> Option<BTreeSet<String>> {
        let mut changed = BTreeSet::new();

        loop {
            let next = if changed.is_empty() {
                self.events.recv().map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                self.events.recv_timeout(debounce)
            };

            match next {
                Ok(Ok(event)) => {
                    if event.kind.is_access() {
                        continue;
                    }
                    debug!(?event, "received notify event");
                    changed.extend(self.filter.relevant_changes(&event.paths));
                }
                Ok(Err(err)) => warn!(error = %err, "file watch error"),
                Err(RecvTimeoutError::Timeout) => return Some(changed),
                Err(RecvTimeoutError::Disconnected) => {
                    return if changed.is_empty() { None } else { Some(changed) };
                }
            }
        }
    }

    /// Call `on_change` for every debounced batch of relevant changes until
    /// the watcher stops.
    pub fn run(&self, debounce: Duration, mut on_change: impl FnMut(&BTreeSet<String>)) {
        while let Some(changed) = self.wait_for_changes(debounce) {
            info!(changed = changed.len(), "sources changed");
            on_change(&changed);
        }
        debug!("watcher event loop finished");
    }
}
