//! Directory watcher.
//!
//! Rescans the deployment directories on a fixed interval. When filesystem
//! events are enabled, a burst of changes also triggers a rescan once it has
//! been quiet for the debounce period.

use std::path::{Path, PathBuf};
use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::installer::{INSTALLING_SUFFIX, STAGING_SUFFIX};
use crate::shutdown::ShutdownSignal;

const DEBOUNCE: Duration = Duration::from_millis(500);
const DEBOUNCE_TICK: Duration = Duration::from_millis(100);

/// Something the watcher can ask to rescan.
#[async_trait]
pub trait Rescan: Send + Sync {
    async fn rescan(&self);
}

pub struct DirectoryWatcher {
    target: Weak<dyn Rescan>,
    paths: Vec<PathBuf>,
    interval: Duration,
    watch_events: bool,
    shutdown: ShutdownSignal,
}

impl DirectoryWatcher {
    pub fn new(target: Weak<dyn Rescan>, interval: Duration, shutdown: ShutdownSignal) -> Self {
        Self {
            target,
            paths: Vec::new(),
            interval,
            watch_events: false,
            shutdown,
        }
    }

    pub fn watch(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn with_events(mut self, enabled: bool) -> Self {
        self.watch_events = enabled;
        self
    }

    /// Run the watcher loop until shutdown or until the target is dropped.
    ///
    /// The first rescan happens one interval after spawning.
    pub fn spawn(self) -> JoinHandle<()> {
        let shutdown_rx = self.shutdown.subscribe();
        tokio::spawn(self.run(shutdown_rx))
    }

    async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let (_watcher, mut event_rx) = if self.watch_events {
            self.event_source()
        } else {
            (None, None)
        };

        let start = Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut debounce: Option<Instant> = None;

        info!(
            "Watching {} directories every {:?}",
            self.paths.len(),
            self.interval
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Directory watcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if !self.fire().await {
                        break;
                    }
                }
                Some(event) = next_event(&mut event_rx) => {
                    if is_relevant_event(&event) {
                        debug!("Deployment directory change: {:?}", event.paths);
                        debounce = Some(Instant::now());
                    }
                }
                _ = tokio::time::sleep(DEBOUNCE_TICK), if debounce.is_some() => {
                    if debounce.is_some_and(|at| at.elapsed() >= DEBOUNCE) {
                        debounce = None;
                        if !self.fire().await {
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Returns `false` once the target is gone.
    async fn fire(&self) -> bool {
        match self.target.upgrade() {
            Some(target) => {
                target.rescan().await;
                true
            }
            None => {
                debug!("Rescan target dropped, stopping watcher");
                false
            }
        }
    }

    fn event_source(&self) -> (Option<RecommendedWatcher>, Option<mpsc::Receiver<Event>>) {
        let (event_tx, event_rx) = mpsc::channel::<Event>(100);
        let watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                if let Ok(event) = result {
                    // A full channel already has a rescan pending.
                    let _ = event_tx.try_send(event);
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        );
        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                warn!("Filesystem events unavailable, polling only: {}", e);
                return (None, None);
            }
        };

        for path in &self.paths {
            if let Err(e) = watcher.watch(path, RecursiveMode::Recursive) {
                warn!("Failed to watch {}: {}", path.display(), e);
            }
        }
        (Some(watcher), Some(event_rx))
    }
}

async fn next_event(rx: &mut Option<mpsc::Receiver<Event>>) -> Option<Event> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Creations, modifications and removals outside installer staging directories.
fn is_relevant_event(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|path| !in_staging(path))
}

fn in_staging(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|name| {
                name.starts_with('.')
                    && (name.ends_with(INSTALLING_SUFFIX) || name.ends_with(STAGING_SUFFIX))
            })
    })
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
