//! File system watcher that rebuilds the site on change.
//!
//! # Architecture
//!
//! ```text
//! notify ──Fs(event)──┐
//!                     ├──► channel ──► rebuild loop ──► build() ──► refresh watches
//! shutdown ─Shutdown──┘                    ▲                │
//!                                          └── drain queue ◄┘
//! ```
//!
//! Rebuilds run one at a time on the loop's thread. Events that arrive while
//! a rebuild is running stay queued; once it finishes they are drained
//! together and cause at most one follow-up rebuild. A `Shutdown` message
//! ends the loop wherever it is seen. The channel closing without one is an
//! error.

use crate::{config::SiteConfig, log};
use anyhow::{Context, Result, bail};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError},
    time::Duration,
};
use walkdir::WalkDir;

/// Quiet period after the first event before a rebuild starts, so an
/// editor's burst of writes for one save counts once.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Messages consumed by the rebuild loop.
#[derive(Debug)]
pub enum WatchMessage {
    Fs(notify::Result<Event>),
    Shutdown,
}

/// What the loop should do after looking at one message.
enum Step {
    Continue,
    Stop,
}

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
        || name == "4913"
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

/// Paths of `event` worth a rebuild.
fn triggering_paths(event: Event, config: &SiteConfig) -> Vec<PathBuf> {
    if !is_relevant(&event) {
        return Vec::new();
    }
    event
        .paths
        .into_iter()
        .filter(|p| !is_temp_file(p) && !config.is_output_path(p))
        .collect()
}

fn rel_path(path: &Path, config: &SiteConfig) -> String {
    let root = config.config_path.parent().unwrap_or(Path::new(""));
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

// =============================================================================
// Rebuild Loop
// =============================================================================

/// Consume messages until shutdown, calling `rebuild` with the paths that
/// triggered it. Never runs two rebuilds at once.
pub fn rebuild_loop<F>(rx: &Receiver<WatchMessage>, config: &SiteConfig, mut rebuild: F) -> Result<()>
where
    F: FnMut(&[PathBuf]),
{
    let mut pending: Vec<PathBuf> = Vec::new();

    loop {
        let Ok(message) = rx.recv() else {
            bail!("watch channel closed unexpectedly");
        };
        if let Step::Stop = collect(message, config, &mut pending) {
            return Ok(());
        }

        // Let a burst settle before building
        while !pending.is_empty() {
            match rx.recv_timeout(DEBOUNCE) {
                Ok(message) => {
                    if let Step::Stop = collect(message, config, &mut pending) {
                        return Ok(());
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => bail!("watch channel closed unexpectedly"),
            }
        }

        while !pending.is_empty() {
            let trigger = std::mem::take(&mut pending);
            rebuild(&trigger);

            // Everything queued meanwhile folds into one follow-up rebuild
            loop {
                match rx.try_recv() {
                    Ok(message) => {
                        if let Step::Stop = collect(message, config, &mut pending) {
                            return Ok(());
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => bail!("watch channel closed unexpectedly"),
                }
            }
        }
    }
}

fn collect(message: WatchMessage, config: &SiteConfig, pending: &mut Vec<PathBuf>) -> Step {
    match message {
        WatchMessage::Shutdown => return Step::Stop,
        WatchMessage::Fs(Err(err)) => log!("watch"; "error: {err}"),
        WatchMessage::Fs(Ok(event)) => {
            for path in triggering_paths(event, config) {
                if !pending.contains(&path) {
                    pending.push(path);
                }
            }
        }
    }
    Step::Continue
}

// =============================================================================
// Watcher Setup
// =============================================================================

/// Directory-level watch registrations over the content, static and template
/// trees. Refreshing picks up directories created since the last call.
pub struct WatchSet<W: Watcher> {
    watcher: W,
    watched: FxHashSet<PathBuf>,
}

impl<W: Watcher> WatchSet<W> {
    pub fn new(watcher: W) -> Self {
        Self {
            watcher,
            watched: FxHashSet::default(),
        }
    }

    /// Watch every directory currently under `roots`; forget removed ones.
    /// Returns the number of newly watched directories.
    pub fn refresh(&mut self, roots: &[&Path]) -> Result<usize> {
        let current: FxHashSet<PathBuf> = roots
            .iter()
            .filter(|root| root.is_dir())
            .flat_map(|root| WalkDir::new(root).into_iter().filter_map(Result::ok))
            .filter(|entry| entry.file_type().is_dir())
            .map(walkdir::DirEntry::into_path)
            .collect();

        let removed: Vec<PathBuf> = self.watched.difference(&current).cloned().collect();
        for dir in removed {
            // The OS usually dropped the watch along with the directory
            let _ = self.watcher.unwatch(&dir);
            self.watched.remove(&dir);
        }

        let mut added = 0;
        for dir in current {
            if self.watched.contains(&dir) {
                continue;
            }
            self.watcher
                .watch(&dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch {}", dir.display()))?;
            self.watched.insert(dir);
            added += 1;
        }
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.watched.len()
    }
}

fn watch_roots(config: &SiteConfig) -> [&Path; 3] {
    [
        config.content_path.as_path(),
        config.static_path.as_path(),
        config.templates_path.as_path(),
    ]
}

// =============================================================================
// Public API
// =============================================================================

/// Build once, then rebuild on every relevant change until shutdown.
///
/// `tx` feeds filesystem events into `rx`; the shutdown path sends
/// [`WatchMessage::Shutdown`] through a clone of the same sender.
pub fn watch_and_rebuild<B>(
    config: &SiteConfig,
    tx: Sender<WatchMessage>,
    rx: &Receiver<WatchMessage>,
    mut build: B,
) -> Result<()>
where
    B: FnMut() -> Result<()>,
{
    let watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(WatchMessage::Fs(res));
    })
    .context("Failed to create file watcher")?;

    let mut watches = WatchSet::new(watcher);
    watches.refresh(&watch_roots(config))?;
    log!("watch"; "watching {} directories", watches.len());

    if let Err(err) = build() {
        log!("watch"; "build failed");
        log!("error"; "{err:#}");
    }

    rebuild_loop(rx, config, |paths| {
        let trigger = paths
            .iter()
            .map(|p| rel_path(p, config))
            .collect::<Vec<_>>()
            .join(", ");
        log!("watch"; "{trigger} changed, rebuilding...");

        if let Err(err) = build() {
            log!("watch"; "build failed ({trigger})");
            log!("error"; "{err:#}");
        }

        match watches.refresh(&watch_roots(config)) {
            Ok(0) => {}
            Ok(added) => log!("watch"; "watching {added} new directories"),
            Err(err) => log!("watch"; "{err:#}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};
    use std::{
        cell::Cell,
        fs,
        sync::mpsc::{self, channel},
        thread,
    };

    fn config() -> SiteConfig {
        let mut config = SiteConfig::from_str("").unwrap();
        config.resolve_paths(Path::new("/site"));
        config
    }

    fn modified(path: &str) -> WatchMessage {
        WatchMessage::Fs(Ok(
            Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from(path))
        ))
    }

    #[test]
    fn test_is_temp_file() {
        assert!(is_temp_file(Path::new("a.md.swp")));
        assert!(is_temp_file(Path::new("a.md~")));
        assert!(is_temp_file(Path::new(".hidden")));
        assert!(!is_temp_file(Path::new("a.md")));
    }

    #[test]
    fn test_output_and_temp_paths_ignored() {
        let config = config();
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path("/site/dist/index.html".into())
            .add_path("/site/.dist.staging/index.html".into())
            .add_path("/site/content/.a.md.swp".into())
            .add_path("/site/content/a.md".into());

        assert_eq!(
            triggering_paths(event, &config),
            vec![PathBuf::from("/site/content/a.md")]
        );
    }

    #[test]
    fn test_access_events_ignored() {
        let config = config();
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path("/site/content/a.md".into());
        assert!(triggering_paths(event, &config).is_empty());
    }

    #[test]
    fn test_events_during_rebuild_coalesce() {
        let config = config();
        let (tx, rx) = channel();
        tx.send(modified("/site/content/a.md")).unwrap();

        let calls = Cell::new(0);
        let mut seen = Vec::new();
        rebuild_loop(&rx, &config, |paths| {
            calls.set(calls.get() + 1);
            seen.push(paths.to_vec());
            match calls.get() {
                // two writes land while the first rebuild is running
                1 => {
                    tx.send(modified("/site/content/a.md")).unwrap();
                    tx.send(modified("/site/content/a.md")).unwrap();
                }
                _ => tx.send(WatchMessage::Shutdown).unwrap(),
            }
        })
        .unwrap();

        assert_eq!(calls.get(), 2);
        assert_eq!(seen[1], vec![PathBuf::from("/site/content/a.md")]);
    }

    #[test]
    fn test_burst_before_rebuild_counts_once() {
        let config = config();
        let (tx, rx) = channel();
        for _ in 0..5 {
            tx.send(modified("/site/content/a.md")).unwrap();
        }
        tx.send(modified("/site/templates/main.html")).unwrap();

        let calls = Cell::new(0);
        let mut seen = Vec::new();
        rebuild_loop(&rx, &config, |paths| {
            calls.set(calls.get() + 1);
            seen.push(paths.len());
            tx.send(WatchMessage::Shutdown).unwrap();
        })
        .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(seen, vec![2]);
    }

    #[test]
    fn test_shutdown_without_events() {
        let config = config();
        let (tx, rx) = channel();
        tx.send(WatchMessage::Shutdown).unwrap();

        rebuild_loop(&rx, &config, |_| panic!("no rebuild expected")).unwrap();
    }

    #[test]
    fn test_watcher_errors_are_not_fatal() {
        let config = config();
        let (tx, rx) = channel();
        tx.send(WatchMessage::Fs(Err(notify::Error::generic("boom")))).unwrap();
        tx.send(WatchMessage::Shutdown).unwrap();

        rebuild_loop(&rx, &config, |_| panic!("no rebuild expected")).unwrap();
    }

    #[test]
    fn test_closed_channel_is_error() {
        let config = config();
        let (tx, rx) = mpsc::channel::<WatchMessage>();
        let sender = thread::spawn(move || {
            tx.send(modified("/site/content/a.md")).unwrap();
        });
        sender.join().unwrap();

        // the sender is gone before the burst settles: no rebuild happens
        let mut calls = 0;
        assert!(rebuild_loop(&rx, &config, |_| calls += 1).is_err());
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_watch_set_picks_up_new_directories() {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content");
        fs::create_dir_all(content.join("blog")).unwrap();

        let watcher = notify::recommended_watcher(|_: notify::Result<Event>| {}).unwrap();
        let mut watches = WatchSet::new(watcher);

        assert_eq!(watches.refresh(&[content.as_path()]).unwrap(), 2);
        assert_eq!(watches.refresh(&[content.as_path()]).unwrap(), 0);

        fs::create_dir_all(content.join("blog/2024")).unwrap();
        assert_eq!(watches.refresh(&[content.as_path()]).unwrap(), 1);

        fs::remove_dir_all(content.join("blog")).unwrap();
        watches.refresh(&[content.as_path()]).unwrap();
        assert_eq!(watches.len(), 1);
    }
}
