//! Signal-driven shutdown shared by the serve and watch loops.
//!
//! Each loop registers a hook that makes it return: the server unblocks its
//! accept loop, the watcher gets a `Shutdown` message. Ctrl+C or SIGTERM
//! fires every hook once; so does a loop that stops on its own, so the other
//! one follows it down.

use crate::log;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Inner {
    triggered: AtomicBool,
    hooks: Mutex<Vec<Hook>>,
}

/// Cheap to clone; clones share hooks and state.
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Shutdown {
    /// Run `hook` on shutdown, immediately if it already happened.
    pub fn on_shutdown(&self, hook: impl Fn() + Send + Sync + 'static) {
        let mut hooks = self.inner.hooks.lock();
        if self.is_triggered() {
            drop(hooks);
            hook();
            return;
        }
        hooks.push(Box::new(hook));
    }

    /// Fire every hook. Later calls do nothing.
    pub fn trigger(&self) {
        let hooks = self.inner.hooks.lock();
        if self.inner.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        for hook in hooks.iter() {
            hook();
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Trigger on Ctrl+C / SIGTERM. Can only be installed once per process.
    pub fn install_signal_handler(&self) -> Result<()> {
        let shutdown = self.clone();
        ctrlc::set_handler(move || {
            log!("serve"; "shutting down...");
            shutdown.trigger();
        })
        .context("Failed to set Ctrl+C handler")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_hooks_run_once() {
        let shutdown = Shutdown::default();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let count = Arc::clone(&count);
            shutdown.on_shutdown(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(!shutdown.is_triggered());
        shutdown.trigger();
        shutdown.clone().trigger();

        assert!(shutdown.is_triggered());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_late_hook_runs_immediately() {
        let shutdown = Shutdown::default();
        shutdown.trigger();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        shutdown.on_shutdown(move || flag.store(true, Ordering::SeqCst));

        assert!(ran.load(Ordering::SeqCst));
    }
}
