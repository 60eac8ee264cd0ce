//! Watcher suspension.
//!
//! Multi-step VFS mutations hold a [`WatcherSuspension`] for their whole
//! duration. Dropping the guard resumes the watcher, whichever way the
//! operation exits. Suspension does not nest.

/// Pauses and resumes delivery of filesystem events.
pub trait WatcherControl: Send + Sync {
    fn suspend(&self);
    fn resume(&self);
}

/// Watcher control for setups without a live watcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWatcher;

impl WatcherControl for NoopWatcher {
    fn suspend(&self) {}
    fn resume(&self) {}
}

#[must_use = "the watcher resumes as soon as the guard is dropped"]
pub struct WatcherSuspension<'a> {
    control: &'a dyn WatcherControl,
}

impl<'a> WatcherSuspension<'a> {
    pub fn new(control: &'a dyn WatcherControl) -> Self {
        control.suspend();
        Self { control }
    }
}

impl Drop for WatcherSuspension<'_> {
    fn drop(&mut self) {
        self.control.resume();
    }
}
