//! Watcher suspension switch shared by the manager and the file watcher.

use std::sync::atomic::{AtomicBool, Ordering};

use canopy_core::WatcherControl;

/// While set, the runtime drops every filesystem event it receives.
///
/// Suspension does not nest: a second `suspend` while already suspended is
/// logged, and the first `resume` re-enables events.
#[derive(Debug, Default)]
pub struct SuspendSwitch {
    suspended: AtomicBool,
}

impl SuspendSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }
}

impl WatcherControl for SuspendSwitch {
    fn suspend(&self) {
        if self.suspended.swap(true, Ordering::AcqRel) {
            tracing::warn!("nested watcher suspension; events resume at the first resume");
        }
    }

    fn resume(&self) {
        self.suspended.store(false, Ordering::Release);
    }
}
